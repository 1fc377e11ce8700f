use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MalformedTokenError;

static EXPIRATION_CLAIM: &str = "exp";

/// base64url that accepts the payload with or without trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extract the `exp` claim (seconds since epoch) from a compact `header.payload.signature` JWT.
///
/// The signature is never checked; the value is only used to schedule the next refresh.
pub fn decode_expiration(encoded_jwt: &str) -> Result<i64, MalformedTokenError> {
    let parts: Vec<&str> = encoded_jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(MalformedTokenError::SegmentCount(parts.len()));
    }

    let claims = decode_claims(parts[1])?;
    let exp = claims
        .get(EXPIRATION_CLAIM)
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)))
        .ok_or(MalformedTokenError::MissingExp)?;

    debug!(expires_at = exp, "jwt parsed successfully");
    Ok(exp)
}

fn decode_claims(payload: &str) -> Result<Map<String, Value>, MalformedTokenError> {
    let bytes = URL_SAFE_LENIENT.decode(payload)?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str::<Map<String, Value>>(&json)?)
}
