use std::string::FromUtf8Error;

use thiserror::Error;

/// Error produced by a [`TokenHandler`](crate::auth::handler::TokenHandler).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reasons a dispatch attempt ends without an active token.
///
/// None of these reach the caller of `request_new_token`; they are reported to the
/// result sink as registration failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token handler configured")]
    NoHandlerConfigured,

    #[error("token handler failed: {0}")]
    HandlerInvocationFailed(#[source] HandlerError),

    #[error("token handler returned an empty token")]
    NullTokenReturned,

    #[error("malformed token: {0}")]
    MalformedToken(#[from] MalformedTokenError),
}

impl AuthError {
    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NoHandlerConfigured => "no_handler",
            AuthError::HandlerInvocationFailed(_) => "handler_error",
            AuthError::NullTokenReturned => "null_token",
            AuthError::MalformedToken(_) => "malformed_token",
        }
    }
}

#[derive(Debug, Error)]
pub enum MalformedTokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("payload is not a JSON object: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("payload has no numeric 'exp' claim")]
    MissingExp,
}
