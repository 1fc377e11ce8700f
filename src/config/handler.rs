use http::Method;
use serde::Deserialize;
use std::collections::HashMap;

/// ================================
/// Token issuer request
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct HandlerConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method,
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    /// sent as a JSON object
    pub body: Option<HashMap<String, GenericSourceValue>>,
    /// JSON pointer to the token in the response; the whole body when absent
    pub token_pointer: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Header / body value sources
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal { value: String },
    FromEnv { from_env: String },
    FromFile { path: String },
}

fn default_method() -> Method {
    Method::POST
}
