//! # Auth Token Refresher
//!
//! Keeps a short-lived bearer token (JWT) fresh for a client that must present it on every
//! outgoing request. Tokens are minted by a caller-supplied handler; this crate decides when
//! to call it, collapses concurrent requests into a single in-flight call, retries failures
//! with bounded backoff and refreshes proactively before the `exp` claim is reached.
//!
//! Modules:
//! - `auth`: the refresh coordinator, its timer and the collaborator traits
//! - `resilience`: retry policy and backoff intervals
//! - `parser`: JWT expiration claim extraction
//! - `sources`: HTTP token handler
//! - `sinks`: active token publication for request signing
//! - `config`: YAML configuration and validation
//! - `observability` / `server`: prometheus metrics and the HTTP control plane

pub mod auth;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::auth::{TokenRefreshCoordinator, TokenRequest};
pub use crate::config::types::ServiceConfig;
pub use crate::error::{AuthError, MalformedTokenError};
