//! Capabilities the coordinator consumes: something that mints tokens, something that
//! receives the outcome, and something that says whether a session is still alive.

use std::future::Future;

use async_trait::async_trait;

use crate::error::{AuthError, HandlerError};

/// Produces a fresh bearer token.
///
/// The coordinator never runs two invocations at once. An empty string is treated as
/// "no token" and handled like a failure.
#[async_trait]
pub trait TokenHandler: Send + Sync {
    async fn request_token(&self) -> Result<String, HandlerError>;
}

/// Receives the outcome of every dispatch attempt.
///
/// Called from the coordinator's worker; implementations must not block for long.
pub trait ResultSink: Send + Sync {
    /// Publish the token requests should carry from now on; `None` clears it.
    fn on_token_available(&self, token: Option<&str>);

    fn on_registration_succeeded(&self, token: &str);

    fn on_registration_failed(&self, cause: &AuthError);
}

/// Checked by timer callbacks before they request a token.
pub trait SessionProbe: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

impl<F> SessionProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_authenticated(&self) -> bool {
        self()
    }
}

/// A session that is always considered signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAuthenticated;

impl SessionProbe for AlwaysAuthenticated {
    fn is_authenticated(&self) -> bool {
        true
    }
}

/// Adapts an async closure into a [`TokenHandler`].
pub struct FnTokenHandler<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnTokenHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTokenHandler").finish_non_exhaustive()
    }
}

/// Wrap `f` so it can be handed to the coordinator as a token handler.
pub fn handler_fn<F, Fut>(f: F) -> FnTokenHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
{
    FnTokenHandler { f }
}

#[async_trait]
impl<F, Fut> TokenHandler for FnTokenHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
{
    async fn request_token(&self) -> Result<String, HandlerError> {
        (self.f)().await
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn on_token_available(&self, _token: Option<&str>) {}

    fn on_registration_succeeded(&self, _token: &str) {}

    fn on_registration_failed(&self, _cause: &AuthError) {}
}
