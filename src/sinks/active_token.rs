use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::handler::ResultSink;
use crate::error::AuthError;
use crate::parser::jwt::decode_expiration;

/// Keeps the currently active token for request signing.
///
/// The coordinator writes through [`ResultSink`]; readers subscribe with
/// [`ActiveTokenSink::reader`].
#[derive(Debug)]
pub struct ActiveTokenSink {
    tx: watch::Sender<Option<Arc<str>>>,
}

impl Default for ActiveTokenSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveTokenSink {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn reader(&self) -> ActiveTokenReader {
        ActiveTokenReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl ResultSink for ActiveTokenSink {
    fn on_token_available(&self, token: Option<&str>) {
        let token: Option<Arc<str>> = token.map(Arc::from);
        self.tx.send_if_modified(|current| {
            if *current == token {
                false
            } else {
                *current = token;
                true
            }
        });
    }

    fn on_registration_succeeded(&self, token: &str) {
        match decode_expiration(token) {
            Ok(exp) => info!(expires_at = exp, "token registration succeeded"),
            Err(_) => info!("token registration succeeded"),
        }
    }

    fn on_registration_failed(&self, cause: &AuthError) {
        warn!(error = %cause, reason = cause.reason(), "token registration failed");
    }
}

/// Read side of [`ActiveTokenSink`].
#[derive(Debug, Clone)]
pub struct ActiveTokenReader {
    rx: watch::Receiver<Option<Arc<str>>>,
}

impl ActiveTokenReader {
    pub fn token(&self) -> Option<Arc<str>> {
        self.rx.borrow().clone()
    }

    /// Value of an `Authorization` header for the active token.
    pub fn bearer(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {}", token))
    }

    /// Waits for the next published change; errors once the sink is dropped.
    pub async fn changed(&mut self) -> Result<Option<Arc<str>>, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
