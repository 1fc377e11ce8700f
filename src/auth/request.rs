use std::fmt;

/// Invoked with the new token once the dispatch this request started succeeds.
pub type SuccessCallback = Box<dyn FnOnce(&str) + Send + 'static>;

/// A single call into the coordinator. Consumed immediately or discarded.
#[derive(Default)]
pub struct TokenRequest {
    pub(crate) retry_after_failure: bool,
    pub(crate) scheduled_retry: bool,
    pub(crate) on_success: Option<SuccessCallback>,
}

impl TokenRequest {
    /// `retry_after_failure` marks requests triggered by a rejected (unauthorized) call.
    pub fn new(retry_after_failure: bool) -> Self {
        Self {
            retry_after_failure,
            ..Self::default()
        }
    }

    /// Fired by the coordinator's own failure-retry timer.
    pub(crate) fn scheduled_retry() -> Self {
        Self {
            scheduled_retry: true,
            ..Self::default()
        }
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&str) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Subject to the pause flag and the retry budget.
    pub(crate) fn is_failure_driven(&self) -> bool {
        self.retry_after_failure || self.scheduled_retry
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("retry_after_failure", &self.retry_after_failure)
            .field("scheduled_retry", &self.scheduled_retry)
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}
