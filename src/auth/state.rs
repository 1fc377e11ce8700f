use serde::Serialize;

/// Mutable session state of the coordinator; only touched while holding its lock.
#[derive(Debug, Default)]
pub(crate) struct CoordinatorState {
    /// A handler invocation is queued or running.
    pub pending_auth: bool,
    /// The last dispatched request was itself triggered by an authorization failure.
    pub has_failed_prior_auth: bool,
    /// A plain refresh arrived while pending; replayed once the in-flight call completes.
    pub requires_auth_refresh: bool,
    pub pause_auth_retry: bool,
    /// Handler attempts since the pause state last changed; bounds failure-driven requests.
    pub retry_count: u32,
}

impl CoordinatorState {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            pending_auth: self.pending_auth,
            has_failed_prior_auth: self.has_failed_prior_auth,
            requires_auth_refresh: self.requires_auth_refresh,
            pause_auth_retry: self.pause_auth_retry,
            retry_count: self.retry_count,
        }
    }
}

/// Point-in-time copy of the coordinator's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub pending_auth: bool,
    pub has_failed_prior_auth: bool,
    pub requires_auth_refresh: bool,
    pub pause_auth_retry: bool,
    pub retry_count: u32,
}
