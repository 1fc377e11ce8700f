use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

/// Used when a deadline is too far out to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a timer was armed. Only one timer exists at a time, so arming a retry
/// replaces a pending expiration refresh and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    Expiration,
    Retry,
}

impl RefreshKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshKind::Expiration => "expiration",
            RefreshKind::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArmedRefresh {
    pub kind: RefreshKind,
    pub deadline: Instant,
}

impl ArmedRefresh {
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug)]
struct ArmedTimer {
    refresh: ArmedRefresh,
    handle: JoinHandle<()>,
}

/// Owns at most one pending one-shot timer.
#[derive(Debug)]
pub struct RefreshScheduler {
    runtime: Handle,
    slot: Mutex<Option<ArmedTimer>>,
}

impl RefreshScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            slot: Mutex::new(None),
        }
    }

    /// Cancel whatever is armed, then run `callback` once after `delay`.
    pub fn arm<F>(&self, delay: Duration, kind: RefreshKind, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);

        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }

        let handle = self.runtime.spawn(async move {
            sleep_until(deadline).await;
            debug!(kind = kind.as_str(), "refresh timer fired");
            callback();
        });

        *slot = Some(ArmedTimer {
            refresh: ArmedRefresh { kind, deadline },
            handle,
        });
    }

    /// Returns whether a timer that had not fired yet was cancelled.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(timer) => {
                let pending = !timer.handle.is_finished();
                timer.handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn armed(&self) -> Option<ArmedRefresh> {
        self.slot()
            .as_ref()
            .filter(|timer| !timer.handle.is_finished())
            .map(|timer| timer.refresh)
    }

    fn slot(&self) -> MutexGuard<'_, Option<ArmedTimer>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
