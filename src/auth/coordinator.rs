//! Single-flight token refresh.
//!
//! Every token request funnels through [`TokenRefreshCoordinator::request_new_token_with`], which
//! decides under one lock whether to dispatch to the handler, defer behind the in-flight call, or
//! drop the request. Dispatches run one at a time on a dedicated worker task. Completed calls
//! arm the next refresh: a proactive one derived from the token's `exp` claim on success, a
//! backoff retry on failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::auth::handler::{AlwaysAuthenticated, NoopSink, ResultSink, SessionProbe, TokenHandler};
use crate::auth::request::{SuccessCallback, TokenRequest};
use crate::auth::scheduler::{ArmedRefresh, RefreshKind, RefreshScheduler};
use crate::auth::state::{CoordinatorState, StateSnapshot};
use crate::error::AuthError;
use crate::helpers::time::{format_unix_secs, now_millis, refresh_delay_millis};
use crate::observability::metrics::Metrics;
use crate::parser::jwt::decode_expiration;
use crate::resilience::retry::RetryPolicy;
use crate::utils::constants::DEFAULT_EXPIRING_AUTH_TOKEN_REFRESH_PERIOD_MS;

/// Work item for the dispatch worker.
struct Dispatch {
    on_success: Option<SuccessCallback>,
}

struct Inner {
    handler: Option<Arc<dyn TokenHandler>>,
    sink: Arc<dyn ResultSink>,
    session: Arc<dyn SessionProbe>,
    policy: RetryPolicy,
    expiring_auth_token_refresh_period: Duration,
    state: Mutex<CoordinatorState>,
    scheduler: RefreshScheduler,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    metrics: Option<Arc<Metrics>>,
}

/// Coordinates when the token handler is called. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct TokenRefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenRefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshCoordinator")
            .field("has_handler", &self.inner.handler.is_some())
            .field("policy", &self.inner.policy)
            .field("state", &self.snapshot())
            .finish()
    }
}

pub struct CoordinatorBuilder {
    handler: Option<Arc<dyn TokenHandler>>,
    sink: Arc<dyn ResultSink>,
    session: Arc<dyn SessionProbe>,
    policy: RetryPolicy,
    expiring_auth_token_refresh_period: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            handler: None,
            sink: Arc::new(NoopSink),
            session: Arc::new(AlwaysAuthenticated),
            policy: RetryPolicy::default(),
            expiring_auth_token_refresh_period: Duration::from_millis(
                DEFAULT_EXPIRING_AUTH_TOKEN_REFRESH_PERIOD_MS,
            ),
            metrics: None,
        }
    }
}

impl CoordinatorBuilder {
    pub fn handler(mut self, handler: Arc<dyn TokenHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionProbe>) -> Self {
        self.session = session;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// How long before `exp` the proactive refresh fires.
    pub fn expiring_auth_token_refresh_period(mut self, period: Duration) -> Self {
        self.expiring_auth_token_refresh_period = period;
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Starts the dispatch worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> TokenRefreshCoordinator {
        self.spawn_on(Handle::current())
    }

    pub fn spawn_on(self, runtime: Handle) -> TokenRefreshCoordinator {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            handler: self.handler,
            sink: self.sink,
            session: self.session,
            policy: self.policy,
            expiring_auth_token_refresh_period: self.expiring_auth_token_refresh_period,
            state: Mutex::new(CoordinatorState::default()),
            scheduler: RefreshScheduler::new(runtime.clone()),
            dispatch_tx,
            metrics: self.metrics,
        });

        runtime.spawn(run_dispatch_worker(Arc::downgrade(&inner), dispatch_rx));

        TokenRefreshCoordinator { inner }
    }
}

/// Runs handler invocations strictly one after another.
///
/// Holds only a weak reference, so dropping every coordinator handle closes the channel
/// and ends the loop.
async fn run_dispatch_worker(inner: Weak<Inner>, mut dispatch_rx: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(dispatch) = dispatch_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        TokenRefreshCoordinator { inner }.invoke_handler(dispatch).await;
    }
    debug!("token dispatch worker stopped");
}

impl TokenRefreshCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Fire-and-forget request for a fresh token.
    ///
    /// `is_retry_after_failure` marks requests made because the current token was rejected.
    pub fn request_new_token(&self, is_retry_after_failure: bool) {
        self.request_new_token_with(TokenRequest::new(is_retry_after_failure));
    }

    pub fn request_new_token_with(&self, request: TokenRequest) {
        let mut state = self.state();

        if request.is_failure_driven() {
            if state.pause_auth_retry {
                drop(state);
                self.dropped(&request, "paused");
                return;
            }
            if self.inner.policy.is_exhausted(state.retry_count) {
                drop(state);
                self.dropped(&request, "retry_exhausted");
                return;
            }
        }

        if self.inner.handler.is_none() {
            drop(state);
            warn!("token requested but no token handler is configured");
            self.record(|m| m.requests_dropped.with_label_values(&["no_handler"]).inc());
            self.inner.sink.on_token_available(None);
            self.inner.sink.on_registration_failed(&AuthError::NoHandlerConfigured);
            return;
        }

        if !state.pending_auth {
            if state.has_failed_prior_auth && request.retry_after_failure {
                drop(state);
                self.dropped(&request, "prior_failure");
                return;
            }

            state.has_failed_prior_auth = request.retry_after_failure;
            state.pending_auth = true;
            let dispatch = Dispatch {
                on_success: request.on_success,
            };
            if self.inner.dispatch_tx.send(dispatch).is_err() {
                state.pending_auth = false;
                error!("token dispatch worker is not running, request dropped");
                return;
            }
            debug!(
                retry_after_failure = request.retry_after_failure,
                scheduled_retry = request.scheduled_retry,
                "token request dispatched"
            );
        } else if !request.retry_after_failure {
            // replayed once the in-flight request completes
            state.requires_auth_refresh = true;
            drop(state);
            debug!("token request deferred behind in-flight request");
            self.record(|m| m.requests_deferred.inc());
        } else {
            drop(state);
            self.dropped(&request, "failure_pending");
        }
    }

    /// Suspend or resume failure-driven retries. Either way the retry budget starts over.
    pub fn pause_retries(&self, pause: bool) {
        let mut state = self.state();
        state.pause_auth_retry = pause;
        state.retry_count = 0;
        drop(state);
        info!(paused = pause, "auth retries pause state changed");
        self.record(|m| m.retry_count.set(0));
    }

    /// Forget that the last request was failure-triggered, e.g. after the user signs in again.
    pub fn reset_failed_auth(&self) {
        self.state().has_failed_prior_auth = false;
    }

    pub fn clear_refresh_timer(&self) {
        if self.inner.scheduler.cancel() {
            debug!("refresh timer cleared");
        }
    }

    /// Replace the armed timer with a proactive refresh shortly before `token` expires.
    pub fn queue_expiration_refresh(&self, token: &str) {
        self.clear_refresh_timer();

        let exp = match decode_expiration(token) {
            Ok(exp) => exp,
            Err(err) => {
                error!(error = %err, "error while parsing JWT for the expiration");
                self.inner.sink.on_registration_failed(&AuthError::MalformedToken(err));
                self.schedule_retry();
                return;
            }
        };
        self.record(|m| m.token_expiry_unix.set(exp));

        let margin_ms =
            i64::try_from(self.inner.expiring_auth_token_refresh_period.as_millis()).unwrap_or(i64::MAX);
        let delay_ms = refresh_delay_millis(exp, margin_ms, now_millis());
        if delay_ms > 0 {
            info!(
                expires_at = %format_unix_secs(exp),
                delay_ms,
                "proactive token refresh scheduled"
            );
            self.arm(Duration::from_millis(delay_ms as u64), RefreshKind::Expiration);
        } else {
            warn!(
                expires_at = %format_unix_secs(exp),
                "the expiring auth token refresh period has already passed for the current JWT"
            );
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state().snapshot()
    }

    pub fn armed_refresh(&self) -> Option<ArmedRefresh> {
        self.inner.scheduler.armed()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    async fn invoke_handler(&self, dispatch: Dispatch) {
        let Some(handler) = self.inner.handler.clone() else {
            return;
        };

        let retry_count = {
            let mut state = self.state();
            state.retry_count = state.retry_count.saturating_add(1);
            state.retry_count
        };
        self.record(|m| {
            m.handler_invocations.inc();
            m.retry_count.set(retry_count as i64);
        });
        debug!(retry_count, "invoking token handler");

        let started = Instant::now();
        // a panicking handler surfaces as a JoinError instead of killing the worker
        let outcome = tokio::spawn(async move { handler.request_token().await }).await;
        self.record(|m| m.handler_duration.observe(started.elapsed().as_secs_f64()));

        match outcome {
            Ok(Ok(token)) if !token.is_empty() => self.handle_success(token, dispatch.on_success),
            Ok(Ok(_)) => self.handle_failure(AuthError::NullTokenReturned),
            Ok(Err(err)) => self.handle_failure(AuthError::HandlerInvocationFailed(err)),
            Err(join_err) => self.handle_failure(AuthError::HandlerInvocationFailed(Box::new(join_err))),
        }
    }

    fn handle_success(&self, token: String, on_success: Option<SuccessCallback>) {
        if let Some(callback) = on_success {
            callback(&token);
        }
        self.queue_expiration_refresh(&token);
        self.inner.sink.on_token_available(Some(&token));
        self.complete_dispatch();

        info!("auth token refreshed");
        self.inner.sink.on_registration_succeeded(&token);
    }

    fn handle_failure(&self, cause: AuthError) {
        error!(error = %cause, reason = cause.reason(), "error while requesting auth token");
        self.record(|m| m.handler_failures.with_label_values(&[cause.reason()]).inc());

        self.schedule_retry();
        self.inner.sink.on_registration_failed(&cause);
        self.complete_dispatch();
    }

    /// Leave the pending state, or hand the slot straight to a deferred refresh.
    ///
    /// The replay is sent under the same lock that clears the deferred flag, so no other
    /// request can dispatch in between.
    fn complete_dispatch(&self) {
        let mut state = self.state();
        if std::mem::take(&mut state.requires_auth_refresh) {
            state.has_failed_prior_auth = false;
            if self.inner.dispatch_tx.send(Dispatch { on_success: None }).is_ok() {
                debug!("replaying deferred token request");
                return;
            }
            error!("token dispatch worker is not running, deferred request dropped");
        }
        state.pending_auth = false;
    }

    /// Arm a failure retry after the policy's next interval, unless paused or out of budget.
    fn schedule_retry(&self) {
        let (paused, retry_count) = {
            let state = self.state();
            (state.pause_auth_retry, state.retry_count)
        };
        if paused {
            debug!("auth retries are paused, not scheduling a retry");
            return;
        }
        if self.inner.policy.is_exhausted(retry_count) {
            warn!(retry_count, max_retry = self.inner.policy.max_retry, "auth retries exhausted");
            return;
        }

        let delay = self.inner.policy.next_retry_interval(retry_count);
        info!(retry_count, delay_ms = delay.as_millis() as u64, "scheduling auth token retry");
        self.arm(delay, RefreshKind::Retry);
    }

    fn arm(&self, delay: Duration, kind: RefreshKind) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(delay, kind, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            TokenRefreshCoordinator { inner }.on_timer_fired(kind);
        });
        self.record(|m| m.timers_armed.with_label_values(&[kind.as_str()]).inc());
    }

    fn on_timer_fired(&self, kind: RefreshKind) {
        if !self.inner.session.is_authenticated() {
            warn!(kind = kind.as_str(), "no authenticated session, skipping token refresh");
            return;
        }
        match kind {
            RefreshKind::Expiration => self.request_new_token(false),
            RefreshKind::Retry => self.request_new_token_with(TokenRequest::scheduled_retry()),
        }
    }

    fn dropped(&self, request: &TokenRequest, reason: &'static str) {
        debug!(
            reason,
            retry_after_failure = request.retry_after_failure,
            scheduled_retry = request.scheduled_retry,
            "token request dropped"
        );
        self.record(|m| m.requests_dropped.with_label_values(&[reason]).inc());
    }

    fn record<F: FnOnce(&Metrics)>(&self, f: F) {
        if let Some(metrics) = &self.inner.metrics {
            f(metrics);
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
