use tokio::time::{sleep, Duration};

use crate::auth::{RefreshKind, TokenRefreshCoordinator};
use crate::resilience::retry::RetryPolicy;
use crate::tests::common::{
    assert_quiet, expect_success, jwt_expiring_in, next_event, wait_until, RecordingSink, Reply,
    ScriptedHandler, SinkEvent,
};

fn with_refresh_period(
    handler: std::sync::Arc<ScriptedHandler>,
    sink: std::sync::Arc<RecordingSink>,
    period: Duration,
) -> TokenRefreshCoordinator {
    TokenRefreshCoordinator::builder()
        .handler(handler)
        .sink(sink)
        .retry_policy(RetryPolicy::fixed(3, Duration::from_secs(60)))
        .expiring_auth_token_refresh_period(period)
        .spawn()
}

#[tokio::test]
async fn success_arms_refresh_ahead_of_expiry() {
    let handler = ScriptedHandler::always(Reply::Token(jwt_expiring_in(20 * 60)));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler, sink, Duration::from_secs(5 * 60));

    coordinator.request_new_token(false);
    expect_success(&mut events).await;

    let armed = coordinator.armed_refresh().expect("expiration timer armed");
    assert_eq!(armed.kind, RefreshKind::Expiration);
    assert!(armed.remaining() <= Duration::from_secs(15 * 60));
    assert!(armed.remaining() > Duration::from_secs(15 * 60 - 5));
}

#[tokio::test]
async fn token_inside_refresh_window_arms_nothing() {
    let handler = ScriptedHandler::always(Reply::Token(jwt_expiring_in(2 * 60)));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler.clone(), sink, Duration::from_secs(5 * 60));

    coordinator.request_new_token(false);
    expect_success(&mut events).await;
    assert_quiet(&mut events).await;

    assert!(coordinator.armed_refresh().is_none());
    assert_eq!(handler.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiration_timer_requests_a_new_token() {
    let handler = ScriptedHandler::scripted(
        vec![Reply::Token(jwt_expiring_in(120))],
        Reply::Token(jwt_expiring_in(3600)),
    );
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler.clone(), sink, Duration::from_secs(60));

    coordinator.request_new_token(false);
    expect_success(&mut events).await;
    assert_eq!(coordinator.armed_refresh().map(|a| a.kind), Some(RefreshKind::Expiration));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(handler.calls(), 1);

    expect_success(&mut events).await;
    assert_eq!(handler.calls(), 2);
}

#[tokio::test]
async fn malformed_token_is_published_and_retried() {
    let handler = ScriptedHandler::always(Reply::Token("not-a-jwt".to_owned()));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler, sink, Duration::from_secs(60));

    coordinator.request_new_token(false);

    assert_eq!(next_event(&mut events).await, SinkEvent::Failed("malformed_token"));
    assert_eq!(expect_success(&mut events).await, "not-a-jwt");
    assert_eq!(coordinator.armed_refresh().map(|a| a.kind), Some(RefreshKind::Retry));
    assert_eq!(coordinator.snapshot().retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn opaque_tokens_stop_retrying_at_max_retry() {
    let handler = ScriptedHandler::always(Reply::Token("opaque-token".to_owned()));
    let (sink, _events) = RecordingSink::new();
    let coordinator = TokenRefreshCoordinator::builder()
        .handler(handler.clone())
        .sink(sink)
        .retry_policy(RetryPolicy::exponential(3, Duration::from_secs(1), 2.0))
        .spawn();

    coordinator.request_new_token(false);
    sleep(Duration::from_secs(600)).await;

    // retries after 1s and 2s, then the budget is spent
    assert_eq!(handler.calls(), 3);
    assert!(coordinator.armed_refresh().is_none());
    assert_eq!(coordinator.snapshot().retry_count, 3);
}

#[tokio::test]
async fn oversized_refresh_period_arms_nothing() {
    let handler = ScriptedHandler::always(Reply::Token(jwt_expiring_in(3600)));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler, sink, Duration::MAX);

    coordinator.request_new_token(false);
    expect_success(&mut events).await;
    assert_quiet(&mut events).await;

    assert!(coordinator.armed_refresh().is_none());
}

#[tokio::test]
async fn queued_expiration_replaces_pending_retry() {
    let handler = ScriptedHandler::always(Reply::Fail("down"));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler, sink, Duration::from_secs(60));

    coordinator.request_new_token(false);
    assert_eq!(next_event(&mut events).await, SinkEvent::Failed("handler_error"));
    wait_until(|| !coordinator.snapshot().pending_auth).await;
    assert_eq!(coordinator.armed_refresh().map(|a| a.kind), Some(RefreshKind::Retry));

    coordinator.queue_expiration_refresh(&jwt_expiring_in(3600));
    assert_eq!(coordinator.armed_refresh().map(|a| a.kind), Some(RefreshKind::Expiration));

    coordinator.clear_refresh_timer();
    assert!(coordinator.armed_refresh().is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_coordinator_stops_timers() {
    let handler = ScriptedHandler::always(Reply::Token(jwt_expiring_in(120)));
    let (sink, mut events) = RecordingSink::new();
    let coordinator = with_refresh_period(handler.clone(), sink, Duration::from_secs(60));

    coordinator.request_new_token(false);
    expect_success(&mut events).await;
    assert!(coordinator.armed_refresh().is_some());

    drop(coordinator);
    sleep(Duration::from_secs(600)).await;
    assert_eq!(handler.calls(), 1);
}
