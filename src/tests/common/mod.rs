// shared helpers for scenario tests
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::auth::handler::{ResultSink, TokenHandler};
use crate::auth::TokenRefreshCoordinator;
use crate::error::{AuthError, HandlerError};
use crate::resilience::retry::RetryPolicy;

/// Unsigned JWT whose `exp` is `secs` from now (wall clock).
pub fn jwt_expiring_in(secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"sub":"user-1","exp":{}}}"#,
        Utc::now().timestamp() + secs
    ));
    format!("{}.{}.signature", header, payload)
}

#[derive(Debug, Clone)]
pub enum Reply {
    Token(String),
    Empty,
    Fail(&'static str),
    Panic,
}

/// Token handler that plays back scripted replies and records overlapping calls.
pub struct ScriptedHandler {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
}

impl ScriptedHandler {
    fn build(replies: Vec<Reply>, fallback: Reply, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            gate,
            calls: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        })
    }

    pub fn always(reply: Reply) -> Arc<Self> {
        Self::build(Vec::new(), reply, None)
    }

    pub fn scripted(replies: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Self::build(replies, fallback, None)
    }

    /// Every call blocks until the test adds a permit to the returned semaphore.
    pub fn gated(reply: Reply) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self::build(Vec::new(), reply, Some(gate.clone())), gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenHandler for ScriptedHandler {
    async fn request_token(&self) -> Result<String, HandlerError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.in_flight.store(false, Ordering::SeqCst);

        match reply {
            Reply::Token(token) => Ok(token),
            Reply::Empty => Ok(String::new()),
            Reply::Fail(msg) => Err(msg.into()),
            Reply::Panic => panic!("handler blew up"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    TokenAvailable(Option<String>),
    Succeeded(String),
    Failed(&'static str),
}

/// Forwards every notification to a channel the test reads from.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ResultSink for RecordingSink {
    fn on_token_available(&self, token: Option<&str>) {
        let _ = self.tx.send(SinkEvent::TokenAvailable(token.map(str::to_owned)));
    }

    fn on_registration_succeeded(&self, token: &str) {
        let _ = self.tx.send(SinkEvent::Succeeded(token.to_owned()));
    }

    fn on_registration_failed(&self, cause: &AuthError) {
        let _ = self.tx.send(SinkEvent::Failed(cause.reason()));
    }
}

pub fn coordinator(
    handler: Arc<ScriptedHandler>,
    sink: Arc<RecordingSink>,
    policy: RetryPolicy,
) -> TokenRefreshCoordinator {
    TokenRefreshCoordinator::builder()
        .handler(handler)
        .sink(sink)
        .retry_policy(policy)
        .expiring_auth_token_refresh_period(Duration::from_secs(60))
        .spawn()
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> SinkEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for sink event")
        .expect("sink channel closed")
}

/// Reads the two notifications of one successful dispatch and returns the token.
pub async fn expect_success(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> String {
    let token = match next_event(rx).await {
        SinkEvent::TokenAvailable(Some(token)) => token,
        other => panic!("expected published token, got {:?}", other),
    };
    assert_eq!(next_event(rx).await, SinkEvent::Succeeded(token.clone()));
    token
}

/// Asserts that nothing else reaches the sink for a short while.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected sink event {:?}", event);
    }
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}
