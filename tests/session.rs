//! Session behaviour against an in-memory transport.
//!
//! Every socket the client opens is handed to the test as a [`ServerEnd`],
//! so the test plays the server: it pushes frames, reads what the client
//! transmits, and closes or fails the connection. Time is paused, so
//! request deadlines and keepalive ticks are observed in virtual time.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gamesparks_rt::{
    Client, ConnectionState, Error, Message, Outbound, ReconnectPolicy, SessionConfig, SessionId,
    Socket, SocketEvent, StaticIdentity, Transport,
};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Fixtures
// ============================================================================

const ENDPOINT: &str = "wss://lb.example.test/ws/key";
const REDIRECT: &str = "wss://node-7.example.test/ws/key";
const SECRET: &str = "abc";
const HANDSHAKE: &str = ".AuthenticatedConnectResponse";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Virtual time only advances to timer ticks, so allow a little slack.
fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

fn expected_hmac(secret: &str, nonce: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("any key length");
    mac.update(nonce.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// The server side of one opened socket.
struct ServerEnd {
    url: String,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl ServerEnd {
    fn push(&self, frame: Value) {
        self.events
            .send(SocketEvent::Message(frame.to_string()))
            .expect("session is listening");
    }

    fn emit(&self, event: SocketEvent) {
        self.events.send(event).expect("session is listening");
    }

    /// Next non-heartbeat frame the client transmitted.
    async fn next_frame(&mut self) -> Result<Value> {
        loop {
            match self.outbound.recv().await {
                Some(Outbound::Text(text)) if text.trim().is_empty() => continue,
                Some(Outbound::Text(text)) => return Ok(serde_json::from_str(&text)?),
                other => anyhow::bail!("expected a text frame, got {other:?}"),
            }
        }
    }
}

/// Hands each opened socket to the test.
struct MockTransport {
    opened: mpsc::UnboundedSender<ServerEnd>,
    refused: Option<&'static str>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> gamesparks_rt::Result<Socket> {
        if self.refused == Some(url) {
            return Err(gamesparks_rt::Error::transport(format!("connection refused: {url}")));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        self.opened
            .send(ServerEnd {
                url: url.to_string(),
                outbound: outbound_rx,
                events: events_tx,
            })
            .map_err(|_| gamesparks_rt::Error::transport("test dropped"))?;

        Ok(Socket {
            outbound: outbound_tx,
            events: events_rx,
        })
    }
}

struct Harness {
    client: Client,
    opened_tx: mpsc::UnboundedSender<ServerEnd>,
    opened: mpsc::UnboundedReceiver<ServerEnd>,
    authenticated_tx: mpsc::UnboundedSender<SessionId>,
    authenticated: mpsc::UnboundedReceiver<SessionId>,
    messages_tx: mpsc::UnboundedSender<Message>,
    messages: mpsc::UnboundedReceiver<Message>,
    errors_tx: mpsc::UnboundedSender<String>,
    errors: mpsc::UnboundedReceiver<String>,
    reconnect: ReconnectPolicy,
    refused: Option<&'static str>,
}

impl Harness {
    fn new() -> Self {
        init_tracing();

        let (opened_tx, opened) = mpsc::unbounded_channel();
        let (authenticated_tx, authenticated) = mpsc::unbounded_channel();
        let (messages_tx, messages) = mpsc::unbounded_channel();
        let (errors_tx, errors) = mpsc::unbounded_channel();

        Self {
            client: Client::new(),
            opened_tx,
            opened,
            authenticated_tx,
            authenticated,
            messages_tx,
            messages,
            errors_tx,
            errors,
            reconnect: ReconnectPolicy::Immediate,
            refused: None,
        }
    }

    fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    fn refusing(mut self, url: &'static str) -> Self {
        self.refused = Some(url);
        self
    }

    fn config(&self) -> SessionConfig {
        let authenticated = self.authenticated_tx.clone();
        let messages = self.messages_tx.clone();
        let errors = self.errors_tx.clone();

        SessionConfig::builder()
            .endpoint(ENDPOINT)
            .secret(SECRET)
            .identity(StaticIdentity::new("Rust", "Linux"))
            .transport(MockTransport {
                opened: self.opened_tx.clone(),
                refused: self.refused,
            })
            .reconnect_policy(self.reconnect)
            .on_authenticated(move |session_id| {
                let _ = authenticated.send(session_id.clone());
            })
            .on_message(move |message| {
                let _ = messages.send(message);
            })
            .on_error(move |err: &Error| {
                assert!(err.is_connection_error());
                let _ = errors.send(err.to_string());
            })
            .build()
            .expect("valid config")
    }

    fn initialize(&self) {
        self.client.initialize(self.config());
    }

    async fn next_socket(&mut self) -> Result<ServerEnd> {
        self.opened.recv().await.context("transport dropped")
    }

    /// Runs the nonce handshake and returns the client's signed reply.
    async fn authenticate(&mut self, server: &mut ServerEnd, session_id: &str) -> Result<Value> {
        server.push(json!({ "@class": HANDSHAKE, "nonce": "n1" }));
        let reply = server.next_frame().await?;

        server.push(json!({
            "@class": HANDSHAKE,
            "sessionId": session_id,
            "authToken": "tok-1",
        }));
        let granted = self.authenticated.recv().await.context("no authentication")?;
        assert_eq!(granted, session_id);

        Ok(reply)
    }

    /// Initializes and authenticates on the first socket.
    async fn connected(&mut self) -> Result<ServerEnd> {
        self.initialize();
        let mut server = self.next_socket().await?;
        self.authenticate(&mut server, "sess-1").await?;
        Ok(server)
    }
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_handshake_signs_nonce_and_authenticates() -> Result<()> {
    let mut harness = Harness::new();
    harness.initialize();

    let mut server = harness.next_socket().await?;
    assert_eq!(server.url, ENDPOINT);
    assert!(!harness.client.is_initialised());

    let reply = harness.authenticate(&mut server, "sess-1").await?;
    assert_eq!(reply["@class"], ".AuthenticatedConnectRequest");
    assert_eq!(reply["hmac"], expected_hmac(SECRET, "n1"));
    assert_eq!(reply["platform"], "Rust");
    assert_eq!(reply["os"], "Linux");
    assert!(reply.get("authToken").is_none());
    assert!(reply.get("sessionId").is_none());

    assert!(harness.client.is_initialised());
    assert_eq!(harness.client.connection_state(), ConnectionState::Authenticated);
    assert_eq!(harness.client.session_id(), Some(SessionId::from("sess-1")));
    assert!(harness.authenticated.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_redirect_reconnects_without_authenticating() -> Result<()> {
    let mut harness = Harness::new();
    harness.initialize();

    let mut first = harness.next_socket().await?;
    first.push(json!({ "@class": HANDSHAKE, "connectUrl": REDIRECT }));

    let mut second = harness.next_socket().await?;
    assert_eq!(second.url, REDIRECT);
    assert_eq!(harness.client.endpoint().as_deref(), Some(REDIRECT));
    assert_eq!(first.outbound.recv().await, Some(Outbound::Close));
    assert!(first.outbound.try_recv().is_err());

    let reply = harness.authenticate(&mut second, "sess-1").await?;
    assert_eq!(reply["hmac"], expected_hmac(SECRET, "n1"));
    assert!(harness.client.is_initialised());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_replays_session_hints_and_keeps_ids_distinct() -> Result<()> {
    let mut harness = Harness::new();
    let mut first = harness.connected().await?;

    let before = harness.client.send("LogEventRequest");
    let before_id = first.next_frame().await?["requestId"].clone();

    first.emit(SocketEvent::Closed);
    let mut second = harness.next_socket().await?;
    assert_eq!(second.url, ENDPOINT);
    assert!(!harness.client.is_initialised());

    let reply = harness.authenticate(&mut second, "sess-2").await?;
    assert_eq!(reply["authToken"], "tok-1");
    assert_eq!(reply["sessionId"], "sess-1");
    assert_eq!(harness.client.session_id(), Some(SessionId::from("sess-2")));

    let after = harness.client.send("LogEventRequest");
    let after_id = second.next_frame().await?["requestId"].clone();
    assert_ne!(before_id, after_id);

    // Requests issued before the drop are still correlated.
    second.push(json!({ "@class": ".LogEventResponse", "requestId": before_id }));
    second.push(json!({ "@class": ".LogEventResponse", "requestId": after_id }));
    assert_eq!(before.await?.class(), ".LogEventResponse");
    assert_eq!(after.await?.class(), ".LogEventResponse");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_backoff_policy_delays_reconnect() -> Result<()> {
    let mut harness = Harness::new().with_reconnect(ReconnectPolicy::backoff());
    let first = harness.connected().await?;

    let closed_at = Instant::now();
    first.emit(SocketEvent::Closed);
    let _second = harness.next_socket().await?;

    assert_elapsed(closed_at, Duration::from_secs(1));
    assert_eq!(harness.client.connection_state(), ConnectionState::OpenUnauthenticated);
    Ok(())
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_send_before_authentication_is_rejected() -> Result<()> {
    let mut harness = Harness::new();
    harness.initialize();
    let mut server = harness.next_socket().await?;

    let pending = harness.client.send_with_data("LogEventRequest", &json!({ "eventKey": "X" }));
    assert!(pending.is_rejected());
    assert!(matches!(pending.await, Err(Error::NotInitialized)));
    assert!(matches!(
        harness.client.post("LogEventRequest", &json!({})),
        Err(Error::NotInitialized)
    ));

    sleep(Duration::from_millis(10)).await;
    assert!(server.outbound.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_response_resolves_request_once() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;

    let pending = harness
        .client
        .send_with_data("LogEventRequest", &json!({ "eventKey": "SCORE", "score": 10 }));
    let request_id = pending.request_id().cloned().context("request was sent")?;

    let frame = server.next_frame().await?;
    assert_eq!(frame["@class"], ".LogEventRequest");
    assert_eq!(frame["requestId"], request_id.as_str());
    assert_eq!(frame["eventKey"], "SCORE");
    assert_eq!(frame["score"], 10);

    server.push(json!({ "@class": ".UnknownResponse", "requestId": "0_0" }));
    server.push(json!({
        "@class": ".LogEventResponse",
        "requestId": request_id.as_str(),
        "scriptData": { "rank": 3 },
    }));
    server.push(json!({ "@class": ".LogEventResponse", "requestId": request_id.as_str() }));

    let response = pending.await?;
    assert_eq!(response.class(), ".LogEventResponse");
    assert_eq!(response.get("scriptData"), Some(&json!({ "rank": 3 })));
    assert!(response.get("requestId").is_none());

    // Stray and duplicate responses are dropped, not treated as pushes.
    let follow_up = harness.client.send("AccountDetailsRequest");
    let follow_up_id = server.next_frame().await?["requestId"].clone();
    server.push(json!({ "@class": ".AccountDetailsResponse", "requestId": follow_up_id }));
    assert_eq!(follow_up.await?.class(), ".AccountDetailsResponse");
    assert!(harness.messages.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_server_error_surfaces_through_into_result() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;

    let pending = harness.client.send("LogEventRequest");
    let request_id = server.next_frame().await?["requestId"].clone();
    server.push(json!({
        "@class": ".LogEventResponse",
        "requestId": request_id,
        "error": { "eventKey": "INVALID" },
    }));

    let response = pending.await?;
    assert!(response.is_error());
    assert!(matches!(response.into_result(), Err(Error::Server { .. })));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_request_times_out_with_no_response() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;

    let started = Instant::now();
    let pending = harness.client.send("LogEventRequest");
    let request_id = server.next_frame().await?["requestId"].clone();

    let err = pending.await.expect_err("no response was sent");
    assert!(err.is_timeout());
    assert_elapsed(started, Duration::from_secs(32));

    // A late reply is dropped quietly.
    server.push(json!({ "@class": ".LogEventResponse", "requestId": request_id }));
    sleep(Duration::from_millis(10)).await;
    assert!(harness.client.is_initialised());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_post_stamps_request_id() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;

    let request_id = harness.client.post("LogEventRequest", &json!({ "eventKey": "X" }))?;
    let frame = server.next_frame().await?;
    assert_eq!(frame["requestId"], request_id.as_str());
    assert_eq!(frame["eventKey"], "X");

    let rejected = harness.client.post("LogEventRequest", &json!([1, 2]));
    assert!(matches!(rejected, Err(Error::InvalidArgument { .. })));
    Ok(())
}

// ============================================================================
// Inbound Messages
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_server_messages_reach_handler() -> Result<()> {
    let mut harness = Harness::new();
    let server = harness.connected().await?;

    server.push(json!({ "@class": ".ScriptMessage", "data": { "level": 4 } }));
    server.push(json!("not an object"));
    server.push(json!({ "@class": ".AchievementEarnedMessage", "authToken": "tok-2" }));

    let first = harness.messages.recv().await.context("script message")?;
    assert_eq!(first.class(), ".ScriptMessage");
    assert_eq!(first.get("data"), Some(&json!({ "level": 4 })));

    let second = harness.messages.recv().await.context("achievement message")?;
    assert_eq!(second.class(), ".AchievementEarnedMessage");
    assert!(second.get("authToken").is_none());
    Ok(())
}

// ============================================================================
// Keepalive
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_keepalive_sends_heartbeat_every_interval() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;
    let authenticated_at = Instant::now();

    for tick in 1..=3u64 {
        assert_eq!(server.outbound.recv().await, Some(Outbound::Text(" ".into())));
        assert_elapsed(authenticated_at, Duration::from_secs(30 * tick));
    }
    Ok(())
}

// ============================================================================
// Failure and Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_error_reverts_endpoint_without_reconnect() -> Result<()> {
    let mut harness = Harness::new();
    harness.initialize();

    let first = harness.next_socket().await?;
    first.push(json!({ "@class": HANDSHAKE, "connectUrl": REDIRECT }));
    let mut second = harness.next_socket().await?;
    harness.authenticate(&mut second, "sess-1").await?;

    second.emit(SocketEvent::Error("connection reset".into()));
    second.emit(SocketEvent::Closed);

    let reported = harness.errors.recv().await.context("error handler")?;
    assert!(reported.contains("connection reset"));
    assert_eq!(harness.client.endpoint().as_deref(), Some(ENDPOINT));
    assert_eq!(harness.client.connection_state(), ConnectionState::Errored);
    assert!(!harness.client.is_initialised());

    sleep(Duration::from_secs(60)).await;
    assert!(harness.opened.try_recv().is_err());
    assert!(harness.client.send("LogEventRequest").is_rejected());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reinitialize_cancels_pending_requests() -> Result<()> {
    let mut harness = Harness::new();
    let mut first = harness.connected().await?;

    let pending = harness.client.send("LogEventRequest");
    first.next_frame().await?;

    harness.initialize();
    assert!(matches!(pending.await, Err(Error::Cancelled)));
    assert_eq!(first.outbound.recv().await, Some(Outbound::Close));

    let mut second = harness.next_socket().await?;
    harness.authenticate(&mut second, "sess-3").await?;
    assert_eq!(harness.client.session_id(), Some(SessionId::from("sess-3")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_socket_and_cancels() -> Result<()> {
    let mut harness = Harness::new();
    let mut server = harness.connected().await?;

    let pending = harness.client.send("LogEventRequest");
    server.next_frame().await?;

    harness.client.shutdown().await;
    assert!(matches!(pending.await, Err(Error::Cancelled)));
    assert_eq!(server.outbound.recv().await, Some(Outbound::Close));
    assert_eq!(harness.client.connection_state(), ConnectionState::Idle);
    assert!(harness.client.send("LogEventRequest").is_rejected());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reinitialize_wins_over_queued_socket_events() -> Result<()> {
    let mut harness = Harness::new();

    for _ in 0..50 {
        let first = harness.connected().await?;
        first.push(json!({ "@class": ".ScriptMessage", "data": {} }));
        first.emit(SocketEvent::Closed);
        harness.initialize();

        let second = harness.next_socket().await?;
        assert_eq!(second.url, ENDPOINT);

        sleep(Duration::from_millis(50)).await;
        assert!(harness.opened.try_recv().is_err());
        assert!(harness.messages.try_recv().is_err());

        harness.client.shutdown().await;
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_backoff_reports_and_stops() -> Result<()> {
    let policy = ReconnectPolicy::Backoff {
        initial: Duration::from_secs(1),
        max: Duration::from_secs(4),
        multiplier: 2.0,
        max_attempts: 3,
    };
    let mut harness = Harness::new().with_reconnect(policy);
    harness.initialize();

    // The initial socket plus three reconnects, each closed at once.
    for _ in 0..4 {
        let server = harness.next_socket().await?;
        server.emit(SocketEvent::Closed);
    }

    let reported = harness.errors.recv().await.context("error handler")?;
    assert!(reported.contains("3 attempts"), "{reported}");
    assert_eq!(harness.client.connection_state(), ConnectionState::Errored);

    sleep(Duration::from_secs(60)).await;
    assert!(harness.opened.try_recv().is_err());
    assert!(harness.errors.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_open_reverts_endpoint_without_reconnect() -> Result<()> {
    let mut harness = Harness::new().refusing(REDIRECT);
    harness.initialize();

    let mut first = harness.next_socket().await?;
    first.push(json!({ "@class": HANDSHAKE, "connectUrl": REDIRECT }));

    let reported = harness.errors.recv().await.context("error handler")?;
    assert!(reported.contains("connection refused"), "{reported}");
    assert_eq!(harness.client.endpoint().as_deref(), Some(ENDPOINT));
    assert_eq!(harness.client.connection_state(), ConnectionState::Errored);
    assert_eq!(first.outbound.recv().await, Some(Outbound::Close));

    sleep(Duration::from_secs(60)).await;
    assert!(harness.opened.try_recv().is_err());
    assert!(harness.client.send("LogEventRequest").is_rejected());
    Ok(())
}
