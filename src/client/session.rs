//! Session task: connection manager and message dispatcher.
//!
//! One task per [`Client::initialize`](super::Client::initialize) call owns
//! all mutable session state and processes, one at a time:
//!
//! - commands from [`Client`](super::Client) handles
//! - socket open results and socket events
//! - request deadline expiries
//! - keepalive ticks
//!
//! # Connection States
//!
//! ```text
//!            open ok                 sessionId
//! Connecting ───────► OpenUnauthenticated ───────► Authenticated
//!     ▲                    │       │                     │
//!     │  close (policy)    │       │ error               │ close / error
//!     └────────────────────┴───────┼─────────────────────┘
//!                                  ▼
//!                               Errored  (no reconnect until re-initialize)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};
use crate::protocol::{HEARTBEAT, HandshakeFrame, InboundFrame, Request, decode};
use crate::transport::{Socket, SocketEvent};

use super::builder::SessionConfig;
use super::correlation::{Completion, PendingRequests};
use super::handshake::{Handshake, HandshakeAction};
use super::keepalive::Keepalive;
use super::reconnect::should_reconnect;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session, or the session has been torn down.
    #[default]
    Idle,
    /// Opening a socket.
    Connecting,
    /// Socket open, handshake in progress.
    OpenUnauthenticated,
    /// Handshake complete; requests may be sent.
    Authenticated,
    /// Tearing down.
    Closing,
    /// The socket failed; no automatic reconnect.
    Errored,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    #[inline]
    pub(crate) const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::OpenUnauthenticated => 2,
            Self::Authenticated => 3,
            Self::Closing => 4,
            Self::Errored => 5,
        }
    }

    /// Convert from u8.
    #[inline]
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::OpenUnauthenticated,
            3 => Self::Authenticated,
            4 => Self::Closing,
            5 => Self::Errored,
            _ => Self::Idle,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Credentials and identity of the current session.
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Server-issued credential; never exposed to callers.
    pub auth_token: Option<String>,
    /// Server-issued session id.
    pub session_id: Option<SessionId>,
    /// Whether the current socket completed the handshake.
    pub authenticated: bool,
}

// ============================================================================
// SessionView
// ============================================================================

/// Read-only mirror of session state for caller-facing getters.
///
/// Written only by the session task.
#[derive(Debug)]
pub(crate) struct SessionView {
    state: AtomicU8,
    session_id: RwLock<Option<SessionId>>,
    endpoint: RwLock<String>,
}

impl SessionView {
    pub(crate) fn new(endpoint: &str) -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle.to_u8()),
            session_id: RwLock::new(None),
            endpoint: RwLock::new(endpoint.to_string()),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn is_initialised(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    #[inline]
    pub(crate) fn session_id(&self) -> Option<SessionId> {
        self.session_id.read().clone()
    }

    #[inline]
    pub(crate) fn endpoint(&self) -> String {
        self.endpoint.read().clone()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    fn set_session_id(&self, session_id: SessionId) {
        *self.session_id.write() = Some(session_id);
    }

    fn set_endpoint(&self, endpoint: &str) {
        *self.endpoint.write() = endpoint.to_string();
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Commands from client handles to the session task.
pub(crate) enum SessionCommand {
    /// Transmit a request, optionally awaiting its reply.
    Send {
        request: Request,
        completion: Option<Completion>,
    },
    /// Tear the session down.
    Shutdown,
}

// ============================================================================
// SessionTask
// ============================================================================

/// State owned by the session task.
pub(crate) struct SessionTask {
    config: SessionConfig,
    view: Arc<SessionView>,
    session: Session,
    state: ConnectionState,
    endpoint: String,
    socket: Option<Socket>,
    connecting: Option<BoxFuture<'static, Result<Socket>>>,
    handshake: Handshake,
    pending: PendingRequests,
    expiry_rx: mpsc::UnboundedReceiver<RequestId>,
    keepalive: Keepalive,
    reconnect_attempts: u32,
}

impl SessionTask {
    /// Spawns a session task and starts connecting.
    pub(crate) fn spawn(
        config: SessionConfig,
        view: Arc<SessionView>,
        command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> JoinHandle<()> {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let task = Self {
            endpoint: config.endpoint.as_str().to_string(),
            handshake: Handshake::new(Arc::clone(&config.signer), Arc::clone(&config.identity)),
            pending: PendingRequests::new(config.request_timeout, expiry_tx),
            keepalive: Keepalive::new(config.keepalive_interval),
            config,
            view,
            session: Session::default(),
            state: ConnectionState::Idle,
            socket: None,
            connecting: None,
            expiry_rx,
            reconnect_attempts: 0,
        };

        tokio::spawn(task.run(command_rx))
    }

    /// Event loop.
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<SessionCommand>) {
        self.connect(Duration::ZERO);

        loop {
            // Commands first: a queued Shutdown must win over socket events.
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send { request, completion }) => {
                            self.handle_send(request, completion);
                        }

                        Some(SessionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }

                opened = next_open(&mut self.connecting) => {
                    self.connecting = None;
                    self.handle_open(opened);
                }

                event = next_event(&mut self.socket) => {
                    self.handle_socket_event(event);
                }

                Some(request_id) = self.expiry_rx.recv() => {
                    self.pending.expire(&request_id);
                }

                () = self.keepalive.tick() => {
                    self.handle_keepalive();
                }
            }
        }

        self.teardown();
        debug!("Session task terminated");
    }

    // ========================================================================
    // Connection Management
    // ========================================================================

    /// Starts opening a socket to the current endpoint.
    fn connect(&mut self, delay: Duration) {
        self.set_state(ConnectionState::Connecting);

        let transport = Arc::clone(&self.config.transport);
        let url = self.endpoint.clone();
        debug!(%url, delay_ms = delay.as_millis() as u64, "Connecting");

        self.connecting = Some(Box::pin(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            transport.open(&url).await
        }));
    }

    fn handle_open(&mut self, opened: Result<Socket>) {
        match opened {
            Ok(socket) => {
                info!(url = %self.endpoint, "Socket open");
                self.socket = Some(socket);
                self.handshake.reset();
                self.set_state(ConnectionState::OpenUnauthenticated);
            }
            Err(e) => {
                self.handle_transport_error(e.to_string());
            }
        }
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Message(text) => self.dispatch(&text),
            SocketEvent::Error(message) => self.handle_transport_error(message),
            SocketEvent::Closed => self.handle_close(),
        }
    }

    /// Marks the connection errored and reverts to the configured endpoint.
    fn handle_transport_error(&mut self, message: String) {
        error!(url = %self.endpoint, error = %message, "Socket error");

        self.endpoint = self.config.endpoint.as_str().to_string();
        self.view.set_endpoint(&self.endpoint);
        self.set_state(ConnectionState::Errored);
        self.notify_error(&Error::transport(message));
    }

    fn handle_close(&mut self) {
        self.socket = None;

        if !should_reconnect(self.state) {
            debug!(state = ?self.state, "Socket closed, not reconnecting");
            return;
        }

        let attempt = self.reconnect_attempts.saturating_add(1);
        match self.config.reconnect.next_delay(attempt) {
            Some(delay) => {
                info!(attempt, "Socket closed, reconnecting");
                self.reconnect_attempts = attempt;
                self.connect(delay);
            }
            None => {
                warn!(attempts = self.reconnect_attempts, "Reconnect attempts exhausted");
                self.set_state(ConnectionState::Errored);
                self.notify_error(&Error::reconnect_exhausted(self.reconnect_attempts));
            }
        }
    }

    /// Closes the socket, abandons any connect, and cancels pending requests.
    fn teardown(&mut self) {
        self.set_state(ConnectionState::Closing);
        self.keepalive.stop();
        self.connecting = None;

        if let Some(socket) = self.socket.take() {
            socket.close();
        }

        self.pending.flush();
        self.set_state(ConnectionState::Idle);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Routes an inbound text frame.
    fn dispatch(&mut self, text: &str) {
        if text.trim().is_empty() {
            trace!("Heartbeat received");
            return;
        }

        trace!(frame = %text, "Frame received");

        let decoded = match decode(text) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        if let Some(token) = decoded.auth_token {
            self.session.auth_token = Some(token);
        }

        match decoded.frame {
            InboundFrame::Handshake(frame) => self.handle_handshake(frame),

            InboundFrame::Response {
                request_id: Some(request_id),
                response,
            } => {
                self.pending.resolve(&request_id, response);
            }

            InboundFrame::Response {
                request_id: None,
                response,
            } => {
                debug!(class = response.class(), "Dropping response without requestId");
            }

            InboundFrame::Message(message) => {
                if let Some(handler) = &self.config.on_message {
                    handler(message);
                }
            }
        }
    }

    fn handle_handshake(&mut self, frame: HandshakeFrame) {
        match self.handshake.on_frame(frame, &mut self.session) {
            HandshakeAction::Redirect(url) => {
                info!(%url, "Redirected by server");
                self.endpoint = url;
                self.view.set_endpoint(&self.endpoint);

                if let Some(socket) = self.socket.take() {
                    socket.close();
                }
                self.connect(Duration::ZERO);
            }

            HandshakeAction::Authenticate(request) => match request.to_json() {
                Ok(json) => {
                    self.transmit(json);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to serialize handshake reply");
                }
            },

            HandshakeAction::Authenticated(session_id) => {
                info!(%session_id, "Session authenticated");
                self.view.set_session_id(session_id.clone());
                self.set_state(ConnectionState::Authenticated);
                self.reconnect_attempts = 0;
                self.keepalive.start();

                if let Some(handler) = &self.config.on_authenticated {
                    handler(&session_id);
                }
            }

            HandshakeAction::Ignore => {
                trace!(state = ?self.handshake.state(), "Ignoring handshake frame");
            }
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn handle_send(&mut self, request: Request, completion: Option<Completion>) {
        if !self.session.authenticated {
            if let Some(completion) = completion {
                let _ = completion.send(Err(Error::NotInitialized));
            }
            return;
        }

        let json = match request.to_json() {
            Ok(json) => json,
            Err(e) => {
                if let Some(completion) = completion {
                    let _ = completion.send(Err(e));
                }
                return;
            }
        };

        if let Some(completion) = completion {
            self.pending.register(request.request_id.clone(), completion);
        }

        self.transmit(json);
    }

    fn handle_keepalive(&mut self) {
        if self.state == ConnectionState::Authenticated && self.transmit(HEARTBEAT.to_string()) {
            trace!("Heartbeat sent");
        } else {
            debug!("Keepalive stopped");
            self.keepalive.stop();
        }
    }

    /// Queues a frame on the current socket.
    fn transmit(&mut self, text: String) -> bool {
        let Some(socket) = &self.socket else {
            debug!("No socket, frame dropped");
            return false;
        };

        trace!(frame = %text, "Frame sent");
        socket.send(text)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.session.authenticated = state == ConnectionState::Authenticated;
        self.view.set_state(state);
    }

    fn notify_error(&self, err: &Error) {
        if let Some(handler) = &self.config.on_error {
            handler(err);
        }
    }
}

// ============================================================================
// Branch Helpers
// ============================================================================

/// Waits for the in-flight connect, if any.
async fn next_open(connecting: &mut Option<BoxFuture<'static, Result<Socket>>>) -> Result<Socket> {
    match connecting.as_mut() {
        Some(future) => future.await,
        None => pending().await,
    }
}

/// Waits for the next event of the current socket, if any.
async fn next_event(socket: &mut Option<Socket>) -> SocketEvent {
    match socket.as_mut() {
        Some(socket) => socket.events.recv().await.unwrap_or(SocketEvent::Closed),
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::OpenUnauthenticated,
            ConnectionState::Authenticated,
            ConnectionState::Closing,
            ConnectionState::Errored,
        ] {
            assert_eq!(ConnectionState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn test_view_initialised_only_when_authenticated() {
        let view = SessionView::new("wss://example.com/ws");
        assert!(!view.is_initialised());

        view.set_state(ConnectionState::Authenticated);
        assert!(view.is_initialised());

        view.set_state(ConnectionState::Errored);
        assert!(!view.is_initialised());
    }

    #[test]
    fn test_view_tracks_endpoint_and_session() {
        let view = SessionView::new("wss://a/ws");
        assert_eq!(view.endpoint(), "wss://a/ws");
        assert_eq!(view.session_id(), None);

        view.set_endpoint("wss://b/ws");
        view.set_session_id(SessionId::from("s"));
        assert_eq!(view.endpoint(), "wss://b/ws");
        assert_eq!(view.session_id(), Some(SessionId::from("s")));
    }
}
