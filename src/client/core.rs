//! Caller-facing session client.
//!
//! The [`Client`] is a cheap, cloneable handle. Each
//! [`initialize`](Client::initialize) call replaces the session task behind
//! it; request ids come from one generator for the client's lifetime.
//!
//! # Example
//!
//! ```no_run
//! use gamesparks_rt::{Client, SessionConfig};
//! use serde_json::json;
//!
//! # async fn example() -> gamesparks_rt::Result<()> {
//! let client = Client::new();
//! client.initialize(
//!     SessionConfig::builder()
//!         .live("apiKey")
//!         .secret("apiSecret")
//!         .build()?,
//! );
//!
//! // ...once authenticated:
//! let response = client
//!     .send_with_data("LogEventRequest", &json!({ "eventKey": "SCORE", "score": 10 }))
//!     .await?;
//! println!("{:?}", response.into_result()?);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdGenerator, SessionId};
use crate::protocol::{Request, RequestType, Response};

use super::builder::SessionConfig;
use super::session::{ConnectionState, SessionCommand, SessionTask, SessionView};

// ============================================================================
// Types
// ============================================================================

/// Handle to one running session task.
struct SessionHandle {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    view: Arc<SessionView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn spawn(config: SessionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let view = Arc::new(SessionView::new(config.endpoint.as_str()));
        let task = SessionTask::spawn(config, Arc::clone(&view), command_rx);

        Self {
            command_tx,
            view,
            task,
        }
    }
}

/// Internal shared state for the client.
struct ClientInner {
    ids: RequestIdGenerator,
    current: Mutex<Option<SessionHandle>>,
}

// ============================================================================
// Client
// ============================================================================

/// Real-time session client.
///
/// # Thread Safety
///
/// `Client` is `Send + Sync` and cheap to clone; all clones share the
/// same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.connection_state())
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Creates a client with no session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClientInner {
                ids: RequestIdGenerator::new(),
                current: Mutex::new(None),
            }),
        }
    }

    /// Starts a fresh session and connects.
    ///
    /// Any previous session is torn down first: its socket is closed
    /// without reconnecting and its pending requests fail with
    /// [`Error::Cancelled`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn initialize(&self, config: SessionConfig) {
        let mut current = self.inner.current.lock();

        if let Some(previous) = current.take() {
            debug!("Tearing down previous session");
            let _ = previous.command_tx.send(SessionCommand::Shutdown);
        }

        debug!(endpoint = %config.endpoint, "Initialising session");
        *current = Some(SessionHandle::spawn(config));
    }

    /// Tears down the current session and waits for it to finish.
    pub async fn shutdown(&self) {
        let previous = self.inner.current.lock().take();

        if let Some(previous) = previous {
            let _ = previous.command_tx.send(SessionCommand::Shutdown);
            let _ = previous.task.await;
        }
    }
}

// ============================================================================
// Client - Requests
// ============================================================================

impl Client {
    /// Sends a request with an empty payload and awaits its response.
    ///
    /// See [`send_with_data`](Self::send_with_data).
    pub fn send(&self, request_type: impl Into<RequestType>) -> PendingResponse {
        self.send_with_data(request_type, &Value::Null)
    }

    /// Sends a request and awaits its response.
    ///
    /// The type is normalized to the dotted-class convention and the
    /// payload (a JSON object) is stamped with `@class` and a fresh
    /// `requestId`.
    ///
    /// The returned future resolves exactly once:
    ///
    /// - [`Error::NotInitialized`] immediately, with nothing sent, if the
    ///   session is not authenticated
    /// - the correlated [`Response`] when it arrives
    /// - [`Error::NoResponse`] after the request timeout (32s by default)
    /// - [`Error::Cancelled`] if the session is torn down first
    pub fn send_with_data<T>(&self, request_type: impl Into<RequestType>, payload: &T) -> PendingResponse
    where
        T: Serialize + ?Sized,
    {
        let (command_tx, request) = match self.prepare(request_type.into(), payload) {
            Ok(prepared) => prepared,
            Err(e) => return PendingResponse::ready(e),
        };
        let request_id = request.request_id.clone();

        let (completion, rx) = oneshot::channel();
        let command = SessionCommand::Send {
            request,
            completion: Some(completion),
        };

        if command_tx.send(command).is_err() {
            return PendingResponse::ready(Error::NotInitialized);
        }

        debug!(%request_id, "Request queued");
        PendingResponse::waiting(request_id, rx)
    }

    /// Sends a request without awaiting a response.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the session is not authenticated
    /// - [`Error::InvalidArgument`] if the payload is not a JSON object
    pub fn post<T>(&self, request_type: impl Into<RequestType>, payload: &T) -> Result<RequestId>
    where
        T: Serialize + ?Sized,
    {
        let (command_tx, request) = self.prepare(request_type.into(), payload)?;
        let request_id = request.request_id.clone();

        command_tx
            .send(SessionCommand::Send {
                request,
                completion: None,
            })
            .map_err(|_| Error::NotInitialized)?;

        Ok(request_id)
    }

    /// Checks the session is usable and builds the stamped request.
    fn prepare<T>(
        &self,
        class: RequestType,
        payload: &T,
    ) -> Result<(mpsc::UnboundedSender<SessionCommand>, Request)>
    where
        T: Serialize + ?Sized,
    {
        let command_tx = {
            let current = self.inner.current.lock();
            match current.as_ref() {
                Some(handle) if handle.view.is_initialised() => handle.command_tx.clone(),
                _ => return Err(Error::NotInitialized),
            }
        };

        let payload = serde_json::to_value(payload)?;
        let request = Request::new(class, self.inner.ids.next_id(), payload)?;
        Ok((command_tx, request))
    }
}

// ============================================================================
// Client - State
// ============================================================================

impl Client {
    /// Returns `true` while the session is authenticated.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.with_view(SessionView::is_initialised).unwrap_or(false)
    }

    /// Returns the session id granted by the last successful handshake.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.with_view(SessionView::session_id).flatten()
    }

    /// Returns the connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.with_view(SessionView::state).unwrap_or_default()
    }

    /// Returns the endpoint currently targeted.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.with_view(SessionView::endpoint)
    }

    fn with_view<R>(&self, f: impl FnOnce(&SessionView) -> R) -> Option<R> {
        self.inner.current.lock().as_ref().map(|handle| f(&handle.view))
    }
}

// ============================================================================
// PendingResponse
// ============================================================================

/// Future resolving to the response of one request.
#[must_use = "dropping a PendingResponse discards the response"]
pub struct PendingResponse {
    request_id: Option<RequestId>,
    state: PendingState,
}

enum PendingState {
    Ready(Option<Error>),
    Waiting(oneshot::Receiver<Result<Response>>),
}

impl PendingResponse {
    fn ready(error: Error) -> Self {
        Self {
            request_id: None,
            state: PendingState::Ready(Some(error)),
        }
    }

    fn waiting(request_id: RequestId, rx: oneshot::Receiver<Result<Response>>) -> Self {
        Self {
            request_id: Some(request_id),
            state: PendingState::Waiting(rx),
        }
    }

    /// Returns the id stamped on the request, if it was sent.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Returns `true` if the request failed before being sent.
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self.state, PendingState::Ready(_))
    }
}

impl Future for PendingResponse {
    type Output = Result<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            PendingState::Ready(error) => Poll::Ready(Err(error.take().unwrap_or(Error::Cancelled))),
            PendingState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|result| result.unwrap_or(Err(Error::Cancelled))),
        }
    }
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse")
            .field("request_id", &self.request_id)
            .field("rejected", &self.is_rejected())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
