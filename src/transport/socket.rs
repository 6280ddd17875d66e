//! Transport capability surface.
//!
//! The session only needs four things from a socket: a way to open it,
//! a way to send text, a way to close it, and a stream of
//! message/error/close events. [`Transport`] opens a [`Socket`], which is
//! that surface expressed as a pair of channels.
//!
//! Dropping a [`Socket`]'s outbound sender closes the underlying
//! connection, as does [`Outbound::Close`].

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Frame or control sent towards the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame.
    Text(String),
    /// Close the connection.
    Close,
}

/// Event delivered by an open socket.
///
/// An [`SocketEvent::Error`] is always followed by [`SocketEvent::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Inbound text frame.
    Message(String),
    /// Socket failure.
    Error(String),
    /// Connection closed.
    Closed,
}

// ============================================================================
// Socket
// ============================================================================

/// An open connection, as channels.
#[derive(Debug)]
pub struct Socket {
    /// Frames to transmit.
    pub outbound: mpsc::UnboundedSender<Outbound>,
    /// Events from the connection.
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl Socket {
    /// Queues a text frame.
    ///
    /// Returns `false` if the connection is already gone.
    #[inline]
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.outbound.send(Outbound::Text(text.into())).is_ok()
    }

    /// Asks the connection to close.
    #[inline]
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Opens sockets to a URL.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a connection. Resolves once the socket is open.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established; the
    /// session treats this exactly like a socket error.
    async fn open(&self, url: &str) -> Result<Socket>;
}
