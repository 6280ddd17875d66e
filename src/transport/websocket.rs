//! WebSocket transport built on tokio-tungstenite.
//!
//! Each opened socket gets a pump task that moves frames between the
//! WebSocket stream and the [`Socket`] channels. The pump ends when the
//! remote closes, the stream errors, or the local side closes or drops
//! its sender; a final [`SocketEvent::Closed`] is always emitted.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};

use super::socket::{Outbound, Socket, SocketEvent, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the TCP/TLS/WebSocket upgrade.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Opens `ws://` and `wss://` connections.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Creates a transport with the default connect timeout (30s).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the connect timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Socket> {
        // Fails harmlessly when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (ws_stream, _) = timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                Error::transport(format!(
                    "connect to {url} timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })??;

        debug!(%url, "WebSocket connection established");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_pump(ws_stream, outbound_rx, events_tx));

        Ok(Socket {
            outbound: outbound_tx,
            events: events_rx,
        })
    }
}

// ============================================================================
// Pump
// ============================================================================

/// Moves frames between the WebSocket and the socket channels.
async fn run_pump(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        if events_tx.send(SocketEvent::Message(text.as_str().to_owned())).is_err() {
                            let _ = ws_write.close().await;
                            break;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        let _ = events_tx.send(SocketEvent::Error(e.to_string()));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            command = outbound_rx.recv() => {
                match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            error!(error = %e, "WebSocket send failed");
                            let _ = events_tx.send(SocketEvent::Error(e.to_string()));
                            break;
                        }
                    }

                    Some(Outbound::Close) | None => {
                        debug!("Closing WebSocket");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    let _ = events_tx.send(SocketEvent::Closed);
    debug!("WebSocket pump terminated");
}

// ============================================================================
// Tests
// ============================================================================
