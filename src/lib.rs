//! GameSparks real-time session client.
//!
//! This library keeps an authenticated WebSocket session to the GameSparks
//! game backend: it connects, signs the server's nonce challenge,
//! correlates requests with their responses, delivers server pushes, sends
//! keepalives and reconnects when the socket drops.
//!
//! # Architecture
//!
//! Key design principles:
//!
//! - Each [`Client::initialize`] owns one session task: socket + handshake
//!   + pending requests + keepalive, processed one event at a time
//! - Requests return a future that resolves exactly once
//! - Inbound frames are a tagged union on `@class`
//! - The socket, the nonce signer and the platform identity are traits
//!
//! # Quick Start
//!
//! ```no_run
//! use gamesparks_rt::{Client, Result, SessionConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new();
//!     client.initialize(
//!         SessionConfig::builder()
//!             .preview("exampleKey")
//!             .secret("exampleSecret")
//!             .on_authenticated(|session_id| println!("session {session_id}"))
//!             .on_message(|message| println!("push {}", message.class()))
//!             .on_error(|err| eprintln!("connection error: {err}"))
//!             .build()?,
//!     );
//!
//!     // Wait for authentication, then:
//!     let response = client
//!         .send_with_data("LogEventRequest", &json!({ "eventKey": "SCORE", "score": 10 }))
//!         .await?;
//!     println!("{:?}", response.into_result()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Nonce signing |
//! | [`client`] | [`Client`], [`SessionConfig`], session task |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`identity`] | Platform/OS identity providers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Socket abstraction and WebSocket transport |

// ============================================================================
// Modules
// ============================================================================

/// Nonce signing for the authentication handshake.
pub mod auth;

/// Session client.
///
/// Use [`Client::new()`] and [`Client::initialize()`] to start a session.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Platform and OS identity reported during authentication.
pub mod identity;

/// WebSocket protocol message types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Auth types
pub use auth::{HmacSigner, NonceSigner};

// Client types
pub use client::{
    Client, ConnectionState, Endpoint, PendingResponse, ReconnectPolicy, SessionConfig,
    SessionConfigBuilder,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionId};

// Identity types
pub use identity::{HostIdentity, IdentityProvider, StaticIdentity, UserAgentIdentity};

// Protocol types
pub use protocol::{Message, RequestType, Response};

// Transport types
pub use transport::{Outbound, Socket, SocketEvent, Transport, WebSocketTransport};
