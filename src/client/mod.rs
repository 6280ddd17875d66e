//! Session client.
//!
//! This module contains the session lifecycle: configuration, the caller
//! facade, and the single task that owns connection, handshake,
//! correlation and keepalive state.
//!
//! # Data Flow
//!
//! ```text
//! Client::initialize ──► SessionTask ──► Transport::open
//!                             │
//!        SocketEvent::Message ▼
//!                        decode(frame)
//!           ┌─────────────────┼──────────────────┐
//!           ▼                 ▼                  ▼
//!       Handshake      PendingRequests      on_message
//!                             ▲
//! Client::send ──► SessionCommand::Send
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | `SessionConfig` and its builder |
//! | `core` | `Client` and `PendingResponse` |
//! | `correlation` | Pending request table with deadlines |
//! | `endpoint` | Endpoint URLs |
//! | `handshake` | Authentication state machine |
//! | `keepalive` | Heartbeat timer |
//! | `reconnect` | Reconnect policy |
//! | `session` | Session task and connection state |

// ============================================================================
// Submodules
// ============================================================================

/// Session configuration builder.
pub mod builder;

/// Client facade.
pub mod core;

/// Request/response correlation.
mod correlation;

/// Endpoint URLs.
pub mod endpoint;

/// Authentication handshake.
pub mod handshake;

/// Keepalive timer.
mod keepalive;

/// Reconnect policy.
pub mod reconnect;

/// Session task.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{
    AuthenticatedHandler, DEFAULT_REQUEST_TIMEOUT, ErrorHandler, MessageHandler, SessionConfig,
    SessionConfigBuilder,
};
pub use self::core::{Client, PendingResponse};
pub use endpoint::Endpoint;
pub use handshake::{HandshakeAction, HandshakeState};
pub use keepalive::DEFAULT_KEEPALIVE_INTERVAL;
pub use reconnect::ReconnectPolicy;
pub use session::ConnectionState;
