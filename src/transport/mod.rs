//! WebSocket transport layer.
//!
//! This module hides the socket behind a narrow trait so the session
//! logic can run over tokio-tungstenite in production and over in-memory
//! channels in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  Outbound   ┌──────────────┐      wss://      ┌──────────┐
//! │  Session task   │────────────►│  Pump task   │◄────────────────►│  Server  │
//! │                 │◄────────────│              │                  │          │
//! └─────────────────┘ SocketEvent └──────────────┘                  └──────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `socket` | `Transport` trait and channel-backed `Socket` |
//! | `websocket` | tokio-tungstenite implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Transport trait and socket channels.
pub mod socket;

/// tokio-tungstenite transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use socket::{Outbound, Socket, SocketEvent, Transport};
pub use websocket::WebSocketTransport;
