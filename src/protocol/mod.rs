//! WebSocket protocol message types.
//!
//! This module defines the JSON frames exchanged with the game backend.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Caller request, correlated by `requestId` |
//! | `AuthenticatedConnectRequest` | Local → Remote | Signed handshake reply |
//! | `Response` | Remote → Local | Reply to a `Request` |
//! | `HandshakeFrame` | Remote → Local | Redirect, nonce or session grant |
//! | `Message` | Remote → Local | Server-initiated push |
//! | heartbeat | Local → Remote | The single-space text frame |
//!
//! # Class Naming
//!
//! Classes use a dotted form: `.LogEventRequest`, `.LogEventResponse`.
//! Anything whose class ends in `Response` is a reply.

// ============================================================================
// Submodules
// ============================================================================

/// Inbound frame decoding.
pub mod frame;

/// Outbound request types.
pub mod request;

// ============================================================================
// Wire Constants
// ============================================================================

/// Discriminator field present on every frame.
pub const CLASS_FIELD: &str = "@class";

/// Correlation field on requests and responses.
pub const REQUEST_ID_FIELD: &str = "requestId";

/// Credential field stripped from every inbound frame.
pub const AUTH_TOKEN_FIELD: &str = "authToken";

/// Class of the handshake frames sent by the server.
pub const AUTHENTICATED_CONNECT_RESPONSE: &str = ".AuthenticatedConnectResponse";

/// Class of the signed handshake reply.
pub const AUTHENTICATED_CONNECT_REQUEST: &str = ".AuthenticatedConnectRequest";

/// Class suffix marking replies.
pub const RESPONSE_SUFFIX: &str = "Response";

/// Keepalive frame payload.
pub const HEARTBEAT: &str = " ";

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{DecodedFrame, HandshakeFrame, InboundFrame, Message, Response, decode};
pub use request::{AuthenticatedConnectRequest, Request, RequestType};
