//! Error types for the real-time session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use gamesparks_rt::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     let response = client.send("AccountDetailsRequest").await?;
//!     let body = response.into_result()?;
//!     println!("{body:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Reported to |
//! |----------|----------|-------------|
//! | Request | [`Error::NotInitialized`], [`Error::NoResponse`], [`Error::Cancelled`], [`Error::Server`] | the request future |
//! | Connection | [`Error::Transport`], [`Error::ReconnectExhausted`] | `on_error` handler |
//! | Input | [`Error::MalformedFrame`] | logged and dropped |
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] | returned directly |
//! | External | [`Error::Json`], [`Error::WebSocket`] | returned directly |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// Request issued before the session finished authenticating.
    ///
    /// Nothing is transmitted when this is returned.
    #[error("Not initialised: session is not authenticated")]
    NotInitialized,

    /// No correlated response arrived before the request deadline.
    #[error("No response to request {request_id} after {timeout_ms}ms")]
    NoResponse {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Pending request abandoned because its session was torn down.
    #[error("Request cancelled: session was reinitialised or shut down")]
    Cancelled,

    /// The server answered with an error body.
    #[error("Server error in {class}: {error}")]
    Server {
        /// Response class that carried the error.
        class: String,
        /// The `error` field of the response, rendered as JSON.
        error: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The underlying socket reported an error.
    ///
    /// Terminal for the current connection until the next `initialize`.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The reconnect policy gave up.
    #[error("Reconnect gave up after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Inbound frame could not be decoded.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a request.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a no-response error.
    #[inline]
    pub fn no_response(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::NoResponse {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a server error.
    #[inline]
    pub fn server(class: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Server {
            class: class.into(),
            error: error.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a reconnect exhausted error.
    #[inline]
    pub fn reconnect_exhausted(attempts: u32) -> Self {
        Self::ReconnectExhausted { attempts }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a request timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    /// Returns `true` if this error is scoped to a single request.
    #[inline]
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::NoResponse { .. } | Self::Cancelled | Self::Server { .. }
        )
    }

    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ReconnectExhausted { .. } | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
