//! Outbound message types.
//!
//! Every request is a flat JSON object whose `@class` names the request
//! type in dotted-class form and whose `requestId` correlates the reply.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

use super::{AUTHENTICATED_CONNECT_REQUEST, CLASS_FIELD, REQUEST_ID_FIELD};

// ============================================================================
// RequestType
// ============================================================================

/// A request class name normalized to the wire's dotted convention.
///
/// `"LogEventRequest"` and `".LogEventRequest"` both become
/// `".LogEventRequest"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestType(String);

impl RequestType {
    /// Normalizes a request type name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.starts_with('.') {
            Self(name)
        } else {
            Self(format!(".{name}"))
        }
    }

    /// Returns the normalized class name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestType {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestType {
    #[inline]
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Request
// ============================================================================

/// A caller request from local end to the server.
///
/// # Format
///
/// ```json
/// {
///   "@class": ".LogEventRequest",
///   "requestId": "1700000000000_12",
///   "eventKey": "SCORE",
///   "score": 10
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Normalized request class.
    #[serde(rename = "@class")]
    pub class: RequestType,

    /// Correlation id.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// Caller payload fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Request {
    /// Creates a request from a caller payload.
    ///
    /// The payload must be a JSON object or `null`. Any `@class` or
    /// `requestId` keys it carries are replaced by the stamped values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the payload is not an object.
    pub fn new(class: RequestType, request_id: RequestId, payload: Value) -> Result<Self> {
        let mut payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "request payload for {class} must be a JSON object, got {other}"
                )));
            }
        };
        payload.remove(CLASS_FIELD);
        payload.remove(REQUEST_ID_FIELD);

        Ok(Self {
            class,
            request_id,
            payload,
        })
    }

    /// Serializes the request to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// AuthenticatedConnectRequest
// ============================================================================

/// The signed reply to a handshake nonce.
///
/// # Format
///
/// ```json
/// {
///   "@class": ".AuthenticatedConnectRequest",
///   "hmac": "base64-signature",
///   "authToken": "optional",
///   "sessionId": "optional",
///   "platform": "Rust",
///   "os": "Linux"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedConnectRequest {
    #[serde(rename = "@class")]
    class: &'static str,

    /// Signature over the server nonce.
    pub hmac: String,

    /// Previously issued auth token, if any.
    #[serde(rename = "authToken", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Previously issued session id, if any.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Client platform name.
    pub platform: String,

    /// Client operating system name.
    pub os: String,
}

impl AuthenticatedConnectRequest {
    /// Creates a handshake request.
    #[must_use]
    pub fn new(
        hmac: String,
        auth_token: Option<String>,
        session_id: Option<SessionId>,
        platform: String,
        os: String,
    ) -> Self {
        Self {
            class: AUTHENTICATED_CONNECT_REQUEST,
            hmac,
            auth_token,
            session_id,
            platform,
            os,
        }
    }

    /// Serializes the request to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
