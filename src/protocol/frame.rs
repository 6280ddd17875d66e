//! Inbound frame decoding and classification.
//!
//! Every inbound text frame is a JSON object discriminated by `@class`:
//!
//! | `@class` | Variant |
//! |----------|---------|
//! | `.AuthenticatedConnectResponse` | [`InboundFrame::Handshake`] |
//! | `*Response` | [`InboundFrame::Response`] |
//! | anything else | [`InboundFrame::Message`] |
//!
//! Any frame may carry an `authToken`; it is removed before classification
//! and returned separately so it never reaches caller code.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

use super::{AUTH_TOKEN_FIELD, AUTHENTICATED_CONNECT_RESPONSE, CLASS_FIELD, REQUEST_ID_FIELD, RESPONSE_SUFFIX};

// ============================================================================
// DecodedFrame
// ============================================================================

/// A classified inbound frame plus the auth token stripped from it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Auth token carried by the frame, if any.
    pub auth_token: Option<String>,

    /// The classified frame.
    pub frame: InboundFrame,
}

// ============================================================================
// InboundFrame
// ============================================================================

/// Inbound frame classified by its `@class` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Authentication handshake step.
    Handshake(HandshakeFrame),

    /// Reply to a caller request.
    Response {
        /// Echoed request id, removed from the body.
        request_id: Option<RequestId>,
        /// Response body.
        response: Response,
    },

    /// Server-initiated message.
    Message(Message),
}

// ============================================================================
// HandshakeFrame
// ============================================================================

/// Fields of an `.AuthenticatedConnectResponse`.
///
/// At most one of the fields is acted upon, in the order
/// `connect_url`, `nonce`, `session_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeFrame {
    /// Redirect to another socket endpoint.
    #[serde(rename = "connectUrl", default)]
    pub connect_url: Option<String>,

    /// Challenge to sign.
    #[serde(default)]
    pub nonce: Option<String>,

    /// Session issued on successful authentication.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

// ============================================================================
// Response
// ============================================================================

/// A response body delivered to the request that caused it.
///
/// The body keeps every field the server sent except `requestId` and
/// `authToken`. Server-side failures are reported in an `error` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    class: String,
    body: Map<String, Value>,
}

impl Response {
    /// Creates a response from a class name and body.
    #[must_use]
    pub fn new(class: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            class: class.into(),
            body,
        }
    }

    /// Returns the response class, e.g. `.LogEventResponse`.
    #[inline]
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns a field of the body.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Gets a string field from the body.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Returns the server `error` field, if any.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&Value> {
        self.body.get("error")
    }

    /// Returns `true` if the server reported an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Returns the full body.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Extracts the body, returning error if the server reported one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] if the body carries an `error` field.
    pub fn into_result(self) -> Result<Map<String, Value>> {
        match self.body.get("error") {
            Some(error) => Err(Error::server(self.class, error.to_string())),
            None => Ok(self.body),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A server-initiated message such as a challenge or achievement push.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    class: String,
    body: Map<String, Value>,
}

impl Message {
    /// Returns the message class, e.g. `.ChallengeStartedMessage`.
    #[inline]
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns a field of the message.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Returns the full message, including `@class`.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consumes the message, returning the full JSON object.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes and classifies an inbound text frame.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] if the text is not a JSON object, has
/// no string `@class`, or a handshake field has the wrong type.
pub fn decode(text: &str) -> Result<DecodedFrame> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))?;

    let Value::Object(mut body) = value else {
        return Err(Error::malformed_frame("frame is not a JSON object"));
    };

    let auth_token = match body.remove(AUTH_TOKEN_FIELD) {
        Some(Value::String(token)) if !token.is_empty() => Some(token),
        _ => None,
    };

    let class = match body.get(CLASS_FIELD) {
        Some(Value::String(class)) => class.clone(),
        _ => return Err(Error::malformed_frame("missing @class discriminator")),
    };

    let frame = if class == AUTHENTICATED_CONNECT_RESPONSE {
        let handshake = serde_json::from_value(Value::Object(body))
            .map_err(|e| Error::malformed_frame(format!("handshake frame: {e}")))?;
        InboundFrame::Handshake(handshake)
    } else if class.ends_with(RESPONSE_SUFFIX) {
        let request_id = match body.remove(REQUEST_ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(RequestId::from(id)),
            _ => None,
        };
        InboundFrame::Response {
            request_id,
            response: Response::new(class, body),
        }
    } else {
        InboundFrame::Message(Message { class, body })
    };

    Ok(DecodedFrame { auth_token, frame })
}

// ============================================================================
// Tests
// ============================================================================
