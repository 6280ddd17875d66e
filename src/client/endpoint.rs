//! Socket endpoint URLs.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the preview (development) stage.
pub const PREVIEW_BASE_URL: &str = "wss://preview.gamesparks.net/ws/";

/// Base URL of the live stage.
pub const LIVE_BASE_URL: &str = "wss://service.gamesparks.net/ws/";

// ============================================================================
// Endpoint
// ============================================================================

/// A validated `ws://` or `wss://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    /// Parses and validates a socket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is invalid or not a WebSocket URL.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::config(format!("invalid endpoint {url}: {e}")))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(Self(url.to_string())),
            other => Err(Error::config(format!(
                "endpoint {url} must use ws:// or wss://, got {other}://"
            ))),
        }
    }

    /// Endpoint for an application key on the preview stage.
    #[must_use]
    pub fn preview(api_key: &str) -> Self {
        Self(format!("{PREVIEW_BASE_URL}{}", urlencoding::encode(api_key)))
    }

    /// Endpoint for an application key on the live stage.
    #[must_use]
    pub fn live(api_key: &str) -> Self {
        Self(format!("{LIVE_BASE_URL}{}", urlencoding::encode(api_key)))
    }

    /// Returns the URL.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
