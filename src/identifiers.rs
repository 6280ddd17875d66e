//! Type-safe identifiers.
//!
//! Newtype wrappers keep request ids and session ids from being mixed up
//! with each other or with arbitrary strings.
//!
//! | Type | Issued by | Format |
//! |------|-----------|--------|
//! | [`RequestId`] | client ([`RequestIdGenerator`]) | `{unix_millis}_{counter}` |
//! | [`SessionId`] | server (handshake) | opaque |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================================================
// RequestId
// ============================================================================

/// Correlation id stamped on outbound requests and echoed by responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Server-issued session identifier, stable once authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ============================================================================
// RequestIdGenerator
// ============================================================================

/// Issues request ids from a wall-clock timestamp and a counter.
///
/// The counter is monotonic and never reset, so ids stay unique across
/// reconnects and re-initialisation even if the clock stalls or steps back.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator starting at counter 1.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> RequestId {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        RequestId(format!("{millis}_{sequence}"))
    }

    /// Returns how many ids have been issued.
    #[inline]
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Tests
// ============================================================================
