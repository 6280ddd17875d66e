//! Reconnect policy.
//!
//! A socket close moves the session from its current state back to
//! `Connecting` only when [`should_reconnect`] allows it; the delay before
//! the attempt, and whether to attempt at all, comes from
//! [`ReconnectPolicy::next_delay`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use super::session::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// First backoff delay.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound on backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Backoff attempts before giving up.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Backoff growth factor.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// How the session reopens a closed socket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconnectPolicy {
    /// Reconnect at once, forever.
    Immediate,

    /// Exponential backoff with an attempt cap.
    Backoff {
        /// Delay before the first attempt.
        initial: Duration,
        /// Delay ceiling.
        max: Duration,
        /// Growth factor per attempt.
        multiplier: f64,
        /// Attempts before giving up.
        max_attempts: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Immediate
    }
}

impl ReconnectPolicy {
    /// Backoff starting at 1s, doubling up to 30s, 10 attempts.
    #[inline]
    #[must_use]
    pub const fn backoff() -> Self {
        Self::Backoff {
            initial: INITIAL_RETRY_DELAY,
            max: MAX_RETRY_DELAY,
            multiplier: BACKOFF_MULTIPLIER,
            max_attempts: MAX_RETRY_ATTEMPTS,
        }
    }

    /// Returns the delay before reconnect attempt `attempt` (1-based), or
    /// `None` when the policy gives up.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Immediate => Some(Duration::ZERO),
            Self::Backoff {
                initial,
                max,
                multiplier,
                max_attempts,
            } => {
                if attempt == 0 || attempt > max_attempts {
                    return None;
                }
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let factor = multiplier.max(1.0).powi(exponent);
                let millis = (initial.as_millis() as f64 * factor).min(max.as_millis() as f64);
                Some(Duration::from_millis(millis as u64))
            }
        }
    }
}

// ============================================================================
// Transition Guard
// ============================================================================

/// Returns `true` if a socket close in `state` should trigger a reconnect.
///
/// Errored connections and sessions being torn down stay closed.
#[inline]
#[must_use]
pub fn should_reconnect(state: ConnectionState) -> bool {
    !matches!(
        state,
        ConnectionState::Errored | ConnectionState::Closing | ConnectionState::Idle
    )
}

// ============================================================================
// Tests
// ============================================================================
