//! Keepalive timer.
//!
//! Once authenticated, the session sends a single-space text frame every
//! interval so idle-timeout intermediaries keep the socket open. The timer
//! does not watch the session; the session checks its own state on each
//! tick and stops the timer when it is no longer authenticated.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

// ============================================================================
// Constants
// ============================================================================

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Keepalive
// ============================================================================

/// A restartable fixed-rate timer.
pub(crate) struct Keepalive {
    period: Duration,
    interval: Option<Interval>,
}

impl Keepalive {
    /// Creates a stopped timer.
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// (Re)starts the timer; the first tick is one period from now.
    pub(crate) fn start(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Stops the timer.
    #[inline]
    pub(crate) fn stop(&mut self) {
        self.interval = None;
    }

    /// Returns `true` while the timer is running.
    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits for the next tick. Never resolves while stopped.
    ///
    /// Cancel-safe.
    pub(crate) async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => pending::<()>().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
