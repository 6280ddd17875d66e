//! Request/response correlation.
//!
//! Tracks requests awaiting a reply, keyed by request id. Each entry owns
//! the completion channel of one [`PendingResponse`](super::PendingResponse)
//! and the abort handle of its timeout timer.
//!
//! The table lives inside the session task and is never shared, so
//! "remove the entry, then complete it" is atomic with respect to every
//! other event: a request is completed by its response, by its timeout, or
//! by a flush, and only by the first of these.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Response;

// ============================================================================
// Types
// ============================================================================

/// Sender half completing a caller's request.
pub(crate) type Completion = oneshot::Sender<Result<Response>>;

/// A request awaiting its reply.
struct Pending {
    completion: Completion,
    timer: AbortHandle,
}

// ============================================================================
// PendingRequests
// ============================================================================

/// Pending request table with per-request deadlines.
///
/// Expired ids are reported on the channel given to [`PendingRequests::new`];
/// the owner feeds them back through [`PendingRequests::expire`].
pub(crate) struct PendingRequests {
    entries: FxHashMap<RequestId, Pending>,
    expiry_tx: mpsc::UnboundedSender<RequestId>,
    timeout: Duration,
}

impl PendingRequests {
    /// Creates an empty table.
    pub(crate) fn new(timeout: Duration, expiry_tx: mpsc::UnboundedSender<RequestId>) -> Self {
        Self {
            entries: FxHashMap::default(),
            expiry_tx,
            timeout,
        }
    }

    /// Registers a request and starts its deadline.
    pub(crate) fn register(&mut self, request_id: RequestId, completion: Completion) {
        let expiry_tx = self.expiry_tx.clone();
        let expired_id = request_id.clone();
        let deadline = self.timeout;
        let timer = tokio::spawn(async move {
            sleep(deadline).await;
            let _ = expiry_tx.send(expired_id);
        })
        .abort_handle();

        let previous = self.entries.insert(
            request_id.clone(),
            Pending {
                completion,
                timer,
            },
        );

        if let Some(previous) = previous {
            debug!(%request_id, "Replaced pending request with duplicate id");
            previous.timer.abort();
            let _ = previous.completion.send(Err(Error::Cancelled));
        }

        trace!(%request_id, pending = self.entries.len(), "Request registered");
    }

    /// Completes a request with its response.
    ///
    /// Returns `false` if no request with that id is pending.
    pub(crate) fn resolve(&mut self, request_id: &RequestId, response: Response) -> bool {
        let Some(pending) = self.entries.remove(request_id) else {
            debug!(%request_id, "Response for unknown request");
            return false;
        };

        pending.timer.abort();
        let _ = pending.completion.send(Ok(response));
        trace!(%request_id, "Request resolved");
        true
    }

    /// Completes a request with [`Error::NoResponse`] if still pending.
    pub(crate) fn expire(&mut self, request_id: &RequestId) -> bool {
        let Some(pending) = self.entries.remove(request_id) else {
            return false;
        };

        debug!(%request_id, timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
        let _ = pending.completion.send(Err(Error::no_response(
            request_id.clone(),
            self.timeout.as_millis() as u64,
        )));
        true
    }

    /// Completes every pending request with [`Error::Cancelled`].
    ///
    /// Returns the number of requests flushed.
    pub(crate) fn flush(&mut self) -> usize {
        let count = self.entries.len();
        for (_, pending) in self.entries.drain() {
            pending.timer.abort();
            let _ = pending.completion.send(Err(Error::Cancelled));
        }

        if count > 0 {
            debug!(count, "Flushed pending requests");
        }
        count
    }

    /// Returns the number of pending requests.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if a request with that id is pending.
    #[cfg(test)]
    pub(crate) fn contains(&self, request_id: &RequestId) -> bool {
        self.entries.contains_key(request_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
