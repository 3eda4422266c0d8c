//! Pending request tracking.
//!
//! Every outbound request registers a pending entry keyed by its
//! correlation id and stamped with the connection epoch that sent it.
//! An entry is consumed exactly once: by a matching response, by the
//! caller's timeout, or by connection teardown. Completion requires an
//! epoch match so a response from a different connection epoch can
//! never resolve a stale continuation.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, MessageId};

// ============================================================================
// Pending
// ============================================================================

/// One in-flight request awaiting its response.
struct Pending {
    /// Epoch of the connection the request was sent on.
    epoch: Epoch,
    /// Completion channel back to the caller.
    tx: oneshot::Sender<Result<Value>>,
}

// ============================================================================
// PendingRequests
// ============================================================================

/// Map of correlation ids to in-flight requests.
///
/// Owned by the client and shared with each connection's event loop.
/// Callers hold the surrounding lock only for map operations, never
/// across an await.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: FxHashMap<MessageId, Pending>,
}

impl PendingRequests {
    /// Creates an empty map.
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending request for the given epoch.
    pub(crate) fn insert(
        &mut self,
        id: MessageId,
        epoch: Epoch,
        tx: oneshot::Sender<Result<Value>>,
    ) {
        self.entries.insert(id, Pending { epoch, tx });
    }

    /// Removes an entry without completing it.
    ///
    /// Used by the timeout path. Safe to call when the entry was
    /// already consumed by a response.
    pub(crate) fn remove(&mut self, id: &MessageId) {
        self.entries.remove(id);
    }

    /// Completes the entry matching `id`, if its epoch matches.
    ///
    /// Returns `true` when an entry was consumed. A matching id with a
    /// stale epoch is refused and left for its own timeout, and the
    /// caller treats the message as uncorrelated.
    pub(crate) fn complete(&mut self, id: &MessageId, epoch: Epoch, outcome: Result<Value>) -> bool {
        match self.entries.get(id) {
            Some(pending) if pending.epoch == epoch => {}
            Some(pending) => {
                tracing::warn!(
                    %id,
                    entry_epoch = %pending.epoch,
                    response_epoch = %epoch,
                    "Refusing response from a different connection epoch"
                );
                return false;
            }
            None => return false,
        }

        let Some(pending) = self.entries.remove(id) else {
            return false;
        };
        let _ = pending.tx.send(outcome);
        true
    }

    /// Fails every entry belonging to `epoch` with [`Error::ConnectionClosed`].
    ///
    /// Called when a connection's event loop terminates. Entries from
    /// other epochs are left untouched.
    pub(crate) fn fail_epoch(&mut self, epoch: Epoch) -> usize {
        let stale: Vec<MessageId> = self
            .entries
            .iter()
            .filter(|(_, p)| p.epoch == epoch)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(pending) = self.entries.remove(id) {
                let _ = pending.tx.send(Err(Error::ConnectionClosed));
            }
        }

        stale.len()
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no requests are in flight.
    #[inline]
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn id(s: &str) -> MessageId {
        MessageId::from_wire(s)
    }

    #[tokio::test]
    async fn test_complete_consumes_entry_once() {
        let mut map = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        map.insert(id("a"), Epoch::new(1), tx);

        assert!(map.complete(&id("a"), Epoch::new(1), Ok(json!(1))));
        assert!(map.is_empty());

        // Second completion finds nothing.
        assert!(!map.complete(&id("a"), Epoch::new(1), Ok(json!(2))));

        let outcome = rx.await.expect("receive").expect("success");
        assert_eq!(outcome, json!(1));
    }

    #[tokio::test]
    async fn test_complete_refuses_stale_epoch() {
        let mut map = PendingRequests::new();
        let (tx, mut rx) = oneshot::channel();
        map.insert(id("a"), Epoch::new(1), tx);

        assert!(!map.complete(&id("a"), Epoch::new(2), Ok(json!(1))));
        assert_eq!(map.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fail_epoch_only_hits_own_entries() {
        let mut map = PendingRequests::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        map.insert(id("old"), Epoch::new(1), tx1);
        map.insert(id("new"), Epoch::new(2), tx2);

        assert_eq!(map.fail_epoch(Epoch::new(1)), 1);
        assert_eq!(map.len(), 1);

        let outcome = rx1.await.expect("receive");
        assert!(matches!(outcome, Err(Error::ConnectionClosed)));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut map = PendingRequests::new();
        let (tx, _rx) = oneshot::channel();
        map.insert(id("a"), Epoch::new(1), tx);

        map.remove(&id("a"));
        map.remove(&id("a"));
        assert!(map.is_empty());
    }
}
