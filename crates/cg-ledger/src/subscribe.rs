// subscribe.rs — Push committed entries to in-process observers.
//
// Each subscriber gets its own bounded channel. Entries are published after
// the sink accepted them, in sequence order. Publishing never blocks: a
// subscriber whose receiver was dropped, or whose buffer is full, is pruned
// on the next publish.

use std::sync::mpsc::{self, TrySendError};

use serde::{Deserialize, Serialize};

use crate::entry::LedgerEntry;

/// Entries a subscriber may leave undrained before it is dropped.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// Handle used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Receiving side of a subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::Receiver<LedgerEntry>,
}

impl Subscription {
    /// Entries delivered so far, without blocking.
    pub fn drain(&self) -> Vec<LedgerEntry> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    senders: Vec<(SubscriptionId, mpsc::SyncSender<LedgerEntry>)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, capacity: usize) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (tx, receiver) = mpsc::sync_channel(capacity.max(1));
        self.senders.push((id, tx));
        Subscription { id, receiver }
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(sid, _)| *sid != id);
        self.senders.len() != before
    }

    pub(crate) fn publish(&mut self, entries: &[LedgerEntry]) {
        self.senders.retain(|(id, tx)| {
            for entry in entries {
                match tx.try_send(entry.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(subscription = id.0, "dropping lagging ledger subscriber");
                        return false;
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        tracing::warn!(subscription = id.0, "dropping disconnected ledger subscriber");
                        return false;
                    }
                }
            }
            true
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
