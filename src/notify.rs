//! Commit notification bus for observation wake-up.
//!
//! The writer lane publishes the touched-table set of every committed
//! write; each observation holds a receiver and re-evaluates its read when
//! a commit intersects the tables it tracks. Notifications are
//! lightweight wake-ups only; the data itself is re-fetched through the
//! reader lane.

use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::ops::TableSet;

/// Notification that a write transaction committed.
#[derive(Clone, Debug)]
pub(crate) struct Commit {
    /// Tables the committed write declared it touched.
    pub tables: TableSet,
}

/// Broadcast bus carrying one [`Commit`] per committed write.
///
/// Backed by `tokio::sync::broadcast`: receivers that fall behind observe
/// a lag instead of blocking the writer, and treat the lag as "anything
/// might have changed".
#[derive(Clone)]
pub(crate) struct CommitBus {
    sender: Sender<Commit>,
}

impl CommitBus {
    /// Create a bus with the given buffered-notification capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new receiver. Only commits published after this call are
    /// delivered, so callers must subscribe before taking their initial
    /// snapshot.
    pub fn subscribe(&self) -> Receiver<Commit> {
        self.sender.subscribe()
    }

    /// Publish a commit. Called by the writer thread after each successful
    /// transaction. Returns the number of receivers notified.
    pub fn publish(&self, tables: TableSet) -> usize {
        // send() errors when there are no receivers, which is fine
        self.sender.send(Commit { tables }).unwrap_or(0)
    }
}
