use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::error::{IngestError, Result};
use crate::models::SourceIdentifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Source(SourceIdentifier),
    /// Pool-wide shutdown token; whoever takes it puts it back
    Shutdown,
}

/// Unbounded multi-producer, multi-consumer queue shared by the pool.
///
/// Every handle owns both ends of the channel, so it never disconnects while
/// a handle is alive and `pop` only returns once an item is available.
#[derive(Clone)]
pub struct WorkQueue {
    sender: Sender<WorkItem>,
    receiver: Receiver<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, item: WorkItem) -> Result<()> {
        self.sender.send(item).map_err(|_| IngestError::QueueClosed)
    }

    pub fn push_source(&self, identifier: SourceIdentifier) -> Result<()> {
        self.push(WorkItem::Source(identifier))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.push(WorkItem::Shutdown)
    }

    /// Block until an item is available.
    pub fn pop(&self) -> Result<WorkItem> {
        self.receiver.recv().map_err(|_| IngestError::QueueClosed)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take whatever is left without blocking.
    pub fn drain(&self) -> Vec<WorkItem> {
        self.receiver.try_iter().collect()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
