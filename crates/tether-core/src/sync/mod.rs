//! Pending synchronization work.

mod queue;
mod shared;

pub use queue::{SyncQueue, SyncQueueRecord};
pub use shared::SharedSyncQueue;
