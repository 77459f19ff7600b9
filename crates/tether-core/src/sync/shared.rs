//! Persisted, lock-protected sync queue shared by the engine and scheduler.

use chrono::Duration;
use tokio::sync::Mutex;

use super::queue::{SyncQueue, SyncQueueRecord};
use crate::error::{Error, Result};
use crate::models::{SyncOperation, SyncOperationId, SyncPriority};
use crate::store::{load_record, save_record, DurableStore};

/// A [`SyncQueue`] written through to the durable store after every change.
///
/// A failed write leaves the change applied in memory; the next successful
/// write persists the whole queue.
pub struct SharedSyncQueue<S> {
    store: S,
    queue: Mutex<SyncQueue>,
}

impl<S: DurableStore> SharedSyncQueue<S> {
    pub fn new(store: S, escalation_window: Duration) -> Self {
        Self {
            store,
            queue: Mutex::new(SyncQueue::new(escalation_window)),
        }
    }

    /// Replace the in-memory queue with the persisted one. Returns its length.
    pub async fn restore(&self) -> Result<usize> {
        let mut queue = self.queue.lock().await;
        let escalation_window = queue.escalation_window();
        let record = match load_record::<SyncQueueRecord, _>(&self.store).await {
            Ok(record) => record.unwrap_or_default(),
            Err(Error::Serialization(error)) => {
                tracing::warn!("Discarding unreadable sync queue record: {}", error);
                SyncQueueRecord::default()
            }
            Err(error) => return Err(error),
        };
        *queue = SyncQueue::from_record(record, escalation_window);
        tracing::debug!(len = queue.len(), "Restored sync queue");
        Ok(queue.len())
    }

    pub async fn enqueue(&self, operation: SyncOperation) -> Result<bool> {
        let mut queue = self.queue.lock().await;
        let id = operation.id;
        if !queue.enqueue(operation) {
            return Ok(false);
        }
        tracing::debug!(id = %id, "Queued sync operation");
        self.persist(&queue).await?;
        Ok(true)
    }

    /// Drop an operation whose delivery was confirmed.
    pub async fn confirm_delivered(&self, id: SyncOperationId) -> Result<Option<SyncOperation>> {
        let mut queue = self.queue.lock().await;
        let Some(removed) = queue.remove(id) else {
            return Ok(None);
        };
        self.persist(&queue).await?;
        Ok(Some(removed))
    }

    pub async fn reset_priority(&self, id: SyncOperationId, priority: SyncPriority) -> Result<bool> {
        let mut queue = self.queue.lock().await;
        if !queue.reset_priority(id, priority) {
            return Ok(false);
        }
        tracing::info!(id = %id, priority = %priority, "Reset sync operation priority");
        self.persist(&queue).await?;
        Ok(true)
    }

    /// Apply time-pressure escalation and persist when anything changed.
    pub async fn escalate(&self, remaining: Duration) -> Result<usize> {
        let mut queue = self.queue.lock().await;
        let changed = queue.escalate(remaining);
        if changed > 0 {
            self.persist(&queue).await?;
        }
        Ok(changed)
    }

    pub async fn peek_next(&self) -> Option<SyncOperation> {
        self.queue.lock().await.peek_next().cloned()
    }

    /// Queued operations in delivery order.
    pub async fn operations(&self) -> Vec<SyncOperation> {
        self.queue.lock().await.iter().cloned().collect()
    }

    async fn persist(&self, queue: &SyncQueue) -> Result<()> {
        save_record(&self.store, &queue.to_record())
            .await
            .map_err(|error| {
                tracing::warn!("Sync queue write failed; change kept in memory: {}", error);
                error
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncKind;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn changes_survive_restore() {
        let store = MemoryStore::new();
        let queue = SharedSyncQueue::new(store.clone(), Duration::hours(24));
        let upload = SyncOperation::new(SyncKind::Upload, "attachment-9", at(1));
        let delete = SyncOperation::new(SyncKind::Delete, "note-3", at(2))
            .with_priority(SyncPriority::High);
        let upload_id = upload.id;

        assert!(queue.enqueue(upload).await.unwrap());
        assert!(queue.enqueue(delete.clone()).await.unwrap());
        assert!(queue.escalate(Duration::hours(2)).await.unwrap() > 0);

        let restored = SharedSyncQueue::new(store, Duration::hours(24));
        assert_eq!(restored.restore().await.unwrap(), 2);
        let operations = restored.operations().await;
        assert_eq!(operations[0].id, delete.id);
        assert_eq!(operations[0].priority, SyncPriority::Critical);
        assert_eq!(operations[1].id, upload_id);
        assert_eq!(operations[1].priority, SyncPriority::High);
    }

    #[tokio::test]
    async fn escalation_outside_window_does_not_write() {
        let store = MemoryStore::new();
        let queue = SharedSyncQueue::new(store.clone(), Duration::hours(24));
        queue
            .enqueue(SyncOperation::new(SyncKind::Create, "note-1", at(1)))
            .await
            .unwrap();
        let writes = store.write_count();

        assert_eq!(queue.escalate(Duration::hours(100)).await.unwrap(), 0);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn failed_write_keeps_change_in_memory() {
        let store = MemoryStore::new();
        let queue = SharedSyncQueue::new(store.clone(), Duration::hours(24));
        let operation = SyncOperation::new(SyncKind::Update, "note-1", at(1));
        let id = operation.id;

        store.set_available(false);
        assert!(queue.enqueue(operation).await.is_err());
        assert_eq!(queue.peek_next().await.map(|op| op.id), Some(id));

        store.set_available(true);
        assert_eq!(
            queue.confirm_delivered(id).await.unwrap().map(|op| op.id),
            Some(id)
        );
        assert_eq!(queue.confirm_delivered(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_record_restores_empty_queue() {
        let store = MemoryStore::new();
        store.set_string("sync_queue", "{broken").await.unwrap();

        let queue = SharedSyncQueue::new(store, Duration::hours(24));
        assert_eq!(queue.restore().await.unwrap(), 0);
    }
}
