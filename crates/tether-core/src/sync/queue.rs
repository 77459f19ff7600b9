//! Priority-ordered queue of sync operations.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{SyncOperation, SyncOperationId, SyncPriority};
use crate::store::Record;

/// Persisted form of a [`SyncQueue`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueRecord {
    pub operations: Vec<SyncOperation>,
}

impl Record for SyncQueueRecord {
    const KEY: &'static str = "sync_queue";
}

/// Operations ordered by priority (highest first), then age (oldest first).
///
/// Escalation only ever raises priorities; [`SyncQueue::reset_priority`] is the
/// one explicit way to lower them.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    operations: Vec<SyncOperation>,
    escalation_window: Duration,
}

impl SyncQueue {
    pub fn new(escalation_window: Duration) -> Self {
        Self {
            operations: Vec::new(),
            escalation_window,
        }
    }

    /// Rebuild a queue from its persisted form.
    pub fn from_record(record: SyncQueueRecord, escalation_window: Duration) -> Self {
        let mut queue = Self::new(escalation_window);
        for operation in record.operations {
            queue.enqueue(operation);
        }
        queue
    }

    pub const fn escalation_window(&self) -> Duration {
        self.escalation_window
    }

    pub fn to_record(&self) -> SyncQueueRecord {
        SyncQueueRecord {
            operations: self.operations.clone(),
        }
    }

    /// Insert `operation`. Returns `false` if its id is already queued.
    pub fn enqueue(&mut self, operation: SyncOperation) -> bool {
        if self.get(operation.id).is_some() {
            tracing::debug!(id = %operation.id, "Ignoring duplicate sync operation");
            return false;
        }
        self.operations.push(operation);
        self.sort();
        true
    }

    /// Next operation to deliver.
    pub fn peek_next(&self) -> Option<&SyncOperation> {
        self.operations.first()
    }

    /// Remove by id; `None` if it was not queued.
    pub fn remove(&mut self, id: SyncOperationId) -> Option<SyncOperation> {
        let index = self.operations.iter().position(|op| op.id == id)?;
        Some(self.operations.remove(index))
    }

    pub fn get(&self, id: SyncOperationId) -> Option<&SyncOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Raise every operation one step when less than the escalation window is
    /// left. Returns how many priorities changed.
    pub fn escalate(&mut self, remaining: Duration) -> usize {
        if remaining >= self.escalation_window {
            return 0;
        }

        let mut changed = 0;
        for operation in &mut self.operations {
            let escalated = operation.priority.escalated();
            if escalated != operation.priority {
                operation.priority = escalated;
                changed += 1;
            }
        }
        if changed > 0 {
            self.sort();
            tracing::debug!(
                changed,
                remaining_secs = remaining.num_seconds(),
                "Escalated sync queue priorities"
            );
        }
        changed
    }

    /// Manually set the priority of one operation. Returns `false` if absent.
    pub fn reset_priority(&mut self, id: SyncOperationId, priority: SyncPriority) -> bool {
        let Some(operation) = self.operations.iter_mut().find(|op| op.id == id) else {
            return false;
        };
        operation.priority = priority;
        self.sort();
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncOperation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn sort(&mut self) {
        self.operations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncKind;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, minute, 0).unwrap()
    }

    fn op(target: &str, minute: u32, priority: SyncPriority) -> SyncOperation {
        SyncOperation::new(SyncKind::Update, target, at(minute)).with_priority(priority)
    }

    fn queue() -> SyncQueue {
        SyncQueue::new(Duration::hours(24))
    }

    fn targets(queue: &SyncQueue) -> Vec<&str> {
        queue
            .iter()
            .map(|op| op.target_entity_id.as_str())
            .collect()
    }

    #[test]
    fn orders_by_priority_then_age() {
        let mut queue = queue();
        queue.enqueue(op("low", 1, SyncPriority::Low));
        queue.enqueue(op("critical", 2, SyncPriority::Critical));
        queue.enqueue(op("medium", 3, SyncPriority::Medium));

        assert_eq!(targets(&queue), vec!["critical", "medium", "low"]);
        assert_eq!(
            queue.peek_next().map(|op| op.target_entity_id.as_str()),
            Some("critical")
        );
    }

    #[test]
    fn equal_priorities_keep_oldest_first() {
        let mut queue = queue();
        queue.enqueue(op("newer", 9, SyncPriority::Medium));
        queue.enqueue(op("older", 1, SyncPriority::Medium));
        assert_eq!(targets(&queue), vec!["older", "newer"]);
    }

    #[test]
    fn empty_queue_has_nothing_next() {
        let queue = queue();
        assert!(queue.peek_next().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut queue = queue();
        let operation = op("note-1", 1, SyncPriority::Low);
        assert!(queue.enqueue(operation.clone()));
        assert!(!queue.enqueue(operation.with_priority(SyncPriority::Critical)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_next().unwrap().priority, SyncPriority::Low);
    }

    #[test]
    fn remove_is_a_no_op_for_unknown_ids() {
        let mut queue = queue();
        let operation = op("note-1", 1, SyncPriority::Low);
        let id = operation.id;
        queue.enqueue(operation);

        assert!(queue.remove(SyncOperationId::new()).is_none());
        assert_eq!(queue.remove(id).map(|op| op.id), Some(id));
        assert!(queue.remove(id).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn escalation_only_inside_window() {
        let mut queue = queue();
        queue.enqueue(op("a", 1, SyncPriority::Low));
        queue.enqueue(op("b", 2, SyncPriority::High));

        assert_eq!(queue.escalate(Duration::hours(24)), 0);
        assert_eq!(queue.escalate(Duration::hours(23)), 2);

        let priorities: Vec<_> = queue.iter().map(|op| op.priority).collect();
        assert_eq!(priorities, vec![SyncPriority::Critical, SyncPriority::Medium]);
    }

    #[test]
    fn escalation_saturates_at_critical() {
        let mut queue = queue();
        queue.enqueue(op("a", 1, SyncPriority::Low));

        for _ in 0..5 {
            queue.escalate(Duration::zero());
        }
        assert_eq!(queue.peek_next().unwrap().priority, SyncPriority::Critical);
        assert_eq!(queue.escalate(Duration::zero()), 0);
    }

    #[test]
    fn reset_priority_can_lower_and_resorts() {
        let mut queue = queue();
        let first = op("first", 1, SyncPriority::Critical);
        let first_id = first.id;
        queue.enqueue(first);
        queue.enqueue(op("second", 2, SyncPriority::Medium));

        assert!(queue.reset_priority(first_id, SyncPriority::Low));
        assert_eq!(targets(&queue), vec!["second", "first"]);
        assert!(!queue.reset_priority(SyncOperationId::new(), SyncPriority::High));
    }

    #[test]
    fn record_restores_the_same_order() {
        let mut queue = queue();
        queue.enqueue(op("low", 1, SyncPriority::Low));
        queue.enqueue(op("high", 2, SyncPriority::High));

        let json = serde_json::to_string(&queue.to_record()).unwrap();
        let record: SyncQueueRecord = serde_json::from_str(&json).unwrap();
        let restored = SyncQueue::from_record(record, Duration::hours(24));
        assert_eq!(targets(&restored), vec!["high", "low"]);
    }
}
