//! Pending-change queue
//!
//! Records unsynced local intent separately from the store so a push can be
//! retried independently of further edits. Changes leave the queue on success,
//! after `max_retries` failed attempts, or on the first failure the remote
//! will repeat forever; dropped changes move to a bounded log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChangeAction, EntityKind, PendingChange};
use crate::util::{compact_text, now_ms};

/// A change removed after exhausting its retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedChange {
    pub change: PendingChange,
    /// Last failure seen
    pub error: String,
    /// Unix ms
    pub dropped_at: i64,
}

/// What happened to a change after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still queued, with this many failed attempts
    Retrying(u32),
    /// Removed from the queue
    Dropped,
}

/// FIFO queue of pending changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQueue {
    #[serde(default)]
    changes: VecDeque<PendingChange>,
    #[serde(default)]
    next_seq: u64,
    #[serde(default)]
    dropped: VecDeque<DroppedChange>,
    #[serde(skip, default = "default_max_retries")]
    max_retries: u32,
    #[serde(skip, default = "default_dropped_capacity")]
    dropped_capacity: usize,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_dropped_capacity() -> usize {
    50
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(default_max_retries(), default_dropped_capacity())
    }
}

impl PendingQueue {
    #[must_use]
    pub const fn new(max_retries: u32, dropped_capacity: usize) -> Self {
        Self {
            changes: VecDeque::new(),
            next_seq: 1,
            dropped: VecDeque::new(),
            max_retries,
            dropped_capacity,
        }
    }

    /// Apply limits to a queue restored from disk.
    pub fn set_limits(&mut self, max_retries: u32, dropped_capacity: usize) {
        self.max_retries = max_retries.max(1);
        self.dropped_capacity = dropped_capacity;
        while self.dropped.len() > self.dropped_capacity {
            self.dropped.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }

    /// Append a change with a zero retry count. Returns its sequence number.
    pub fn enqueue(
        &mut self,
        kind: EntityKind,
        action: ChangeAction,
        id: impl Into<String>,
        data: Option<Value>,
    ) -> u64 {
        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;
        let change = PendingChange {
            seq,
            kind,
            action,
            id: id.into(),
            data,
            timestamp: now_ms(),
            retry_count: 0,
        };
        tracing::debug!("Queued {}", change.describe());
        self.changes.push_back(change);
        seq
    }

    /// Copy of the queue in FIFO order, for a flush pass.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.changes.iter().cloned().collect()
    }

    /// Current state of a queued change; ids may have been rewritten since
    /// the flush pass took its snapshot.
    #[must_use]
    pub fn get(&self, seq: u64) -> Option<&PendingChange> {
        self.changes.iter().find(|change| change.seq == seq)
    }

    /// Remove a change the remote service accepted.
    pub fn complete(&mut self, seq: u64) -> Option<PendingChange> {
        let position = self.changes.iter().position(|change| change.seq == seq)?;
        self.changes.remove(position)
    }

    /// Count a failed attempt, dropping the change once the budget is spent.
    ///
    /// Returns `None` when the change is no longer queued.
    pub fn fail(&mut self, seq: u64, error: &str) -> Option<FailureOutcome> {
        let position = self.changes.iter().position(|change| change.seq == seq)?;
        let change = &mut self.changes[position];
        change.retry_count = change.retry_count.saturating_add(1);

        if change.retry_count < self.max_retries {
            tracing::warn!(
                "Push of {} failed (attempt {}/{}): {}",
                change.describe(),
                change.retry_count,
                self.max_retries,
                error
            );
            return Some(FailureOutcome::Retrying(change.retry_count));
        }

        let change = self.changes.remove(position)?;
        tracing::warn!(
            "Dropping {} after {} failed attempts: {}",
            change.describe(),
            change.retry_count,
            error
        );
        self.log_dropped(change, error);
        Some(FailureOutcome::Dropped)
    }

    /// Drop a change whose failure will repeat on every attempt, without
    /// spending the rest of its retry budget.
    pub fn reject(&mut self, seq: u64, error: &str) -> Option<FailureOutcome> {
        let position = self.changes.iter().position(|change| change.seq == seq)?;
        let mut change = self.changes.remove(position)?;
        change.retry_count = change.retry_count.saturating_add(1);
        tracing::warn!("Dropping {}, rejected by remote: {}", change.describe(), error);
        self.log_dropped(change, error);
        Some(FailureOutcome::Dropped)
    }

    /// Record a change that could not be queued at all.
    pub fn log_unsendable(
        &mut self,
        kind: EntityKind,
        action: ChangeAction,
        id: impl Into<String>,
        error: &str,
    ) {
        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;
        let change = PendingChange {
            seq,
            kind,
            action,
            id: id.into(),
            data: None,
            timestamp: now_ms(),
            retry_count: 0,
        };
        tracing::error!("Cannot queue {}: {}", change.describe(), error);
        self.log_dropped(change, error);
    }

    fn log_dropped(&mut self, change: PendingChange, error: &str) {
        if self.dropped_capacity == 0 {
            return;
        }
        if self.dropped.len() >= self.dropped_capacity {
            self.dropped.pop_front();
        }
        self.dropped.push_back(DroppedChange {
            change,
            error: compact_text(error),
            dropped_at: now_ms(),
        });
    }

    /// Whether any queued change still targets this entity.
    #[must_use]
    pub fn has_pending_for(&self, kind: EntityKind, id: &str) -> bool {
        self.changes
            .iter()
            .any(|change| change.kind == kind && change.id == id)
    }

    /// Follow a server-assigned id through every queued change, including
    /// task payloads that reference a renamed project or tag.
    pub fn reassign_id(&mut self, kind: EntityKind, old: &str, new: &str) {
        for change in &mut self.changes {
            if change.kind == kind && change.id == old {
                change.id = new.to_string();
            }
            let Some(Value::Object(data)) = change.data.as_mut() else {
                continue;
            };
            if change.kind == kind && data.get("id").and_then(Value::as_str) == Some(old) {
                data.insert("id".to_string(), Value::String(new.to_string()));
            }
            if change.kind != EntityKind::Task {
                continue;
            }
            match kind {
                EntityKind::Project => {
                    if data.get("projectId").and_then(Value::as_str) == Some(old) {
                        data.insert("projectId".to_string(), Value::String(new.to_string()));
                    }
                }
                EntityKind::Tag => {
                    if let Some(Value::Array(tags)) = data.get_mut("tags") {
                        for tag in tags.iter_mut() {
                            if tag.as_str() == Some(old) {
                                *tag = Value::String(new.to_string());
                            }
                        }
                    }
                }
                EntityKind::Task => {}
            }
        }
    }

    /// Most recent dropped changes, oldest first.
    pub fn dropped(&self) -> impl Iterator<Item = &DroppedChange> {
        self.dropped.iter()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.dropped.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn enqueue_appends_in_order_with_zero_retries() {
        let mut queue = PendingQueue::default();
        let first = queue.enqueue(EntityKind::Task, ChangeAction::Create, "t1", None);
        let second = queue.enqueue(EntityKind::Task, ChangeAction::Update, "t1", None);

        let changes = queue.snapshot();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].seq, first);
        assert_eq!(changes[1].seq, second);
        assert!(changes.iter().all(|change| change.retry_count == 0));
        assert!(first < second);
    }

    #[test]
    fn third_failure_drops_the_change() {
        let mut queue = PendingQueue::default();
        let seq = queue.enqueue(EntityKind::Project, ChangeAction::Delete, "p1", None);

        assert_eq!(queue.fail(seq, "offline"), Some(FailureOutcome::Retrying(1)));
        assert_eq!(queue.fail(seq, "offline"), Some(FailureOutcome::Retrying(2)));
        assert_eq!(queue.fail(seq, "still offline"), Some(FailureOutcome::Dropped));
        assert!(queue.is_empty());
        assert_eq!(queue.fail(seq, "offline"), None);

        let dropped: Vec<_> = queue.dropped().collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].change.retry_count, 3);
        assert_eq!(dropped[0].error, "still offline");
    }

    #[test]
    fn rejected_change_is_dropped_on_first_failure() {
        let mut queue = PendingQueue::default();
        let seq = queue.enqueue(EntityKind::Task, ChangeAction::Update, "t1", None);
        queue.enqueue(EntityKind::Task, ChangeAction::Delete, "t2", None);

        assert_eq!(
            queue.reject(seq, "Remote API error: bad payload (422)"),
            Some(FailureOutcome::Dropped)
        );
        assert_eq!(queue.len(), 1);
        let dropped: Vec<_> = queue.dropped().collect();
        assert_eq!(dropped[0].change.id, "t1");
        assert_eq!(dropped[0].change.retry_count, 1);
        assert_eq!(queue.reject(seq, "again"), None);
    }

    #[test]
    fn unsendable_change_goes_straight_to_the_log() {
        let mut queue = PendingQueue::default();
        queue.log_unsendable(EntityKind::Project, ChangeAction::Create, "p1", "not an object");

        assert!(queue.is_empty());
        let dropped: Vec<_> = queue.dropped().collect();
        assert_eq!(dropped[0].change.describe(), "create project p1");
        assert_eq!(dropped[0].error, "not an object");
    }

    #[test]
    fn dropped_log_is_bounded() {
        let mut queue = PendingQueue::new(1, 2);
        for id in ["a", "b", "c"] {
            let seq = queue.enqueue(EntityKind::Tag, ChangeAction::Create, id, None);
            queue.fail(seq, "boom");
        }
        let ids: Vec<&str> = queue.dropped().map(|d| d.change.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn complete_removes_only_that_change() {
        let mut queue = PendingQueue::default();
        let create = queue.enqueue(EntityKind::Task, ChangeAction::Create, "t1", None);
        queue.enqueue(EntityKind::Task, ChangeAction::Update, "t1", None);

        assert!(queue.complete(create).is_some());
        assert_eq!(queue.len(), 1);
        assert!(queue.has_pending_for(EntityKind::Task, "t1"));
        assert!(!queue.has_pending_for(EntityKind::Project, "t1"));
    }

    #[test]
    fn reassign_rewrites_ids_and_task_references() {
        let mut queue = PendingQueue::default();
        queue.enqueue(
            EntityKind::Project,
            ChangeAction::Create,
            "local-p",
            Some(json!({"id": "local-p", "name": "Home"})),
        );
        queue.enqueue(
            EntityKind::Task,
            ChangeAction::Create,
            "t1",
            Some(json!({"id": "t1", "projectId": "local-p", "tags": []})),
        );
        queue.reassign_id(EntityKind::Project, "local-p", "srv-p");

        let changes = queue.snapshot();
        assert_eq!(changes[0].id, "srv-p");
        assert_eq!(changes[0].data.as_ref().unwrap()["id"], "srv-p");
        assert_eq!(changes[1].id, "t1");
        assert_eq!(changes[1].data.as_ref().unwrap()["projectId"], "srv-p");

        queue.enqueue(
            EntityKind::Task,
            ChangeAction::Update,
            "t1",
            Some(json!({"tags": ["local-tag", "other"]})),
        );
        queue.reassign_id(EntityKind::Tag, "local-tag", "srv-tag");
        assert_eq!(
            queue.snapshot()[2].data.as_ref().unwrap()["tags"],
            json!(["srv-tag", "other"])
        );
    }

    #[test]
    fn restored_queue_keeps_sequence() {
        let mut queue = PendingQueue::default();
        queue.enqueue(EntityKind::Task, ChangeAction::Delete, "t1", None);
        let json = serde_json::to_string(&queue).unwrap();

        let mut restored: PendingQueue = serde_json::from_str(&json).unwrap();
        restored.set_limits(3, 50);
        assert_eq!(restored, queue);
        let seq = restored.enqueue(EntityKind::Task, ChangeAction::Delete, "t2", None);
        assert_eq!(seq, 2);
    }
}
