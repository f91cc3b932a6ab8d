//! Unresolved conflicts awaiting a manual decision

use serde::{Deserialize, Serialize};

use crate::models::SyncConflict;

/// At most one open conflict per entity id; a newer detection replaces the
/// older record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictSet {
    conflicts: Vec<SyncConflict>,
}

impl ConflictSet {
    pub fn record(&mut self, conflict: SyncConflict) {
        match self
            .conflicts
            .iter_mut()
            .find(|existing| existing.item_id == conflict.item_id)
        {
            Some(existing) => *existing = conflict,
            None => self.conflicts.push(conflict),
        }
    }

    #[must_use]
    pub fn list(&self) -> &[SyncConflict] {
        &self.conflicts
    }

    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<&SyncConflict> {
        self.conflicts
            .iter()
            .find(|conflict| conflict.item_id == item_id)
    }

    /// Remove and return the conflict for `item_id`.
    pub fn take(&mut self, item_id: &str) -> Option<SyncConflict> {
        let position = self
            .conflicts
            .iter()
            .position(|conflict| conflict.item_id == item_id)?;
        Some(self.conflicts.remove(position))
    }

    /// Forget the conflict for an entity that was deleted locally.
    pub fn discard(&mut self, item_id: &str) {
        self.conflicts.retain(|conflict| conflict.item_id != item_id);
    }

    /// Follow a server-assigned id.
    pub fn reassign_id(&mut self, old: &str, new: &str) {
        for conflict in &mut self.conflicts {
            if conflict.item_id == old {
                conflict.item_id = new.to_string();
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn clear(&mut self) {
        self.conflicts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Task};
    use pretty_assertions::assert_eq;

    fn conflict(title: &str, timestamp: i64) -> SyncConflict {
        let mut task: Task = NewTask::titled(title).into_task("u1", 0);
        task.id = "t1".into();
        let mut remote = task.clone();
        remote.title = format!("{title} (remote)");
        SyncConflict::new(task.into(), remote.into(), timestamp)
    }

    #[test]
    fn redetection_replaces_existing_record() {
        let mut set = ConflictSet::default();
        set.record(conflict("first", 1));
        set.record(conflict("second", 2));

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("t1").unwrap().timestamp, 2);
    }

    #[test]
    fn take_removes_the_record() {
        let mut set = ConflictSet::default();
        set.record(conflict("only", 1));

        assert!(set.take("missing").is_none());
        assert_eq!(set.take("t1").unwrap().item_id, "t1");
        assert!(set.is_empty());
    }
}
