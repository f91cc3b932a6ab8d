//! On-disk copy of a session, so a client can work offline between runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::EntityStore;
use crate::sync::{ConflictSet, PendingQueue};
use crate::util::now_ms;

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Collections, unsynced changes and open conflicts of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub schema_version: u32,
    /// Unix ms
    pub saved_at: i64,
    pub store: EntityStore,
    #[serde(default)]
    pub queue: PendingQueue,
    #[serde(default)]
    pub conflicts: ConflictSet,
}

impl SessionSnapshot {
    #[must_use]
    pub fn new(store: EntityStore, queue: PendingQueue, conflicts: ConflictSet) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: now_ms(),
            store,
            queue,
            conflicts,
        }
    }

    /// Read a snapshot; `None` when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let snapshot: Self = serde_json::from_str(&raw)?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported snapshot schema_version {} (expected {}) in {}",
                snapshot.schema_version,
                SNAPSHOT_SCHEMA_VERSION,
                path.display()
            )));
        }
        Ok(Some(snapshot))
    }

    /// Write atomically: a temporary sibling file is renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, format!("{contents}\n"))?;
        fs::rename(&tmp, path)?;
        tracing::debug!("Saved session snapshot to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeAction, EntityKind, NewTask};
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            SessionSnapshot::load(&dir.path().join("absent.json")).unwrap(),
            None
        );
    }

    #[test]
    fn save_then_load_preserves_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = EntityStore::new("u1");
        let task = store.add_task(NewTask::titled("Persist me"));
        let mut queue = PendingQueue::default();
        queue.enqueue(EntityKind::Task, ChangeAction::Create, task.id.as_str(), None);

        let snapshot = SessionSnapshot::new(store, queue, ConflictSet::default());
        snapshot.save(&path).unwrap();

        let loaded = SessionSnapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut snapshot = SessionSnapshot::new(
            EntityStore::new("u1"),
            PendingQueue::default(),
            ConflictSet::default(),
        );
        snapshot.schema_version = 99;
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert!(SessionSnapshot::load(&path).is_err());
    }
}
