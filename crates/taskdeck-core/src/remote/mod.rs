//! Remote persistence contract
//!
//! The sync engine talks to the service that stores every device's copy of
//! the data through [`RemotePersistence`]. Calls are idempotent by id:
//! re-creating an existing id upserts, updates take partial field sets, and
//! deleting a missing id succeeds.

mod http;
mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{EntityKind, EntitySnapshot, Project, Tag, Task};

/// Remote storage for tasks, projects and tags
#[async_trait]
pub trait RemotePersistence: Send + Sync {
    /// Every entity of `kind` owned by `user_id`.
    async fn list_all(&self, kind: EntityKind, user_id: &str) -> Result<Vec<EntitySnapshot>>;

    /// Store a new entity. The service may answer with a different id.
    async fn create(&self, entity: &EntitySnapshot) -> Result<EntitySnapshot>;

    /// Merge `fields` into the stored entity.
    async fn update(&self, kind: EntityKind, id: &str, fields: &Value) -> Result<()>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()>;
}

/// The three collections as listed by the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub tags: Vec<Tag>,
}

impl RemoteSnapshot {
    /// Sort listed entities into their collections.
    #[must_use]
    pub fn from_lists(
        tasks: Vec<EntitySnapshot>,
        projects: Vec<EntitySnapshot>,
        tags: Vec<EntitySnapshot>,
    ) -> Self {
        let mut snapshot = Self::default();
        for entity in tasks.into_iter().chain(projects).chain(tags) {
            match entity {
                EntitySnapshot::Task(task) => snapshot.tasks.push(task),
                EntitySnapshot::Project(project) => snapshot.projects.push(project),
                EntitySnapshot::Tag(tag) => snapshot.tags.push(tag),
            }
        }
        snapshot
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len() + self.projects.len() + self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a list response: either a bare array or an object holding the
/// array under the collection name (`{"tasks": [...]}`).
pub(crate) fn decode_list(kind: EntityKind, body: Value) -> Result<Vec<EntitySnapshot>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove(kind.collection()) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::MalformedResponse(format!(
                    "expected an array under '{}'",
                    kind.collection()
                )))
            }
        },
        other => {
            return Err(Error::MalformedResponse(format!(
                "expected a {} list, got {}",
                kind,
                json_type(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| decode_entity(kind, item))
        .collect()
}

/// Decode a single entity body, accepting a `{"task": {...}}` style envelope.
pub(crate) fn decode_entity(kind: EntityKind, body: Value) -> Result<EntitySnapshot> {
    let body = match body {
        Value::Object(mut envelope)
            if envelope.len() == 1 && envelope.contains_key(kind.as_str()) =>
        {
            envelope.remove(kind.as_str()).unwrap_or(Value::Null)
        }
        other => other,
    };
    EntitySnapshot::from_json(kind, body)
        .map_err(|error| Error::MalformedResponse(format!("invalid {kind}: {error}")))
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn task_json(id: &str) -> Value {
        let mut task = NewTask::titled("Listed").into_task("u1", 0);
        task.id = id.into();
        serde_json::to_value(task).unwrap()
    }

    #[test]
    fn list_accepts_bare_array_and_envelope() {
        let bare = decode_list(EntityKind::Task, json!([task_json("a")])).unwrap();
        let wrapped =
            decode_list(EntityKind::Task, json!({"tasks": [task_json("a")]})).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].id(), "a");
    }

    #[test]
    fn list_rejects_other_shapes() {
        assert!(matches!(
            decode_list(EntityKind::Task, json!({"items": []})),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_list(EntityKind::Tag, json!("nope")),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn entity_missing_fields_is_malformed() {
        let error = decode_entity(EntityKind::Project, json!({"id": "p1"})).unwrap_err();
        assert!(matches!(error, Error::MalformedResponse(_)));
    }

    #[test]
    fn snapshot_sorts_entities_by_kind() {
        let task = decode_entity(EntityKind::Task, task_json("a")).unwrap();
        let snapshot = RemoteSnapshot::from_lists(vec![task], Vec::new(), Vec::new());
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.len(), 1);
    }
}
