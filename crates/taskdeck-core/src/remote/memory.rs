//! In-process remote service for tests and offline development

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{EntityKind, EntitySnapshot};

use super::{decode_entity, RemotePersistence};

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<EntityKind, Vec<Value>>,
    failures_remaining: u32,
    failure_status: u16,
    offline: bool,
    server_ids: bool,
    next_server_id: u64,
    calls: Vec<String>,
}

impl MemoryState {
    fn check_available(&mut self, call: String) -> Result<()> {
        self.calls.push(call);
        if self.offline {
            return Err(Error::Api {
                status: 503,
                message: "remote offline".to_string(),
            });
        }
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(Error::Api {
                status: self.failure_status,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn position(&self, kind: EntityKind, id: &str) -> Option<usize> {
        self.collections
            .get(&kind)?
            .iter()
            .position(|entity| entity.get("id").and_then(Value::as_str) == Some(id))
    }
}

/// Remote persistence held in memory, shareable between engines to model
/// several devices on one account.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that assigns its own ids on create, like a database with
    /// generated keys.
    #[must_use]
    pub fn with_server_ids() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                server_ids: true,
                ..MemoryState::default()
            })),
        }
    }

    /// Fail the next `count` calls with a server error.
    pub async fn fail_next(&self, count: u32) {
        self.fail_next_with(count, 500).await;
    }

    /// Fail the next `count` calls with the given HTTP status.
    pub async fn fail_next_with(&self, count: u32, status: u16) {
        let mut state = self.state.lock().await;
        state.failures_remaining = count;
        state.failure_status = status;
    }

    /// Fail every call until switched back.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Store an entity as-is, bypassing failure injection.
    pub async fn seed(&self, entity: EntitySnapshot) -> Result<()> {
        let kind = entity.kind();
        let id = entity.id().to_string();
        let value = entity.to_json()?;
        let mut state = self.state.lock().await;
        match state.position(kind, &id) {
            Some(position) => state.collections.entry(kind).or_default()[position] = value,
            None => state.collections.entry(kind).or_default().push(value),
        }
        Ok(())
    }

    pub async fn get(&self, kind: EntityKind, id: &str) -> Option<EntitySnapshot> {
        let state = self.state.lock().await;
        let position = state.position(kind, id)?;
        let value = state.collections.get(&kind)?.get(position)?.clone();
        decode_entity(kind, value).ok()
    }

    pub async fn count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Every call received so far, as `"<action> <kind> <id>"`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl RemotePersistence for MemoryRemote {
    async fn list_all(&self, kind: EntityKind, user_id: &str) -> Result<Vec<EntitySnapshot>> {
        let mut state = self.state.lock().await;
        state.check_available(format!("list {kind} {user_id}"))?;
        state
            .collections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|entity| entity.get("userId").and_then(Value::as_str) == Some(user_id))
            .map(|entity| decode_entity(kind, entity.clone()))
            .collect()
    }

    async fn create(&self, entity: &EntitySnapshot) -> Result<EntitySnapshot> {
        let kind = entity.kind();
        let mut state = self.state.lock().await;
        state.check_available(format!("create {kind} {}", entity.id()))?;

        let mut value = entity.to_json()?;
        let existing = state.position(kind, entity.id());
        if existing.is_none() && state.server_ids {
            state.next_server_id += 1;
            let id = format!("srv-{}-{}", kind, state.next_server_id);
            if let Value::Object(fields) = &mut value {
                fields.insert("id".to_string(), Value::String(id));
            }
        }

        let collection = state.collections.entry(kind).or_default();
        match existing {
            Some(position) => collection[position] = value.clone(),
            None => collection.push(value.clone()),
        }
        decode_entity(kind, value)
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_available(format!("update {kind} {id}"))?;

        let Value::Object(fields) = fields else {
            return Err(Error::InvalidInput(format!(
                "update of {kind} {id} needs an object body"
            )));
        };
        let position = state.position(kind, id).ok_or_else(|| Error::Api {
            status: 404,
            message: format!("{kind} {id} not found"),
        })?;
        if let Some(Value::Object(stored)) = state
            .collections
            .get_mut(&kind)
            .and_then(|collection| collection.get_mut(position))
        {
            for (key, value) in fields {
                stored.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_available(format!("delete {kind} {id}"))?;
        if let Some(position) = state.position(kind, id) {
            if let Some(collection) = state.collections.get_mut(&kind) {
                collection.remove(position);
            }
        }
        Ok(())
    }
}
