//! Pending change model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::EntityKind;

/// What a queued change asks the remote service to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A local mutation not yet confirmed by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Queue-local sequence number, unique within a session
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub action: ChangeAction,
    /// Target entity id
    pub id: String,
    /// Full entity for creates, partial fields for updates, nothing for deletes
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Enqueue timestamp (Unix ms)
    pub timestamp: i64,
    /// Failed flush attempts so far
    #[serde(default)]
    pub retry_count: u32,
}

impl PendingChange {
    /// One-line description for logs and CLI output
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.action, self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_change_uses_type_key() {
        let change = PendingChange {
            seq: 7,
            kind: EntityKind::Tag,
            action: ChangeAction::Delete,
            id: "tag-1".to_string(),
            data: None,
            timestamp: 10,
            retry_count: 0,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "tag");
        assert_eq!(json["action"], "delete");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(change.describe(), "delete tag tag-1");
    }
}
