//! Tag model

use serde::{Deserialize, Serialize};

use crate::util::now_ms;

use super::id::TagId;
use super::sync_status::SyncStatus;

/// A tag for organizing tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Unique identifier
    pub id: TagId,
    /// Owning user
    pub user_id: String,
    pub name: String,
    /// Hex color (`#rrggbb`)
    pub color: String,
    #[serde(default = "first_version")]
    pub version: u64,
    /// Last mutation timestamp (Unix ms)
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

const fn first_version() -> u64 {
    1
}

impl Tag {
    /// Create a new tag with the given name
    ///
    /// Surrounding whitespace and a leading `#` are stripped from the name.
    #[must_use]
    pub fn new(user_id: &str, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: TagId::new(),
            user_id: user_id.to_string(),
            name: normalize_tag_name(&name.into()),
            color: color.into(),
            version: 1,
            last_modified: now_ms(),
            sync_status: SyncStatus::Pending,
        }
    }
}

/// Partial update of a tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TagPatch {
    pub(crate) fn apply_to(self, tag: &mut Tag) {
        if let Some(name) = self.name {
            tag.name = normalize_tag_name(&name);
        }
        if let Some(color) = self.color {
            tag.color = color;
        }
    }
}

fn normalize_tag_name(name: &str) -> String {
    name.trim().trim_start_matches('#').trim().to_string()
}
