//! Project model

use serde::{Deserialize, Serialize};

use crate::util::now_ms;

use super::id::ProjectId;
use super::sync_status::SyncStatus;

/// A project grouping tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,
    /// Owning user
    pub user_id: String,
    pub name: String,
    /// Hex color (`#rrggbb`)
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Creation timestamp (Unix ms)
    #[serde(default)]
    pub created_at: i64,
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

impl Project {
    /// Create a new project owned by `user_id`
    #[must_use]
    pub fn new(user_id: &str, name: impl Into<String>, color: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: ProjectId::new(),
            user_id: user_id.to_string(),
            name: name.into(),
            color: color.into(),
            icon: None,
            created_at: now,
            version: 1,
            last_modified: now,
            sync_status: SyncStatus::Pending,
        }
    }
}

/// Partial update of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
}

impl ProjectPatch {
    pub(crate) fn apply_to(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(color) = self.color {
            project.color = color;
        }
        if let Some(icon) = self.icon {
            project.icon = icon;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_new() {
        let project = Project::new("u1", "Home", "#22c55e");
        assert_eq!(project.version, 1);
        assert_eq!(project.user_id, "u1");
        assert_eq!(project.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut project = Project::new("u1", "Home", "#22c55e");
        ProjectPatch {
            name: Some("House".to_string()),
            ..ProjectPatch::default()
        }
        .apply_to(&mut project);
        assert_eq!(project.name, "House");
        assert_eq!(project.color, "#22c55e");
    }
}
