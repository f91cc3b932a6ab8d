//! Entity kinds and type-erased entity snapshots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::project::Project;
use super::tag::Tag;
use super::task::Task;

/// The three synced collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Project,
    Tag,
}

impl EntityKind {
    pub const ALL: [Self; 3] = [Self::Project, Self::Tag, Self::Task];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Tag => "tag",
        }
    }

    /// Plural collection name used in remote paths and list envelopes
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Project => "projects",
            Self::Tag => "tags",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" | "tasks" => Ok(Self::Task),
            "project" | "projects" => Ok(Self::Project),
            "tag" | "tags" => Ok(Self::Tag),
            other => Err(Error::InvalidInput(format!("unknown entity kind '{other}'"))),
        }
    }
}

/// A full copy of one entity, whatever its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "entity", rename_all = "lowercase")]
pub enum EntitySnapshot {
    Task(Task),
    Project(Project),
    Tag(Tag),
}

impl EntitySnapshot {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Task(_) => EntityKind::Task,
            Self::Project(_) => EntityKind::Project,
            Self::Tag(_) => EntityKind::Tag,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Task(task) => task.id.as_str(),
            Self::Project(project) => project.id.as_str(),
            Self::Tag(tag) => tag.id.as_str(),
        }
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        match self {
            Self::Task(task) => task.version,
            Self::Project(project) => project.version,
            Self::Tag(tag) => tag.version,
        }
    }

    #[must_use]
    pub const fn last_modified(&self) -> i64 {
        match self {
            Self::Task(task) => task.last_modified,
            Self::Project(project) => project.last_modified,
            Self::Tag(tag) => tag.last_modified,
        }
    }

    /// Plain JSON body of the entity, as the remote service stores it
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Task(task) => serde_json::to_value(task),
            Self::Project(project) => serde_json::to_value(project),
            Self::Tag(tag) => serde_json::to_value(tag),
        }
    }

    /// Decode a plain JSON entity body of the given kind
    pub fn from_json(kind: EntityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Task => Self::Task(serde_json::from_value(value)?),
            EntityKind::Project => Self::Project(serde_json::from_value(value)?),
            EntityKind::Tag => Self::Tag(serde_json::from_value(value)?),
        })
    }
}

impl From<Task> for EntitySnapshot {
    fn from(value: Task) -> Self {
        Self::Task(value)
    }
}

impl From<Project> for EntitySnapshot {
    fn from(value: Project) -> Self {
        Self::Project(value)
    }
}

impl From<Tag> for EntitySnapshot {
    fn from(value: Tag) -> Self {
        Self::Tag(value)
    }
}
