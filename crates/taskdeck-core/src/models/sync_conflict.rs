//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::entity::{EntityKind, EntitySnapshot};

/// Two copies of the same entity the merge could not order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Collection the entity belongs to
    pub item_type: EntityKind,
    /// Entity involved in the conflict
    pub item_id: String,
    /// Local copy at detection time
    pub local_version: EntitySnapshot,
    /// Remote copy at detection time (provisionally adopted)
    pub remote_version: EntitySnapshot,
    /// Detection timestamp (Unix ms)
    pub timestamp: i64,
}

impl SyncConflict {
    #[must_use]
    pub fn new(local: EntitySnapshot, remote: EntitySnapshot, timestamp: i64) -> Self {
        Self {
            item_type: remote.kind(),
            item_id: remote.id().to_string(),
            local_version: local,
            remote_version: remote,
            timestamp,
        }
    }

    /// The snapshot picked by `choice`
    #[must_use]
    pub const fn chosen(&self, choice: ConflictChoice) -> &EntitySnapshot {
        match choice {
            ConflictChoice::Local => &self.local_version,
            ConflictChoice::Remote => &self.remote_version,
        }
    }
}

/// Which side of a conflict wins on manual resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictChoice {
    Local,
    Remote,
}

impl fmt::Display for ConflictChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

impl FromStr for ConflictChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "mine" => Ok(Self::Local),
            "remote" | "theirs" => Ok(Self::Remote),
            other => Err(Error::InvalidInput(format!(
                "conflict choice must be 'local' or 'remote', got '{other}'"
            ))),
        }
    }
}
