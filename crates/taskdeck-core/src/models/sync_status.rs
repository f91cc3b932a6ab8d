//! Per-entity sync marker

use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory sync state shown next to an entity.
///
/// Merge decisions never read this; they use `version` and `lastModified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Matches what the remote service last confirmed
    #[default]
    Synced,
    /// Local edits not yet confirmed remotely
    Pending,
    /// Provisionally replaced by a remote copy; awaiting manual resolution
    Conflict,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
        })
    }
}
