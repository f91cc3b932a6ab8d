//! Session-level sync state reported to clients.

use std::fmt;

use serde::Serialize;

/// Connectivity indicator shown by clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No successful exchange with the remote service yet
    #[default]
    Offline,
    Syncing,
    Synced,
    /// The last pull or push failed; local data stays usable
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        })
    }
}

/// Point-in-time summary of a session, for status displays.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub state: SyncState,
    pub pending_count: usize,
    pub conflict_count: usize,
    pub dropped_count: usize,
    pub initial_load_complete: bool,
    pub last_error: Option<String>,
    /// Unix ms of the last successful pull or flush
    pub last_synced_at: Option<i64>,
}
