//! Entity versioning and the local/remote merge rules
//!
//! Every entity carries a `version` counter bumped on each accepted local
//! mutation and a `lastModified` timestamp. Given a local and a remote copy of
//! the same id, the higher version wins; equal versions fall back to the later
//! timestamp; equal versions and timestamps with different content are a
//! conflict, which provisionally adopts the remote copy and is reported to the
//! caller.
//!
//! Absence from a remote snapshot never deletes a local entity. Deletions only
//! travel as explicit delete operations.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::models::{EntityKind, EntitySnapshot, Project, SyncStatus, Tag, Task};

/// Shared view over the sync metadata of Tasks, Projects and Tags
pub trait Versioned: Clone + PartialEq {
    const KIND: EntityKind;
    type Id: Clone + Eq + Hash + fmt::Display;

    fn id(&self) -> &Self::Id;
    fn set_id(&mut self, id: Self::Id);
    fn version(&self) -> u64;
    fn last_modified(&self) -> i64;
    fn sync_status(&self) -> SyncStatus;
    fn set_sync_status(&mut self, status: SyncStatus);
    fn stamp(&mut self, version: u64, last_modified: i64);
    fn into_snapshot(self) -> EntitySnapshot;
    fn from_snapshot(snapshot: EntitySnapshot) -> Option<Self>;

    /// Record an accepted local mutation.
    fn touch(&mut self, now: i64) {
        let next = self.version().saturating_add(1);
        self.stamp(next, now);
        self.set_sync_status(SyncStatus::Pending);
    }

    /// Equal in every field except the advisory sync marker.
    fn same_content(&self, other: &Self) -> bool {
        let mut other = other.clone();
        other.set_sync_status(self.sync_status());
        *self == other
    }
}

macro_rules! impl_versioned {
    ($ty:ty, $kind:expr, $id:ty, $variant:ident) => {
        impl Versioned for $ty {
            const KIND: EntityKind = $kind;
            type Id = $id;

            fn id(&self) -> &Self::Id {
                &self.id
            }

            fn set_id(&mut self, id: Self::Id) {
                self.id = id;
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn last_modified(&self) -> i64 {
                self.last_modified
            }

            fn sync_status(&self) -> SyncStatus {
                self.sync_status
            }

            fn set_sync_status(&mut self, status: SyncStatus) {
                self.sync_status = status;
            }

            fn stamp(&mut self, version: u64, last_modified: i64) {
                self.version = version;
                self.last_modified = last_modified;
            }

            fn into_snapshot(self) -> EntitySnapshot {
                EntitySnapshot::$variant(self)
            }

            fn from_snapshot(snapshot: EntitySnapshot) -> Option<Self> {
                match snapshot {
                    EntitySnapshot::$variant(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

impl_versioned!(Task, EntityKind::Task, crate::models::TaskId, Task);
impl_versioned!(Project, EntityKind::Project, crate::models::ProjectId, Project);
impl_versioned!(Tag, EntityKind::Tag, crate::models::TagId, Tag);

/// Outcome of comparing one local copy with one remote copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// The id is unknown locally: another device created it
    AdoptNew,
    /// Remote is strictly newer
    AdoptRemote,
    /// Local is strictly newer
    KeepLocal,
    /// Same version, same timestamp, same content
    Unchanged,
    /// Same version and timestamp but different content
    Conflict,
}

impl MergeDecision {
    /// Whether the remote copy replaces the local one (provisionally for conflicts)
    #[must_use]
    pub const fn takes_remote(self) -> bool {
        matches!(self, Self::AdoptNew | Self::AdoptRemote | Self::Conflict)
    }
}

/// Decide which copy of an entity survives.
pub fn decide<T: Versioned>(local: Option<&T>, remote: &T) -> MergeDecision {
    let Some(local) = local else {
        return MergeDecision::AdoptNew;
    };

    match local.version().cmp(&remote.version()) {
        std::cmp::Ordering::Greater => MergeDecision::KeepLocal,
        std::cmp::Ordering::Less => MergeDecision::AdoptRemote,
        std::cmp::Ordering::Equal => match local.last_modified().cmp(&remote.last_modified()) {
            std::cmp::Ordering::Greater => MergeDecision::KeepLocal,
            std::cmp::Ordering::Less => MergeDecision::AdoptRemote,
            std::cmp::Ordering::Equal if local.same_content(remote) => MergeDecision::Unchanged,
            std::cmp::Ordering::Equal => MergeDecision::Conflict,
        },
    }
}

/// Result of merging one whole collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome<T> {
    /// Surviving entities: local order first, then new remote entities
    pub merged: Vec<T>,
    /// `(local, remote)` pairs that could not be ordered
    pub conflicts: Vec<(T, T)>,
    pub stats: MergeStats,
}

/// Per-collection merge counters, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub kept_local: usize,
    pub unchanged: usize,
    pub conflicts: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added={} updated={} kept_local={} unchanged={} conflicts={}",
            self.added, self.updated, self.kept_local, self.unchanged, self.conflicts
        )
    }
}

/// Merge a remote snapshot into a local collection.
///
/// Entities only present locally are retained unchanged. Adopted remote copies
/// are marked synced; conflicting ones are marked as conflicts.
pub fn merge_collection<T: Versioned>(local: Vec<T>, remote: Vec<T>) -> MergeOutcome<T> {
    let mut index: HashMap<T::Id, usize> = local
        .iter()
        .enumerate()
        .map(|(position, entity)| (entity.id().clone(), position))
        .collect();
    let mut merged = local;
    let mut conflicts = Vec::new();
    let mut stats = MergeStats::default();

    for mut incoming in remote {
        let position = index.get(incoming.id()).copied();
        let decision = decide(position.map(|position| &merged[position]), &incoming);

        match decision {
            MergeDecision::KeepLocal => stats.kept_local += 1,
            MergeDecision::Unchanged => stats.unchanged += 1,
            MergeDecision::AdoptNew => {
                stats.added += 1;
                incoming.set_sync_status(SyncStatus::Synced);
                index.insert(incoming.id().clone(), merged.len());
                merged.push(incoming);
            }
            MergeDecision::AdoptRemote | MergeDecision::Conflict => {
                let Some(position) = position else {
                    continue;
                };
                if decision == MergeDecision::Conflict {
                    stats.conflicts += 1;
                    conflicts.push((merged[position].clone(), incoming.clone()));
                    incoming.set_sync_status(SyncStatus::Conflict);
                } else {
                    stats.updated += 1;
                    incoming.set_sync_status(SyncStatus::Synced);
                }
                merged[position] = incoming;
            }
        }
    }

    MergeOutcome {
        merged,
        conflicts,
        stats,
    }
}
