//! taskdeck-core - Core library for taskdeck
//!
//! This crate contains the task, project and tag models, the in-memory
//! entity store, the version-based merge, and the sync engine that keeps a
//! device's copy in step with the remote persistence service.

pub mod calendar;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;
pub mod versioning;

pub use config::{RemoteConfig, SyncSettings};
pub use error::{Error, Result};
pub use models::{
    ConflictChoice, EntityKind, EntitySnapshot, NewTask, Project, ProjectId, SyncConflict,
    SyncStatus, Tag, TagId, Task, TaskFilter, TaskId, TaskPatch, TaskStatus,
};
pub use snapshot::SessionSnapshot;
pub use state::{SyncReport, SyncState};
pub use store::EntityStore;
pub use sync::{Reconciler, SessionPhase, SyncEngine};
