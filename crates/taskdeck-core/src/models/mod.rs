//! Data models for taskdeck

mod entity;
mod filter;
mod id;
pub mod palette;
mod pending_change;
mod project;
mod sync_conflict;
mod sync_status;
mod tag;
mod task;

pub use entity::{EntityKind, EntitySnapshot};
pub use filter::TaskFilter;
pub use id::{ProjectId, SubtaskId, TagId, TaskId};
pub use pending_change::{ChangeAction, PendingChange};
pub use project::{Project, ProjectPatch};
pub use sync_conflict::{ConflictChoice, SyncConflict};
pub use sync_status::SyncStatus;
pub use tag::{Tag, TagPatch};
pub use task::{NewTask, Subtask, SubtaskPatch, Task, TaskPatch, TaskStatus};
