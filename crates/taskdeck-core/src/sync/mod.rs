//! Synchronization with the remote persistence service

mod conflicts;
mod engine;
mod mutations;
mod queue;
mod reconciler;
mod trigger;

pub use conflicts::ConflictSet;
pub use engine::{FlushReport, PullOutcome, SyncEngine};
pub use queue::{DroppedChange, FailureOutcome, PendingQueue};
pub use reconciler::{Reconciler, SessionPhase};
pub use trigger::{PollingTrigger, PullTrigger};
