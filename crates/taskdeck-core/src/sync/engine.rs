//! Per-session sync context.
//!
//! [`SyncEngine`] owns the entity store, the pending-change queue and the
//! open conflicts of one signed-in user. Local mutations apply immediately
//! and are queued; [`SyncEngine::flush_pending`] pushes the queue and
//! [`SyncEngine::load_from_remote`] pulls and merges the remote collections.
//! Neither holds the session lock across a network call, so the store stays
//! readable and writable while requests are in flight.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::Instant;

use crate::calendar::{notify_detached, CalendarEvent, CalendarSink};
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::models::{
    ChangeAction, ConflictChoice, EntityKind, EntitySnapshot, PendingChange, Project, SyncConflict,
    Tag, Task, TaskId,
};
use crate::remote::{RemotePersistence, RemoteSnapshot};
use crate::snapshot::SessionSnapshot;
use crate::state::{SyncReport, SyncState};
use crate::store::{EntityStore, TouchedTask};
use crate::util::now_ms;
use crate::versioning::Versioned;

use super::conflicts::ConflictSet;
use super::queue::{DroppedChange, FailureOutcome, PendingQueue};

/// Result of one pull attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Remote collections were merged
    Merged {
        /// Entities added or replaced by their remote copy
        changed: usize,
        conflicts: usize,
    },
    /// Local changes are still queued
    SkippedPending,
    /// The previous pull was too recent
    SkippedTooSoon,
    /// Another pull is running
    SkippedInFlight,
    /// The session ended while the pull was running
    Discarded,
    /// The pull failed; local data is untouched
    Failed(String),
}

/// Result of one flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub pushed: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Held back because an earlier change to the same entity failed
    pub deferred: usize,
    /// Changes still queued afterwards
    pub remaining: usize,
    /// Another flush was already running
    pub skipped: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) store: EntityStore,
    pub(crate) queue: PendingQueue,
    pub(crate) conflicts: ConflictSet,
    sync_state: SyncState,
    last_error: Option<String>,
    initial_load_complete: bool,
    last_pull_at: Option<Instant>,
    last_synced_at: Option<i64>,
    /// Bumped on logout so results of requests started before it are ignored
    epoch: u64,
}

impl SessionState {
    /// Queue the creation of an entity already in the store.
    pub(super) fn queue_create(&mut self, entity: &EntitySnapshot) {
        self.queue_whole(ChangeAction::Create, entity);
    }

    /// Queue a full copy of `entity`. A payload that cannot be built lands
    /// in the dropped-change log instead.
    fn queue_whole(&mut self, action: ChangeAction, entity: &EntitySnapshot) {
        match entity.to_json() {
            Ok(data) => {
                self.queue
                    .enqueue(entity.kind(), action, entity.id(), Some(data));
            }
            Err(error) => {
                self.queue
                    .log_unsendable(entity.kind(), action, entity.id(), &error.to_string());
            }
        }
    }

    /// Queue the fields named by `fields`, read back from the updated
    /// entity so the remote copy matches the local one exactly.
    pub(super) fn queue_update<T: Versioned + Serialize>(
        &mut self,
        entity: &T,
        fields: &impl Serialize,
    ) {
        match update_payload(entity, fields) {
            Ok(data) => {
                self.queue.enqueue(
                    T::KIND,
                    ChangeAction::Update,
                    entity.id().to_string(),
                    Some(data),
                );
            }
            Err(error) => self.queue.log_unsendable(
                T::KIND,
                ChangeAction::Update,
                entity.id().to_string(),
                &error.to_string(),
            ),
        }
    }

    pub(super) fn queue_delete(&mut self, kind: EntityKind, id: &str) {
        self.conflicts.discard(id);
        self.queue.enqueue(kind, ChangeAction::Delete, id, None);
    }

    pub(super) fn queue_touched(&mut self, touched: &[TouchedTask]) {
        for (task, patch) in touched {
            self.queue_update(task, patch);
        }
    }
}

fn update_payload<T: Versioned + Serialize>(
    entity: &T,
    fields: &impl Serialize,
) -> Result<Value> {
    let Value::Object(patch) = serde_json::to_value(fields)? else {
        return Err(Error::InvalidInput("update fields must be an object".to_string()));
    };
    let Value::Object(mut current) = serde_json::to_value(entity)? else {
        return Err(Error::InvalidInput(format!("{} is not an object", T::KIND)));
    };

    let mut data = serde_json::Map::new();
    for key in patch.keys().map(String::as_str).chain(["version", "lastModified"]) {
        data.insert(key.to_string(), current.remove(key).unwrap_or(Value::Null));
    }
    Ok(Value::Object(data))
}

/// Resets an in-flight flag when the guarded operation ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) struct Inner {
    user_id: String,
    settings: SyncSettings,
    remote: Arc<dyn RemotePersistence>,
    calendar: OnceLock<Arc<dyn CalendarSink>>,
    pub(crate) state: Mutex<SessionState>,
    flushing: AtomicBool,
    pulling: AtomicBool,
    /// Signalled whenever the queue gains entries
    pub(crate) changes: Notify,
    flush_passes: AtomicU64,
}

/// Sync context of one signed-in user. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncEngine")
            .field("user_id", &self.inner.user_id)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        user_id: impl Into<String>,
        remote: Arc<dyn RemotePersistence>,
        settings: SyncSettings,
    ) -> Self {
        let user_id = user_id.into();
        let mut queue = PendingQueue::default();
        queue.set_limits(settings.max_retries, settings.dropped_log_capacity);

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    store: EntityStore::new(user_id.clone()),
                    queue,
                    ..SessionState::default()
                }),
                user_id,
                settings,
                remote,
                calendar: OnceLock::new(),
                flushing: AtomicBool::new(false),
                pulling: AtomicBool::new(false),
                changes: Notify::new(),
                flush_passes: AtomicU64::new(0),
            }),
        }
    }

    /// Attach the calendar integration. Only the first sink set is kept.
    pub fn set_calendar(&self, sink: Arc<dyn CalendarSink>) {
        if self.inner.calendar.set(sink).is_err() {
            tracing::warn!("Calendar sink already attached; ignoring replacement");
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().await
    }

    pub(crate) fn changed(&self) {
        self.inner.changes.notify_one();
    }

    pub(crate) fn calendar(&self, event: CalendarEvent) {
        notify_detached(self.inner.calendar.get(), event);
    }

    /// Run a read-only query against the current store.
    pub async fn read<R>(&self, query: impl FnOnce(&EntityStore) -> R) -> R {
        query(&self.lock().await.store)
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.read(|store| store.tasks().to_vec()).await
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.read(|store| store.projects().to_vec()).await
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.read(|store| store.tags().to_vec()).await
    }

    pub async fn task(&self, id: &TaskId) -> Option<Task> {
        self.read(|store| store.task(id).cloned()).await
    }

    pub async fn pending_count(&self) -> usize {
        self.lock().await.queue.len()
    }

    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        self.lock().await.queue.snapshot()
    }

    pub async fn dropped_changes(&self) -> Vec<DroppedChange> {
        self.lock().await.queue.dropped().cloned().collect()
    }

    pub async fn conflicts(&self) -> Vec<SyncConflict> {
        self.lock().await.conflicts.list().to_vec()
    }

    pub async fn is_initial_load_complete(&self) -> bool {
        self.lock().await.initial_load_complete
    }

    pub async fn report(&self) -> SyncReport {
        let state = self.lock().await;
        SyncReport {
            state: state.sync_state,
            pending_count: state.queue.len(),
            conflict_count: state.conflicts.len(),
            dropped_count: state.queue.dropped().count(),
            initial_load_complete: state.initial_load_complete,
            last_error: state.last_error.clone(),
            last_synced_at: state.last_synced_at,
        }
    }

    /// Number of flush passes that actually ran.
    #[must_use]
    pub fn flush_passes(&self) -> u64 {
        self.inner.flush_passes.load(Ordering::Relaxed)
    }

    /// Fetch all three remote collections and merge them into the store.
    ///
    /// The initial load always runs and marks the session loaded whatever
    /// the outcome. Later pulls skip themselves while changes are queued or
    /// when the previous pull is too recent. Failures are recorded in the
    /// session state and returned as [`PullOutcome::Failed`], never as errors.
    pub async fn load_from_remote(&self, is_initial: bool) -> PullOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.inner.pulling) else {
            tracing::debug!("Pull already in flight; skipping");
            return PullOutcome::SkippedInFlight;
        };
        let settings = self.inner.settings;

        let epoch = {
            let mut state = self.lock().await;
            if !is_initial {
                if !state.queue.is_empty() {
                    tracing::debug!("Skipping pull: {} changes pending", state.queue.len());
                    return PullOutcome::SkippedPending;
                }
                if state
                    .last_pull_at
                    .is_some_and(|at| at.elapsed() < settings.min_pull_spacing)
                {
                    return PullOutcome::SkippedTooSoon;
                }
            }
            state.last_pull_at = Some(Instant::now());
            state.sync_state = SyncState::Syncing;
            state.epoch
        };

        let (operation, limit) = if is_initial {
            ("initial load", settings.initial_load_timeout)
        } else {
            ("pull", settings.pull_timeout)
        };
        let remote = Arc::clone(&self.inner.remote);
        let user_id = self.inner.user_id.as_str();
        let fetched = with_timeout(operation, limit, async {
            tokio::try_join!(
                remote.list_all(EntityKind::Task, user_id),
                remote.list_all(EntityKind::Project, user_id),
                remote.list_all(EntityKind::Tag, user_id),
            )
        })
        .await;

        let mut state = self.lock().await;
        if state.epoch != epoch {
            tracing::debug!("Session ended during {}; discarding result", operation);
            return PullOutcome::Discarded;
        }
        if is_initial {
            state.initial_load_complete = true;
        }

        let (tasks, projects, tags) = match fetched {
            Ok(lists) => lists,
            Err(error) => {
                tracing::warn!("Remote {} failed: {}", operation, error);
                let message = error.to_string();
                state.sync_state = SyncState::Error;
                state.last_error = Some(message.clone());
                return PullOutcome::Failed(message);
            }
        };

        let report = state
            .store
            .merge_remote(RemoteSnapshot::from_lists(tasks, projects, tags));
        let conflicts = report.conflicts.len();
        for conflict in report.conflicts {
            state.conflicts.record(conflict);
        }
        state.queue_touched(&report.pruned);
        let pruned = !report.pruned.is_empty();

        let changed = report.tasks.added
            + report.tasks.updated
            + report.projects.added
            + report.projects.updated
            + report.tags.added
            + report.tags.updated;
        tracing::info!(
            "Merged remote {}: tasks [{}] projects [{}] tags [{}]",
            operation,
            report.tasks,
            report.projects,
            report.tags
        );

        state.sync_state = SyncState::Synced;
        state.last_error = None;
        state.last_synced_at = Some(now_ms());
        drop(state);

        if pruned {
            self.changed();
        }
        PullOutcome::Merged { changed, conflicts }
    }

    /// Push queued changes in FIFO order.
    ///
    /// Once a change fails, later changes to the same entity wait for the
    /// next pass so they never reach the remote ahead of it. Single-flight:
    /// a call made while another flush runs returns at once with `skipped`
    /// set.
    pub async fn flush_pending(&self) -> FlushReport {
        let Some(_guard) = FlightGuard::acquire(&self.inner.flushing) else {
            tracing::debug!("Flush already in flight; skipping");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        };

        let (batch, epoch) = {
            let mut state = self.lock().await;
            if state.queue.is_empty() {
                return FlushReport::default();
            }
            state.sync_state = SyncState::Syncing;
            (state.queue.snapshot(), state.epoch)
        };
        self.inner.flush_passes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Flushing {} pending changes", batch.len());

        let mut report = FlushReport::default();
        let mut last_error = None;
        let mut held_back: HashSet<(EntityKind, String)> = HashSet::new();

        for queued in batch {
            // An earlier create in this pass may have renamed the target.
            let change = {
                let state = self.lock().await;
                if state.epoch != epoch {
                    return report;
                }
                match state.queue.get(queued.seq) {
                    Some(change) => change.clone(),
                    None => continue,
                }
            };
            if held_back.contains(&(change.kind, change.id.clone())) {
                tracing::debug!("Deferring {} behind a failed change", change.describe());
                report.deferred += 1;
                continue;
            }

            let outcome = self.push(&change).await;

            let mut state = self.lock().await;
            if state.epoch != epoch {
                return report;
            }
            match outcome {
                Ok(created_id) => {
                    report.pushed += 1;
                    state.queue.complete(change.seq);
                    let mut id = change.id.clone();
                    if let Some(new_id) = created_id.filter(|new_id| new_id != &id) {
                        self.apply_reassigned_id(&mut state, change.kind, &id, &new_id);
                        id = new_id;
                    }
                    if change.action != ChangeAction::Delete
                        && !state.queue.has_pending_for(change.kind, &id)
                    {
                        state.store.mark_synced(change.kind, &id);
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    let outcome = if error.is_transient() {
                        state.queue.fail(change.seq, &message)
                    } else {
                        state.queue.reject(change.seq, &message)
                    };
                    match outcome {
                        Some(FailureOutcome::Dropped) => {
                            report.failed += 1;
                            report.dropped += 1;
                        }
                        Some(FailureOutcome::Retrying(_)) => report.failed += 1,
                        None => {}
                    }
                    held_back.insert((change.kind, change.id.clone()));
                    last_error = Some(message);
                }
            }
        }

        let mut state = self.lock().await;
        if state.epoch != epoch {
            return report;
        }
        report.remaining = state.queue.len();
        if let Some(message) = last_error {
            state.sync_state = SyncState::Error;
            state.last_error = Some(message);
        } else {
            state.sync_state = SyncState::Synced;
            state.last_error = None;
            state.last_synced_at = Some(now_ms());
        }
        tracing::info!(
            "Flush finished: pushed={} failed={} dropped={} deferred={} remaining={}",
            report.pushed,
            report.failed,
            report.dropped,
            report.deferred,
            report.remaining
        );
        report
    }

    /// Send one change. Returns the id the remote service stored a created
    /// entity under.
    async fn push(&self, change: &PendingChange) -> Result<Option<String>> {
        let remote = &self.inner.remote;
        let limit = self.inner.settings.push_timeout;
        match change.action {
            ChangeAction::Create => {
                let data = change.data.clone().ok_or_else(|| {
                    Error::InvalidInput(format!("{} has no payload", change.describe()))
                })?;
                let entity = EntitySnapshot::from_json(change.kind, data)?;
                let created = with_timeout("create", limit, remote.create(&entity)).await?;
                Ok(Some(created.id().to_string()))
            }
            ChangeAction::Update => {
                let fields = change
                    .data
                    .clone()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                with_timeout(
                    "update",
                    limit,
                    remote.update(change.kind, &change.id, &fields),
                )
                .await?;
                Ok(None)
            }
            ChangeAction::Delete => {
                with_timeout("delete", limit, remote.delete(change.kind, &change.id)).await?;
                Ok(None)
            }
        }
    }

    fn apply_reassigned_id(
        &self,
        state: &mut SessionState,
        kind: EntityKind,
        old: &str,
        new: &str,
    ) {
        tracing::info!("Remote assigned id {} to {} {}", new, kind, old);
        let touched = state.store.reassign_id(kind, old, new);
        state.queue.reassign_id(kind, old, new);
        state.conflicts.reassign_id(old, new);
        state.queue_touched(&touched);
        if !touched.is_empty() {
            self.changed();
        }
    }

    /// Settle a conflict by writing the chosen copy back as a new local edit.
    ///
    /// The written copy gets a version above both sides and is queued as a
    /// full update, so it wins the next merge on every device.
    pub async fn resolve_conflict(
        &self,
        item_id: &str,
        choice: ConflictChoice,
    ) -> Result<EntitySnapshot> {
        let written = {
            let mut state = self.lock().await;
            let conflict = state
                .conflicts
                .take(item_id)
                .ok_or_else(|| Error::NotFound(format!("no open conflict for {item_id}")))?;
            let written = state.store.write_back(conflict.chosen(choice).clone());
            state.queue_whole(ChangeAction::Update, &written);
            written
        };

        tracing::info!(
            "Resolved conflict on {} {} keeping {} copy",
            written.kind(),
            written.id(),
            choice
        );
        self.changed();
        if let EntitySnapshot::Task(task) = &written {
            self.calendar(CalendarEvent::Updated(task.clone()));
        }
        Ok(written)
    }

    /// Replace the session with a saved snapshot of the same user.
    pub async fn restore(&self, snapshot: SessionSnapshot) -> Result<()> {
        if snapshot.store.user_id() != self.inner.user_id {
            return Err(Error::InvalidInput(format!(
                "snapshot belongs to user '{}', session is '{}'",
                snapshot.store.user_id(),
                self.inner.user_id
            )));
        }

        let pending = {
            let mut state = self.lock().await;
            state.store = snapshot.store;
            state.queue = snapshot.queue;
            state.queue.set_limits(
                self.inner.settings.max_retries,
                self.inner.settings.dropped_log_capacity,
            );
            state.conflicts = snapshot.conflicts;
            state.queue.len()
        };
        tracing::debug!("Restored session snapshot with {} pending changes", pending);
        if pending > 0 {
            self.changed();
        }
        Ok(())
    }

    pub async fn to_snapshot(&self) -> SessionSnapshot {
        let state = self.lock().await;
        SessionSnapshot::new(
            state.store.clone(),
            state.queue.clone(),
            state.conflicts.clone(),
        )
    }

    /// End the session: forget all local state. Requests still in flight
    /// finish but their results are ignored.
    pub async fn clear(&self) {
        let mut state = self.lock().await;
        let epoch = state.epoch.wrapping_add(1);
        let mut queue = PendingQueue::default();
        queue.set_limits(
            self.inner.settings.max_retries,
            self.inner.settings.dropped_log_capacity,
        );
        *state = SessionState {
            store: EntityStore::new(self.inner.user_id.clone()),
            queue,
            epoch,
            ..SessionState::default()
        };
        tracing::info!("Cleared session for {}", self.inner.user_id);
    }
}

async fn with_timeout<T>(
    operation: &'static str,
    after: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| Error::Timeout { operation, after })?
}
