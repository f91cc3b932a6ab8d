//! In-memory entity store
//!
//! Holds the current Task, Project and Tag collections for one user. Every
//! mutation is optimistic and infallible: it applies immediately, bumps the
//! entity version and marks it pending. Recording the change for upload is the
//! caller's job (see [`crate::sync::SyncEngine`]).

mod queries;

use serde::{Deserialize, Serialize};

use crate::models::{
    palette, EntityKind, EntitySnapshot, NewTask, Project, ProjectId, ProjectPatch, SyncConflict,
    SyncStatus, Tag, TagId, TagPatch, Task, TaskId, TaskPatch,
};
use crate::remote::RemoteSnapshot;
use crate::util::now_ms;
use crate::versioning::{merge_collection, MergeStats, Versioned};

/// A task rewritten as a side effect of another operation, with the fields
/// that changed
pub type TouchedTask = (Task, TaskPatch);

/// Result of deleting a Project or Tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cascade<T> {
    pub removed: T,
    /// Tasks that referenced the removed entity, already updated
    pub touched: Vec<TouchedTask>,
}

/// What a remote merge did to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub tasks: MergeStats,
    pub projects: MergeStats,
    pub tags: MergeStats,
    pub conflicts: Vec<SyncConflict>,
    /// Tasks whose references to missing projects or tags were cleared
    pub pruned: Vec<TouchedTask>,
}

/// Task, Project and Tag collections of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStore {
    user_id: String,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    tags: Vec<Tag>,
}

impl EntityStore {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    #[must_use]
    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| &project.id == id)
    }

    #[must_use]
    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags.iter().find(|tag| &tag.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.projects.is_empty() && self.tags.is_empty()
    }

    /// Current copy of any entity as a tagged snapshot.
    #[must_use]
    pub fn snapshot_of(&self, kind: EntityKind, id: &str) -> Option<EntitySnapshot> {
        match kind {
            EntityKind::Task => find_by_str(&self.tasks, id).cloned().map(Into::into),
            EntityKind::Project => find_by_str(&self.projects, id).cloned().map(Into::into),
            EntityKind::Tag => find_by_str(&self.tags, id).cloned().map(Into::into),
        }
    }

    /// Append a new task. Its display order is the current collection length.
    pub fn add_task(&mut self, new_task: NewTask) -> Task {
        let order = i64::try_from(self.tasks.len()).unwrap_or(i64::MAX);
        let task = new_task.into_task(&self.user_id, order);
        self.tasks.push(task.clone());
        task
    }

    /// Apply `patch`; `None` when the id is unknown.
    pub fn update_task(&mut self, id: &TaskId, patch: TaskPatch) -> Option<Task> {
        update_entity(&mut self.tasks, id, now_ms(), |task| patch.apply_to(task))
    }

    pub fn delete_task(&mut self, id: &TaskId) -> Option<Task> {
        remove_entity(&mut self.tasks, id)
    }

    /// Append a new project. Without a color the next palette color is used.
    pub fn add_project(&mut self, name: &str, color: Option<String>) -> Project {
        let color = color.unwrap_or_else(|| {
            palette::default_color(&palette::PROJECT_COLORS, self.projects.len()).to_string()
        });
        let project = Project::new(&self.user_id, name.trim(), color);
        self.projects.push(project.clone());
        project
    }

    pub fn update_project(&mut self, id: &ProjectId, patch: ProjectPatch) -> Option<Project> {
        update_entity(&mut self.projects, id, now_ms(), |project| {
            patch.apply_to(project);
        })
    }

    /// Remove a project and clear it from every task that pointed at it.
    pub fn delete_project(&mut self, id: &ProjectId) -> Option<Cascade<Project>> {
        let removed = remove_entity(&mut self.projects, id)?;
        let now = now_ms();
        let touched = self
            .tasks
            .iter_mut()
            .filter(|task| task.project_id.as_ref() == Some(id))
            .map(|task| {
                let patch = TaskPatch {
                    project_id: Some(None),
                    ..TaskPatch::default()
                };
                patch.clone().apply_to(task);
                task.touch(now);
                (task.clone(), patch)
            })
            .collect();
        Some(Cascade { removed, touched })
    }

    /// Append a new tag. Without a color the next palette color is used.
    pub fn add_tag(&mut self, name: &str, color: Option<String>) -> Tag {
        let color = color.unwrap_or_else(|| {
            palette::default_color(&palette::TAG_COLORS, self.tags.len()).to_string()
        });
        let tag = Tag::new(&self.user_id, name, color);
        self.tags.push(tag.clone());
        tag
    }

    pub fn update_tag(&mut self, id: &TagId, patch: TagPatch) -> Option<Tag> {
        update_entity(&mut self.tags, id, now_ms(), |tag| patch.apply_to(tag))
    }

    /// Remove a tag and strip it from every task carrying it.
    pub fn delete_tag(&mut self, id: &TagId) -> Option<Cascade<Tag>> {
        let removed = remove_entity(&mut self.tags, id)?;
        let now = now_ms();
        let touched = self
            .tasks
            .iter_mut()
            .filter(|task| task.references_tag(id))
            .map(|task| {
                let patch = TaskPatch {
                    tags: Some(task.tags.iter().filter(|tag| *tag != id).cloned().collect()),
                    ..TaskPatch::default()
                };
                patch.clone().apply_to(task);
                task.touch(now);
                (task.clone(), patch)
            })
            .collect();
        Some(Cascade { removed, touched })
    }

    /// Merge a full remote listing into the store.
    ///
    /// Projects and tags merge before tasks so that references from newly
    /// adopted tasks resolve. References left dangling afterwards are cleared.
    pub fn merge_remote(&mut self, remote: RemoteSnapshot) -> MergeReport {
        let now = now_ms();
        let mut report = MergeReport::default();

        let projects = merge_collection(std::mem::take(&mut self.projects), remote.projects);
        self.projects = projects.merged;
        report.projects = projects.stats;
        report
            .conflicts
            .extend(conflicts_of(projects.conflicts, now));

        let tags = merge_collection(std::mem::take(&mut self.tags), remote.tags);
        self.tags = tags.merged;
        report.tags = tags.stats;
        report.conflicts.extend(conflicts_of(tags.conflicts, now));

        let tasks = merge_collection(std::mem::take(&mut self.tasks), remote.tasks);
        self.tasks = tasks.merged;
        report.tasks = tasks.stats;
        report.conflicts.extend(conflicts_of(tasks.conflicts, now));

        report.pruned = self.prune_dangling_references();
        report
    }

    /// Clear task references to projects or tags that no longer exist.
    pub fn prune_dangling_references(&mut self) -> Vec<TouchedTask> {
        let now = now_ms();
        let projects = &self.projects;
        let tags = &self.tags;
        let mut touched = Vec::new();

        for task in &mut self.tasks {
            let mut patch = TaskPatch::default();
            if task
                .project_id
                .as_ref()
                .is_some_and(|id| !projects.iter().any(|project| &project.id == id))
            {
                patch.project_id = Some(None);
            }
            if task
                .tags
                .iter()
                .any(|id| !tags.iter().any(|tag| &tag.id == id))
            {
                patch.tags = Some(
                    task.tags
                        .iter()
                        .filter(|id| tags.iter().any(|tag| &tag.id == *id))
                        .cloned()
                        .collect(),
                );
            }
            if patch.is_empty() {
                continue;
            }
            tracing::debug!("Clearing dangling references on task {}", task.id);
            patch.clone().apply_to(task);
            task.touch(now);
            touched.push((task.clone(), patch));
        }

        touched
    }

    /// Rename an entity after the remote service assigned it a new id.
    ///
    /// Tasks pointing at a renamed project or tag are rewritten and returned.
    /// When the new id is already present (a pull got there first) the stale
    /// local copy is dropped instead.
    pub fn reassign_id(&mut self, kind: EntityKind, old: &str, new: &str) -> Vec<TouchedTask> {
        if old == new {
            return Vec::new();
        }
        match kind {
            EntityKind::Task => {
                rename_entity(&mut self.tasks, old, TaskId::from(new));
                Vec::new()
            }
            EntityKind::Project => {
                rename_entity(&mut self.projects, old, ProjectId::from(new));
                let now = now_ms();
                let new_id = ProjectId::from(new);
                self.tasks
                    .iter_mut()
                    .filter(|task| task.project_id.as_ref().is_some_and(|id| id.as_str() == old))
                    .map(|task| {
                        let patch = TaskPatch {
                            project_id: Some(Some(new_id.clone())),
                            ..TaskPatch::default()
                        };
                        patch.clone().apply_to(task);
                        task.touch(now);
                        (task.clone(), patch)
                    })
                    .collect()
            }
            EntityKind::Tag => {
                rename_entity(&mut self.tags, old, TagId::from(new));
                let now = now_ms();
                self.tasks
                    .iter_mut()
                    .filter(|task| task.tags.iter().any(|id| id.as_str() == old))
                    .map(|task| {
                        let tags = task
                            .tags
                            .iter()
                            .map(|id| {
                                if id.as_str() == old {
                                    TagId::from(new)
                                } else {
                                    id.clone()
                                }
                            })
                            .collect();
                        let patch = TaskPatch {
                            tags: Some(tags),
                            ..TaskPatch::default()
                        };
                        patch.clone().apply_to(task);
                        task.touch(now);
                        (task.clone(), patch)
                    })
                    .collect()
            }
        }
    }

    /// Set the advisory sync marker without touching the version.
    pub fn set_sync_status(&mut self, kind: EntityKind, id: &str, status: SyncStatus) {
        match kind {
            EntityKind::Task => set_status(&mut self.tasks, id, status),
            EntityKind::Project => set_status(&mut self.projects, id, status),
            EntityKind::Tag => set_status(&mut self.tags, id, status),
        }
    }

    /// Mark a pending entity as confirmed. Conflicted entities stay flagged
    /// until resolved.
    pub fn mark_synced(&mut self, kind: EntityKind, id: &str) {
        match kind {
            EntityKind::Task => confirm(&mut self.tasks, id),
            EntityKind::Project => confirm(&mut self.projects, id),
            EntityKind::Tag => confirm(&mut self.tags, id),
        }
    }

    /// Write a chosen snapshot back as a fresh local edit.
    ///
    /// The result's version is above both the current local copy and the
    /// snapshot, so it wins the next merge against either. Re-inserts the
    /// entity when it was deleted locally in the meantime.
    pub fn write_back(&mut self, snapshot: EntitySnapshot) -> EntitySnapshot {
        let now = now_ms();
        match snapshot {
            EntitySnapshot::Task(task) => write_back_entity(&mut self.tasks, task, now).into(),
            EntitySnapshot::Project(project) => {
                write_back_entity(&mut self.projects, project, now).into()
            }
            EntitySnapshot::Tag(tag) => write_back_entity(&mut self.tags, tag, now).into(),
        }
    }

    /// Drop every collection; used on logout.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.projects.clear();
        self.tags.clear();
    }
}

fn conflicts_of<T: Versioned>(pairs: Vec<(T, T)>, now: i64) -> Vec<SyncConflict> {
    pairs
        .into_iter()
        .map(|(local, remote)| {
            tracing::warn!("Sync conflict on {} {}", T::KIND, local.id());
            SyncConflict::new(local.into_snapshot(), remote.into_snapshot(), now)
        })
        .collect()
}

fn find_by_str<'a, T: Versioned>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|entity| entity.id().to_string() == id)
}

fn update_entity<T: Versioned>(
    items: &mut [T],
    id: &T::Id,
    now: i64,
    apply: impl FnOnce(&mut T),
) -> Option<T> {
    let entity = items.iter_mut().find(|entity| entity.id() == id)?;
    apply(entity);
    entity.touch(now);
    Some(entity.clone())
}

fn remove_entity<T: Versioned>(items: &mut Vec<T>, id: &T::Id) -> Option<T> {
    let position = items.iter().position(|entity| entity.id() == id)?;
    Some(items.remove(position))
}

fn rename_entity<T: Versioned>(items: &mut Vec<T>, old: &str, new: T::Id) {
    let Some(position) = items.iter().position(|entity| entity.id().to_string() == old) else {
        return;
    };
    if items.iter().any(|entity| entity.id() == &new) {
        items.remove(position);
    } else {
        items[position].set_id(new);
    }
}

fn set_status<T: Versioned>(items: &mut [T], id: &str, status: SyncStatus) {
    if let Some(entity) = items
        .iter_mut()
        .find(|entity| entity.id().to_string() == id)
    {
        entity.set_sync_status(status);
    }
}

fn confirm<T: Versioned>(items: &mut [T], id: &str) {
    if let Some(entity) = items
        .iter_mut()
        .find(|entity| entity.id().to_string() == id)
    {
        if entity.sync_status() == SyncStatus::Pending {
            entity.set_sync_status(SyncStatus::Synced);
        }
    }
}

fn write_back_entity<T: Versioned>(items: &mut Vec<T>, mut chosen: T, now: i64) -> T {
    let position = items.iter().position(|entity| entity.id() == chosen.id());
    let floor = position.map_or(0, |position| items[position].version());
    let version = floor.max(chosen.version());
    chosen.stamp(version, chosen.last_modified());
    chosen.touch(now);

    match position {
        Some(position) => items[position] = chosen.clone(),
        None => items.push(chosen.clone()),
    }
    chosen
}
