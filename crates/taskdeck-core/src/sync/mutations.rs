//! Optimistic mutations.
//!
//! Each operation applies to the store under the session lock, queues the
//! matching remote change and signals the reconciliation loop. Input is
//! validated before the store is touched. Lookups of unknown ids return
//! `Ok(None)` / `Ok(false)`; only invalid input is an error.

use crate::calendar::CalendarEvent;
use crate::error::{Error, Result};
use crate::models::{
    palette, EntityKind, NewTask, Project, ProjectId, ProjectPatch, Subtask, SubtaskId,
    SubtaskPatch, Tag, TagId, TagPatch, Task, TaskId, TaskPatch, TaskStatus,
};
use crate::util::normalize_text_option;
use crate::versioning::Versioned;

use super::engine::{SessionState, SyncEngine};

fn required_text(value: &str, what: &str) -> Result<String> {
    normalize_text_option(Some(value.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{what} must not be empty")))
}

fn validate_color(color: Option<&str>) -> Result<()> {
    match color {
        Some(color) if !palette::is_hex_color(color) => Err(Error::InvalidInput(format!(
            "color must look like #rrggbb, got '{color}'"
        ))),
        _ => Ok(()),
    }
}

fn check_task_references(
    state: &SessionState,
    project_id: Option<&ProjectId>,
    tags: &[TagId],
) -> Result<()> {
    if let Some(project_id) = project_id {
        if state.store.project(project_id).is_none() {
            return Err(Error::NotFound(format!("project {project_id}")));
        }
    }
    if let Some(tag_id) = tags.iter().find(|tag_id| state.store.tag(tag_id).is_none()) {
        return Err(Error::NotFound(format!("tag {tag_id}")));
    }
    Ok(())
}

impl SyncEngine {
    /// Create a task. The title is required; referenced project and tags
    /// must exist.
    pub async fn add_task(&self, mut new_task: NewTask) -> Result<Task> {
        new_task.title = required_text(&new_task.title, "task title")?;
        new_task.description = normalize_text_option(new_task.description);

        let task = {
            let mut state = self.lock().await;
            check_task_references(&state, new_task.project_id.as_ref(), &new_task.tags)?;
            let task = state.store.add_task(new_task);
            state.queue_create(&task.clone().into_snapshot());
            task
        };

        tracing::debug!("Added task {}", task.id);
        self.changed();
        self.calendar(CalendarEvent::Created(task.clone()));
        Ok(task)
    }

    /// Apply a partial update to a task; `None` when the id is unknown.
    pub async fn update_task(&self, id: &TaskId, mut patch: TaskPatch) -> Result<Option<Task>> {
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(required_text(title, "task title")?);
        }
        if let Some(description) = patch.description.take() {
            patch.description = Some(normalize_text_option(description));
        }

        let task = {
            let mut state = self.lock().await;
            check_task_references(
                &state,
                patch.project_id.as_ref().and_then(Option::as_ref),
                patch.tags.as_deref().unwrap_or_default(),
            )?;
            let Some(task) = state.store.update_task(id, patch.clone()) else {
                return Ok(None);
            };
            state.queue_update(&task, &patch);
            task
        };

        self.changed();
        self.calendar(CalendarEvent::Updated(task.clone()));
        Ok(Some(task))
    }

    /// Remove a task; `false` when the id is unknown.
    pub async fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let removed = {
            let mut state = self.lock().await;
            let Some(task) = state.store.delete_task(id) else {
                return Ok(false);
            };
            state.queue_delete(EntityKind::Task, task.id.as_str());
            task
        };

        tracing::debug!("Deleted task {}", removed.id);
        self.changed();
        self.calendar(CalendarEvent::Deleted(removed));
        Ok(true)
    }

    pub async fn move_task(&self, id: &TaskId, status: TaskStatus) -> Result<Option<Task>> {
        self.update_task(id, TaskPatch::status(status)).await
    }

    pub async fn toggle_important(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self
            .update_derived(id, |task| Some(TaskPatch::important(!task.important)))
            .await)
    }

    /// Flip completion, moving the task into or out of the `done` column.
    pub async fn toggle_complete(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self
            .update_derived(id, |task| Some(TaskPatch::toggle_complete(task)))
            .await)
    }

    /// Give the listed tasks display order 0, 1, 2, ... in list order.
    /// Tasks already in place and unknown ids are left alone.
    pub async fn reorder_tasks(&self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let reordered = {
            let mut state = self.lock().await;
            let mut reordered = Vec::new();
            for (id, order) in ids.iter().zip(0_i64..) {
                if state
                    .store
                    .task(id)
                    .is_none_or(|task| task.order == order)
                {
                    continue;
                }
                let patch = TaskPatch {
                    order: Some(order),
                    ..TaskPatch::default()
                };
                if let Some(task) = state.store.update_task(id, patch.clone()) {
                    state.queue_update(&task, &patch);
                    reordered.push(task);
                }
            }
            reordered
        };

        if !reordered.is_empty() {
            self.changed();
        }
        Ok(reordered)
    }

    pub async fn add_subtask(&self, task_id: &TaskId, title: &str) -> Result<Option<Task>> {
        let subtask = Subtask::new(required_text(title, "subtask title")?);
        Ok(self
            .update_derived(task_id, |task| Some(TaskPatch::add_subtask(task, subtask)))
            .await)
    }

    pub async fn update_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        mut patch: SubtaskPatch,
    ) -> Result<Option<Task>> {
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(required_text(title, "subtask title")?);
        }
        Ok(self
            .update_derived(task_id, |task| {
                TaskPatch::update_subtask(task, subtask_id, patch)
            })
            .await)
    }

    pub async fn toggle_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<Option<Task>> {
        Ok(self
            .update_derived(task_id, |task| TaskPatch::toggle_subtask(task, subtask_id))
            .await)
    }

    pub async fn delete_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<Option<Task>> {
        Ok(self
            .update_derived(task_id, |task| TaskPatch::delete_subtask(task, subtask_id))
            .await)
    }

    /// Update a task with a patch computed from its current state, under one
    /// lock so concurrent edits cannot interleave.
    async fn update_derived(
        &self,
        id: &TaskId,
        derive: impl FnOnce(&Task) -> Option<TaskPatch>,
    ) -> Option<Task> {
        let task = {
            let mut state = self.lock().await;
            let patch = state.store.task(id).and_then(derive)?;
            let task = state.store.update_task(id, patch.clone())?;
            state.queue_update(&task, &patch);
            task
        };

        self.changed();
        self.calendar(CalendarEvent::Updated(task.clone()));
        Some(task)
    }

    /// Create a project. Without a color the next palette color is used.
    pub async fn add_project(&self, name: &str, color: Option<String>) -> Result<Project> {
        let name = required_text(name, "project name")?;
        let color = normalize_text_option(color);
        validate_color(color.as_deref())?;

        let project = {
            let mut state = self.lock().await;
            let project = state.store.add_project(&name, color);
            state.queue_create(&project.clone().into_snapshot());
            project
        };

        self.changed();
        Ok(project)
    }

    pub async fn update_project(
        &self,
        id: &ProjectId,
        mut patch: ProjectPatch,
    ) -> Result<Option<Project>> {
        if let Some(name) = patch.name.as_deref() {
            patch.name = Some(required_text(name, "project name")?);
        }
        validate_color(patch.color.as_deref())?;

        let project = {
            let mut state = self.lock().await;
            let Some(project) = state.store.update_project(id, patch.clone()) else {
                return Ok(None);
            };
            state.queue_update(&project, &patch);
            project
        };

        self.changed();
        Ok(Some(project))
    }

    /// Delete a project and detach every task from it. Returns how many
    /// tasks were detached, or `None` when the id is unknown.
    pub async fn delete_project(&self, id: &ProjectId) -> Result<Option<usize>> {
        let touched = {
            let mut state = self.lock().await;
            let Some(cascade) = state.store.delete_project(id) else {
                return Ok(None);
            };
            state.queue_touched(&cascade.touched);
            state.queue_delete(EntityKind::Project, cascade.removed.id.as_str());
            cascade.touched
        };

        tracing::debug!("Deleted project {} ({} tasks detached)", id, touched.len());
        self.changed();
        for (task, _) in &touched {
            self.calendar(CalendarEvent::Updated(task.clone()));
        }
        Ok(Some(touched.len()))
    }

    /// Create a tag. A leading `#` is stripped from the name.
    pub async fn add_tag(&self, name: &str, color: Option<String>) -> Result<Tag> {
        let name = required_text(name.trim().trim_start_matches('#'), "tag name")?;
        let color = normalize_text_option(color);
        validate_color(color.as_deref())?;

        let tag = {
            let mut state = self.lock().await;
            let tag = state.store.add_tag(&name, color);
            state.queue_create(&tag.clone().into_snapshot());
            tag
        };

        self.changed();
        Ok(tag)
    }

    pub async fn update_tag(&self, id: &TagId, mut patch: TagPatch) -> Result<Option<Tag>> {
        if let Some(name) = patch.name.as_deref() {
            patch.name = Some(required_text(name.trim().trim_start_matches('#'), "tag name")?);
        }
        validate_color(patch.color.as_deref())?;

        let tag = {
            let mut state = self.lock().await;
            let Some(tag) = state.store.update_tag(id, patch.clone()) else {
                return Ok(None);
            };
            state.queue_update(&tag, &patch);
            tag
        };

        self.changed();
        Ok(Some(tag))
    }

    /// Delete a tag and strip it from every task. Returns how many tasks
    /// were rewritten, or `None` when the id is unknown.
    pub async fn delete_tag(&self, id: &TagId) -> Result<Option<usize>> {
        let touched = {
            let mut state = self.lock().await;
            let Some(cascade) = state.store.delete_tag(id) else {
                return Ok(None);
            };
            state.queue_touched(&cascade.touched);
            state.queue_delete(EntityKind::Tag, cascade.removed.id.as_str());
            cascade.touched
        };

        tracing::debug!("Deleted tag {} ({} tasks rewritten)", id, touched.len());
        self.changed();
        for (task, _) in &touched {
            self.calendar(CalendarEvent::Updated(task.clone()));
        }
        Ok(Some(touched.len()))
    }
}
