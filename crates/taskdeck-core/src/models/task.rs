//! Task model

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::util::now_ms;

use super::id::{ProjectId, SubtaskId, TagId, TaskId};
use super::sync_status::SyncStatus;

/// Workflow column of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Backlog,
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Kanban column order
    pub const ALL: [Self; 4] = [Self::Backlog, Self::Todo, Self::InProgress, Self::Done];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "backlog" => Ok(Self::Backlog),
            "todo" => Ok(Self::Todo),
            "in-progress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(Error::InvalidInput(format!("unknown task status '{other}'"))),
        }
    }
}

/// A checklist item embedded in a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: SubtaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// Independent reminder for this step
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
}

impl Subtask {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SubtaskId::new(),
            title: title.into(),
            completed: false,
            reminder: None,
        }
    }
}

/// A task in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// Owning user
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Important tasks stay visible until completed
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "hour_minute")]
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
    /// Weak reference, cleared when the project is deleted
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Weak references, pruned when a tag is deleted
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Linked external calendar event, passed through untouched
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    /// Display rank
    #[serde(default)]
    pub order: i64,
    /// Creation timestamp (Unix ms)
    #[serde(default)]
    pub created_at: i64,
    #[serde(default = "first_version")]
    pub version: u64,
    /// Last mutation timestamp (Unix ms)
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

const fn first_version() -> u64 {
    1
}

impl Task {
    /// The moment the task falls due: the due time on the due date, or the
    /// end of that day when no time is set. Dates are taken as UTC.
    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let date = self.due_date?;
        let time = self
            .due_time
            .or_else(|| NaiveTime::from_hms_milli_opt(23, 59, 59, 999))?;
        Some(date.and_time(time).and_utc())
    }

    /// Overdue means due strictly before `today` and not completed.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }

    /// Completed subtasks over total subtasks.
    #[must_use]
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }

    pub(crate) fn references_tag(&self, tag_id: &TagId) -> bool {
        self.tags.contains(tag_id)
    }
}

/// Fields supplied by the caller when creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub important: bool,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub reminder: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub tags: Vec<TagId>,
    pub subtasks: Vec<Subtask>,
    pub status: TaskStatus,
    pub calendar_event_id: Option<String>,
}

impl NewTask {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Build the stored task. The store supplies owner and display order.
    pub(crate) fn into_task(self, user_id: &str, order: i64) -> Task {
        let now = now_ms();
        Task {
            id: TaskId::new(),
            user_id: user_id.to_string(),
            title: self.title,
            description: self.description,
            completed: self.completed,
            important: self.important,
            due_date: self.due_date,
            due_time: self.due_time,
            reminder: self.reminder,
            project_id: self.project_id,
            tags: dedup_tags(self.tags),
            subtasks: self.subtasks,
            status: self.status,
            calendar_event_id: self.calendar_event_id,
            order,
            created_at: now,
            version: 1,
            last_modified: now,
            sync_status: SyncStatus::Pending,
        }
    }
}

/// Partial update of a task.
///
/// Nullable fields use `Option<Option<_>>`: `None` leaves the field alone,
/// `Some(None)` clears it. Serializes to the partial JSON body sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "hour_minute::serialize_patch"
    )]
    pub due_time: Option<Option<NaiveTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<ProjectId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl TaskPatch {
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn important(important: bool) -> Self {
        Self {
            important: Some(important),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn subtasks(subtasks: Vec<Subtask>) -> Self {
        Self {
            subtasks: Some(subtasks),
            ..Self::default()
        }
    }

    /// True when the patch sets no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Flip completion. Completing moves the task to `done`; reopening a
    /// `done` task moves it back to `todo`.
    #[must_use]
    pub fn toggle_complete(task: &Task) -> Self {
        let completed = !task.completed;
        let status = if completed {
            TaskStatus::Done
        } else if task.status == TaskStatus::Done {
            TaskStatus::Todo
        } else {
            task.status
        };
        Self {
            completed: Some(completed),
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn add_subtask(task: &Task, subtask: Subtask) -> Self {
        let mut subtasks = task.subtasks.clone();
        subtasks.push(subtask);
        Self::subtasks(subtasks)
    }

    /// `None` when the task has no such subtask.
    #[must_use]
    pub fn update_subtask(task: &Task, subtask_id: &SubtaskId, patch: SubtaskPatch) -> Option<Self> {
        let mut subtasks = task.subtasks.clone();
        let subtask = subtasks.iter_mut().find(|s| &s.id == subtask_id)?;
        patch.apply_to(subtask);
        Some(Self::subtasks(subtasks))
    }

    #[must_use]
    pub fn toggle_subtask(task: &Task, subtask_id: &SubtaskId) -> Option<Self> {
        let completed = !task.subtasks.iter().find(|s| &s.id == subtask_id)?.completed;
        Self::update_subtask(
            task,
            subtask_id,
            SubtaskPatch {
                completed: Some(completed),
                ..SubtaskPatch::default()
            },
        )
    }

    #[must_use]
    pub fn delete_subtask(task: &Task, subtask_id: &SubtaskId) -> Option<Self> {
        if !task.subtasks.iter().any(|s| &s.id == subtask_id) {
            return None;
        }
        let subtasks = task
            .subtasks
            .iter()
            .filter(|s| &s.id != subtask_id)
            .cloned()
            .collect();
        Some(Self::subtasks(subtasks))
    }

    pub(crate) fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(important) = self.important {
            task.important = important;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(due_time) = self.due_time {
            task.due_time = due_time;
        }
        if let Some(reminder) = self.reminder {
            task.reminder = reminder;
        }
        if let Some(project_id) = self.project_id {
            task.project_id = project_id;
        }
        if let Some(tags) = self.tags {
            task.tags = dedup_tags(tags);
        }
        if let Some(subtasks) = self.subtasks {
            task.subtasks = subtasks;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(calendar_event_id) = self.calendar_event_id {
            task.calendar_event_id = calendar_event_id;
        }
        if let Some(order) = self.order {
            task.order = order;
        }
    }
}

/// Partial update of one subtask, applied through its parent task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub reminder: Option<Option<DateTime<Utc>>>,
}

impl SubtaskPatch {
    fn apply_to(self, subtask: &mut Subtask) {
        if let Some(title) = self.title {
            subtask.title = title;
        }
        if let Some(completed) = self.completed {
            subtask.completed = completed;
        }
        if let Some(reminder) = self.reminder {
            subtask.reminder = reminder;
        }
    }
}

/// Tags are an ordered set: keep first occurrence of each id.
fn dedup_tags(tags: Vec<TagId>) -> Vec<TagId> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

/// `HH:MM` wire format for due times; `HH:MM:SS` is accepted on input.
mod hour_minute {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn serialize_patch<S: Serializer>(
        value: &Option<Option<NaiveTime>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize(&(*value).flatten(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_task() -> Task {
        NewTask::titled("Write report").into_task("user@example.com", 0)
    }

    #[test]
    fn test_new_task_starts_at_version_one() {
        let task = sample_task();
        assert_eq!(task.version, 1);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.sync_status, SyncStatus::Pending);
        assert_eq!(task.created_at, task.last_modified);
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
        assert!("later".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_json_shape() {
        let mut task = sample_task();
        task.due_time = NaiveTime::from_hms_opt(9, 30, 0);
        task.status = TaskStatus::InProgress;
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["userId"], "user@example.com");
        assert_eq!(json["dueTime"], "09:30");
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["syncStatus"], "pending");
        assert_eq!(json["projectId"], serde_json::Value::Null);
    }

    #[test]
    fn test_task_deserializes_sparse_remote_row() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","userId":"u","title":"Remote","dueTime":"18:05:00","version":4,"lastModified":99}"#,
        )
        .unwrap();
        assert_eq!(task.due_time, NaiveTime::from_hms_opt(18, 5, 0));
        assert_eq!(task.version, 4);
        assert!(task.tags.is_empty());
        assert_eq!(task.sync_status, SyncStatus::Synced);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = TaskPatch {
            project_id: Some(None),
            important: Some(true),
            ..TaskPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"projectId": null, "important": true}));
    }

    #[test]
    fn test_patch_apply_clears_nullable_fields() {
        let mut task = sample_task();
        task.description = Some("old".to_string());
        let patch = TaskPatch {
            description: Some(None),
            tags: Some(vec![TagId::from("a"), TagId::from("b"), TagId::from("a")]),
            ..TaskPatch::default()
        };
        patch.apply_to(&mut task);
        assert_eq!(task.description, None);
        assert_eq!(task.tags, vec![TagId::from("a"), TagId::from("b")]);
    }

    #[test]
    fn test_overdue_requires_past_date_and_open_task() {
        let mut task = sample_task();
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        task.due_date = NaiveDate::from_ymd_opt(2024, 5, 9);
        assert!(task.is_overdue(today));
        task.completed = true;
        assert!(!task.is_overdue(today));
        task.completed = false;
        task.due_date = Some(today);
        assert!(!task.is_overdue(today));
    }

    #[test]
    fn test_due_at_defaults_to_end_of_day() {
        let mut task = sample_task();
        task.due_date = NaiveDate::from_ymd_opt(2024, 5, 10);
        let due = task.due_at().unwrap();
        assert_eq!(due.format("%H:%M:%S").to_string(), "23:59:59");
        task.due_time = NaiveTime::from_hms_opt(8, 0, 0);
        assert_eq!(task.due_at().unwrap().format("%H:%M").to_string(), "08:00");
    }
}
