use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use taskdeck_core::remote::HttpRemote;
use taskdeck_core::sync::{FlushReport, PullOutcome};
use taskdeck_core::{
    EntitySnapshot, EntityStore, Project, SessionSnapshot, SyncConflict, SyncEngine,
    SyncSettings, Tag, TagId, Task,
};

use crate::config_profiles::Connection;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;
const TITLE_WIDTH: usize = 40;

/// A restored session: the engine plus where its snapshot lives
pub struct Session {
    pub engine: SyncEngine,
    snapshot_path: PathBuf,
}

/// Restore the saved snapshot and run the initial load. A failed load only
/// warns, so commands keep working offline against the restored state.
pub async fn open_session(connection: &Connection) -> Result<Session, CliError> {
    let session = open_local_session(connection).await?;
    if let PullOutcome::Failed(message) = session.engine.load_from_remote(true).await {
        tracing::warn!("Working offline: {}", message);
    }
    Ok(session)
}

/// Restore the saved snapshot without contacting the remote.
pub async fn open_local_session(connection: &Connection) -> Result<Session, CliError> {
    let remote = HttpRemote::new(&connection.remote)?;
    let settings = SyncSettings::from_env()?;
    let engine = SyncEngine::new(connection.user.clone(), Arc::new(remote), settings);

    if let Some(snapshot) = SessionSnapshot::load(&connection.snapshot_path)? {
        engine.restore(snapshot).await?;
    }
    tracing::debug!(
        "Opened session for {} (profile '{}')",
        connection.user,
        connection.profile
    );

    Ok(Session {
        engine,
        snapshot_path: connection.snapshot_path.clone(),
    })
}

impl Session {
    /// Push queued changes and save the snapshot, whatever the push outcome.
    pub async fn finish(self) -> Result<FlushReport, CliError> {
        let report = self.engine.flush_pending().await;
        if report.dropped > 0 {
            eprintln!(
                "Warning: {} change(s) could not be synced and were dropped",
                report.dropped
            );
        } else if report.remaining > 0 {
            eprintln!(
                "{} change(s) queued; they will be pushed on the next run",
                report.remaining
            );
        }
        self.save().await?;
        Ok(report)
    }

    pub async fn save(&self) -> Result<(), CliError> {
        self.engine.to_snapshot().await.save(&self.snapshot_path)?;
        Ok(())
    }
}

pub fn normalize_task_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyTaskId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Find a task by full id or unique id prefix.
pub fn resolve_task(store: &EntityStore, query: &str) -> Result<Task, CliError> {
    let query = normalize_task_identifier(query)?;
    if let Some(task) = store.tasks().iter().find(|task| task.id.as_str() == query) {
        return Ok(task.clone());
    }

    let matching = store
        .tasks()
        .iter()
        .filter(|task| task.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::TaskNotFound(query)),
        [task] => Ok((*task).clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|task| short_id(task.id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Find a project by id, case-insensitive name, or unique id prefix.
pub fn resolve_project(store: &EntityStore, query: &str) -> Result<Project, CliError> {
    let query = query.trim();
    store
        .projects()
        .iter()
        .find(|project| project.id.as_str() == query)
        .or_else(|| {
            store
                .projects()
                .iter()
                .find(|project| project.name.eq_ignore_ascii_case(query))
        })
        .or_else(|| unique_prefix(store.projects(), query, |project| project.id.as_str()))
        .cloned()
        .ok_or_else(|| CliError::ProjectNotFound(query.to_string()))
}

/// Find a tag by id or name; a leading `#` is ignored.
pub fn resolve_tag(store: &EntityStore, query: &str) -> Result<Tag, CliError> {
    let query = query.trim().trim_start_matches('#');
    store
        .tags()
        .iter()
        .find(|tag| tag.id.as_str() == query)
        .or_else(|| {
            store
                .tags()
                .iter()
                .find(|tag| tag.name.eq_ignore_ascii_case(query))
        })
        .or_else(|| unique_prefix(store.tags(), query, |tag| tag.id.as_str()))
        .cloned()
        .ok_or_else(|| CliError::TagNotFound(query.to_string()))
}

pub fn resolve_tags(store: &EntityStore, queries: &[String]) -> Result<Vec<TagId>, CliError> {
    queries
        .iter()
        .map(|query| resolve_tag(store, query).map(|tag| tag.id))
        .collect()
}

fn unique_prefix<'a, T>(items: &'a [T], prefix: &str, id: impl Fn(&T) -> &str) -> Option<&'a T> {
    if prefix.is_empty() {
        return None;
    }
    let mut matching = items.iter().filter(|item| id(item).starts_with(prefix));
    let first = matching.next()?;
    matching.next().is_none().then_some(first)
}

pub fn resolve_title(parts: &[String]) -> Result<String, CliError> {
    if let Some(title) = normalize_text(&parts.join(" ")) {
        return Ok(title);
    }
    if let Some(title) = read_piped_stdin()? {
        return Ok(title);
    }
    Err(CliError::EmptyTitle)
}

pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(buffer.lines().next().and_then(normalize_text))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListItem {
    pub id: String,
    pub title: String,
    pub status: String,
    pub completed: bool,
    pub important: bool,
    pub due: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub subtasks_done: usize,
    pub subtasks_total: usize,
    pub version: u64,
    pub sync_status: String,
    pub last_modified: i64,
    pub relative_time: String,
}

pub fn task_to_list_item(task: &Task, store: &EntityStore) -> TaskListItem {
    let now_ms = Utc::now().timestamp_millis();
    let (subtasks_done, subtasks_total) = task.subtask_progress();

    TaskListItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        status: task.status.to_string(),
        completed: task.completed,
        important: task.important,
        due: format_due(task),
        project: project_name(task, store),
        tags: tag_names(task, store),
        subtasks_done,
        subtasks_total,
        version: task.version,
        sync_status: task.sync_status.to_string(),
        last_modified: task.last_modified,
        relative_time: format_relative_time(task.last_modified, now_ms),
    }
}

pub fn format_task_lines(tasks: &[&Task], store: &EntityStore) -> Vec<String> {
    tasks
        .iter()
        .map(|task| format_task_line(task, store))
        .collect()
}

pub fn format_task_line(task: &Task, store: &EntityStore) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let star = if task.important { "*" } else { " " };
    let title = truncate(&task.title, TITLE_WIDTH);
    let mut line = format!(
        "{:<13}  {check} {star} {title:<40}",
        short_id(task.id.as_str())
    );

    if let Some(due) = format_due(task) {
        line.push_str(&format!("  due {due}"));
    }
    let (done, total) = task.subtask_progress();
    if total > 0 {
        line.push_str(&format!("  ({done}/{total})"));
    }
    if let Some(project) = project_name(task, store) {
        line.push_str(&format!("  @{project}"));
    }
    let tags = render_tags(task, store);
    if !tags.is_empty() {
        line.push_str("  ");
        line.push_str(&tags);
    }
    line.trim_end().to_string()
}

pub fn format_due(task: &Task) -> Option<String> {
    let date = task.due_date?;
    Some(task.due_time.map_or_else(
        || date.to_string(),
        |time| format!("{date} {}", time.format("%H:%M")),
    ))
}

fn project_name(task: &Task, store: &EntityStore) -> Option<String> {
    let project_id = task.project_id.as_ref()?;
    store.project(project_id).map(|project| project.name.clone())
}

fn tag_names(task: &Task, store: &EntityStore) -> Vec<String> {
    let mut names = task
        .tags
        .iter()
        .filter_map(|tag_id| store.tag(tag_id))
        .map(|tag| tag.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names
}

pub fn render_tags(task: &Task, store: &EntityStore) -> String {
    tag_names(task, store)
        .into_iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflictItem {
    pub item_type: String,
    pub item_id: String,
    pub local_label: String,
    pub remote_label: String,
    pub local_version: u64,
    pub remote_version: u64,
    pub local_modified: i64,
    pub remote_modified: i64,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        item_type: conflict.item_type.to_string(),
        item_id: conflict.item_id.clone(),
        local_label: entity_label(&conflict.local_version),
        remote_label: entity_label(&conflict.remote_version),
        local_version: conflict.local_version.version(),
        remote_version: conflict.remote_version.version(),
        local_modified: conflict.local_version.last_modified(),
        remote_modified: conflict.remote_version.last_modified(),
        detected_at: conflict.timestamp,
        detected_at_iso: format_sync_timestamp(conflict.timestamp),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<7}  {}  local=\"{}\" remote=\"{}\"",
                format_sync_timestamp(conflict.timestamp),
                conflict.item_type,
                conflict.item_id,
                truncate(&entity_label(&conflict.local_version), 30),
                truncate(&entity_label(&conflict.remote_version), 30)
            )
        })
        .collect()
}

pub fn entity_label(entity: &EntitySnapshot) -> String {
    match entity {
        EntitySnapshot::Task(task) => task.title.clone(),
        EntitySnapshot::Project(project) => project.name.clone(),
        EntitySnapshot::Tag(tag) => format!("#{}", tag.name),
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
