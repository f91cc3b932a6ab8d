use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] taskdeck_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No task title provided")]
    EmptyTitle,
    #[error("Task ID cannot be empty")]
    EmptyTaskId,
    #[error("Task not found for id/prefix: {0}")]
    TaskNotFound(String),
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Tag not found: {0}")]
    TagNotFound(String),
    #[error("Checklist item not found: {0}")]
    SubtaskNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Remote is not configured. Run `taskdeck config set api-url <URL>` and `taskdeck config set user <ID>`, or set TASKDECK_API_URL and TASKDECK_USER."
    )]
    NotConfigured,
}
