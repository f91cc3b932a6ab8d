use taskdeck_core::models::SubtaskId;
use taskdeck_core::Task;

use crate::cli::SubtaskCommands;
use crate::commands::common::{resolve_task, resolve_title, Session};
use crate::error::CliError;

pub async fn run_subtask(session: &Session, command: SubtaskCommands) -> Result<(), CliError> {
    match command {
        SubtaskCommands::Add { task, title } => {
            let title = resolve_title(&title)?;
            let task = session.engine.read(|store| resolve_task(store, &task)).await?;
            let updated = session
                .engine
                .add_subtask(&task.id, &title)
                .await?
                .ok_or_else(|| CliError::TaskNotFound(task.id.to_string()))?;
            if let Some(subtask) = updated.subtasks.last() {
                println!("{}", subtask.id);
            }
        }
        SubtaskCommands::Done { task, item } => {
            let task = session.engine.read(|store| resolve_task(store, &task)).await?;
            let subtask_id = resolve_subtask(&task, &item)?;
            let updated = session
                .engine
                .toggle_subtask(&task.id, &subtask_id)
                .await?
                .ok_or_else(|| CliError::SubtaskNotFound(item.clone()))?;
            let (done, total) = updated.subtask_progress();
            println!("{} {done}/{total}", updated.id);
        }
        SubtaskCommands::Delete { task, item } => {
            let task = session.engine.read(|store| resolve_task(store, &task)).await?;
            let subtask_id = resolve_subtask(&task, &item)?;
            session
                .engine
                .delete_subtask(&task.id, &subtask_id)
                .await?
                .ok_or_else(|| CliError::SubtaskNotFound(item.clone()))?;
            println!("{subtask_id}");
        }
    }
    Ok(())
}

/// Checklist items are addressed by 1-based position or by id.
pub fn resolve_subtask(task: &Task, item: &str) -> Result<SubtaskId, CliError> {
    let item = item.trim();
    let by_position = item
        .parse::<usize>()
        .ok()
        .and_then(|position| position.checked_sub(1))
        .and_then(|index| task.subtasks.get(index));

    by_position
        .or_else(|| {
            task.subtasks
                .iter()
                .find(|subtask| subtask.id.as_str() == item)
        })
        .map(|subtask| subtask.id.clone())
        .ok_or_else(|| CliError::SubtaskNotFound(item.to_string()))
}
