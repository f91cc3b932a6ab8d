use taskdeck_core::{Task, TaskStatus};

use crate::commands::common::{resolve_task, Session};
use crate::error::CliError;

pub async fn run_done(session: &Session, id: &str) -> Result<(), CliError> {
    let task = session.engine.read(|store| resolve_task(store, id)).await?;
    let updated = expect_task(session.engine.toggle_complete(&task.id).await?, &task)?;

    let state = if updated.completed { "done" } else { "reopened" };
    println!("{} {state}", updated.id);
    Ok(())
}

pub async fn run_star(session: &Session, id: &str) -> Result<(), CliError> {
    let task = session.engine.read(|store| resolve_task(store, id)).await?;
    let updated = expect_task(session.engine.toggle_important(&task.id).await?, &task)?;

    let state = if updated.important { "starred" } else { "unstarred" };
    println!("{} {state}", updated.id);
    Ok(())
}

pub async fn run_move(session: &Session, id: &str, status: TaskStatus) -> Result<(), CliError> {
    let task = session.engine.read(|store| resolve_task(store, id)).await?;
    let updated = expect_task(session.engine.move_task(&task.id, status).await?, &task)?;

    println!("{} {}", updated.id, updated.status);
    Ok(())
}

fn expect_task(updated: Option<Task>, original: &Task) -> Result<Task, CliError> {
    updated.ok_or_else(|| CliError::TaskNotFound(original.id.to_string()))
}
