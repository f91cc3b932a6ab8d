use crate::commands::common::{resolve_task, Session};
use crate::error::CliError;

pub async fn run_delete(session: &Session, id: &str) -> Result<(), CliError> {
    let task = session.engine.read(|store| resolve_task(store, id)).await?;

    if !session.engine.delete_task(&task.id).await? {
        return Err(CliError::TaskNotFound(id.to_string()));
    }
    println!("{}", task.id);
    Ok(())
}
