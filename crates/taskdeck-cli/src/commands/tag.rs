use serde::Serialize;

use crate::cli::TagCommands;
use crate::commands::common::{resolve_tag, Session};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagListItem {
    pub id: String,
    pub name: String,
    pub color: String,
    pub tasks: usize,
}

pub async fn run_tag(session: &Session, command: TagCommands) -> Result<(), CliError> {
    match command {
        TagCommands::List { json } => {
            let items = session
                .engine
                .read(|store| {
                    store
                        .tags()
                        .iter()
                        .map(|tag| TagListItem {
                            id: tag.id.to_string(),
                            name: tag.name.clone(),
                            color: tag.color.clone(),
                            tasks: store.tasks_by_tag(&tag.id).len(),
                        })
                        .collect::<Vec<_>>()
                })
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No tags.");
            } else {
                for item in items {
                    println!("#{:<30}  {}  {} task(s)", item.name, item.color, item.tasks);
                }
            }
        }
        TagCommands::Add { name, color } => {
            let tag = session.engine.add_tag(&name, color).await?;
            println!("{}", tag.id);
        }
        TagCommands::Delete { tag } => {
            let found = session.engine.read(|store| resolve_tag(store, &tag)).await?;
            let rewritten = session
                .engine
                .delete_tag(&found.id)
                .await?
                .ok_or_else(|| CliError::TagNotFound(tag.clone()))?;
            println!("{} ({rewritten} task(s) updated)", found.id);
        }
    }
    Ok(())
}
