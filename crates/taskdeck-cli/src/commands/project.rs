use serde::Serialize;
use taskdeck_core::models::ProjectPatch;

use crate::cli::ProjectCommands;
use crate::commands::common::{resolve_project, Session};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListItem {
    pub id: String,
    pub name: String,
    pub color: String,
    pub open_tasks: usize,
    pub sync_status: String,
}

pub async fn run_project(session: &Session, command: ProjectCommands) -> Result<(), CliError> {
    match command {
        ProjectCommands::List { json } => {
            let items = session
                .engine
                .read(|store| {
                    store
                        .projects()
                        .iter()
                        .map(|project| ProjectListItem {
                            id: project.id.to_string(),
                            name: project.name.clone(),
                            color: project.color.clone(),
                            open_tasks: store
                                .tasks_by_project(Some(&project.id))
                                .iter()
                                .filter(|task| !task.completed)
                                .count(),
                            sync_status: project.sync_status.to_string(),
                        })
                        .collect::<Vec<_>>()
                })
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No projects.");
            } else {
                for item in items {
                    println!("{:<40}  {}  {} open", item.name, item.color, item.open_tasks);
                }
            }
        }
        ProjectCommands::Add { name, color } => {
            let project = session.engine.add_project(&name, color).await?;
            println!("{}", project.id);
        }
        ProjectCommands::Edit {
            project,
            name,
            color,
        } => {
            let found = session
                .engine
                .read(|store| resolve_project(store, &project))
                .await?;
            let updated = session
                .engine
                .update_project(
                    &found.id,
                    ProjectPatch {
                        name,
                        color,
                        ..ProjectPatch::default()
                    },
                )
                .await?
                .ok_or_else(|| CliError::ProjectNotFound(project.clone()))?;
            println!("{}", updated.id);
        }
        ProjectCommands::Delete { project } => {
            let found = session
                .engine
                .read(|store| resolve_project(store, &project))
                .await?;
            let detached = session
                .engine
                .delete_project(&found.id)
                .await?
                .ok_or_else(|| CliError::ProjectNotFound(project.clone()))?;
            println!("{} ({detached} task(s) detached)", found.id);
        }
    }
    Ok(())
}
