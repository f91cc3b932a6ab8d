use taskdeck_core::{ProjectId, TagId, TaskPatch};

use crate::cli::EditArgs;
use crate::commands::common::{normalize_text, resolve_project, resolve_tags, resolve_task, Session};
use crate::error::CliError;

pub async fn run_edit(session: &Session, args: EditArgs) -> Result<(), CliError> {
    let (task, patch) = session
        .engine
        .read(|store| {
            let task = resolve_task(store, &args.id)?;
            let patch = edit_patch(
                &args,
                |query| resolve_project(store, query).map(|project| project.id),
                |queries| resolve_tags(store, queries),
            )?;
            Ok::<_, CliError>((task, patch))
        })
        .await?;

    if patch.is_empty() {
        println!("{}", task.id);
        return Ok(());
    }

    let updated = session
        .engine
        .update_task(&task.id, patch)
        .await?
        .ok_or_else(|| CliError::TaskNotFound(task.id.to_string()))?;
    println!("{}", updated.id);
    Ok(())
}

/// Translate edit flags into a task patch. An empty `--description` or
/// `--project` clears the field.
pub fn edit_patch<P, T>(args: &EditArgs, project: P, tags: T) -> Result<TaskPatch, CliError>
where
    P: FnOnce(&str) -> Result<ProjectId, CliError>,
    T: FnOnce(&[String]) -> Result<Vec<TagId>, CliError>,
{
    let mut patch = TaskPatch::default();

    if let Some(title) = args.title.as_deref() {
        patch.title = Some(normalize_text(title).ok_or(CliError::EmptyTitle)?);
    }
    if let Some(description) = args.description.as_deref() {
        patch.description = Some(normalize_text(description));
    }
    if let Some(query) = args.project.as_deref() {
        patch.project_id = Some(match normalize_text(query) {
            Some(query) => Some(project(&query)?),
            None => None,
        });
    }
    if args.clear_tags {
        patch.tags = Some(Vec::new());
    } else if !args.tags.is_empty() {
        patch.tags = Some(tags(&args.tags)?);
    }
    if args.no_due {
        patch.due_date = Some(None);
        patch.due_time = Some(None);
    } else {
        if let Some(due) = args.due {
            patch.due_date = Some(Some(due));
        }
        if let Some(at) = args.at {
            patch.due_time = Some(Some(at));
        }
    }

    Ok(patch)
}
