use taskdeck_core::NewTask;

use crate::cli::AddArgs;
use crate::commands::common::{resolve_project, resolve_tags, resolve_title, Session};
use crate::error::CliError;

pub async fn run_add(session: &Session, args: AddArgs) -> Result<(), CliError> {
    let title = resolve_title(&args.title)?;

    let (project_id, tags) = session
        .engine
        .read(|store| {
            let project_id = args
                .project
                .as_deref()
                .map(|query| resolve_project(store, query).map(|project| project.id))
                .transpose()?;
            Ok::<_, CliError>((project_id, resolve_tags(store, &args.tags)?))
        })
        .await?;

    let task = session
        .engine
        .add_task(NewTask {
            description: args.description,
            important: args.important,
            due_date: args.due,
            due_time: args.at,
            project_id,
            tags,
            status: args.status.unwrap_or_default(),
            ..NewTask::titled(title)
        })
        .await?;

    println!("{}", task.id);
    Ok(())
}
