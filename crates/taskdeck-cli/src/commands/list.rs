use chrono::Local;
use taskdeck_core::{TaskFilter, TaskStatus};

use crate::cli::ListArgs;
use crate::commands::common::{
    format_task_lines, resolve_project, resolve_tags, task_to_list_item, Session, TaskListItem,
};
use crate::error::CliError;

pub async fn run_list(session: &Session, args: ListArgs) -> Result<(), CliError> {
    let today = Local::now().date_naive();

    session
        .engine
        .read(|store| {
            let filter = TaskFilter {
                project_id: args
                    .project
                    .as_deref()
                    .map(|query| resolve_project(store, query).map(|project| project.id))
                    .transpose()?,
                tags: resolve_tags(store, &args.tags)?,
                status: args.status,
                show_completed: args.all || args.status == Some(TaskStatus::Done),
                show_important_only: args.important,
                show_overdue_only: args.overdue,
                search_query: args.search.clone().unwrap_or_default(),
            };
            let tasks = store.filtered(&filter, today);

            if args.json {
                let items = tasks
                    .iter()
                    .map(|task| task_to_list_item(task, store))
                    .collect::<Vec<TaskListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }

            if args.board {
                for (status, column) in store.kanban() {
                    let column = column
                        .into_iter()
                        .filter(|task| filter.matches(task, today))
                        .collect::<Vec<_>>();
                    println!("== {status} ({}) ==", column.len());
                    for line in format_task_lines(&column, store) {
                        println!("{line}");
                    }
                }
                return Ok(());
            }

            if tasks.is_empty() {
                println!("No tasks.");
            }
            for line in format_task_lines(&tasks, store) {
                println!("{line}");
            }
            Ok(())
        })
        .await
}
