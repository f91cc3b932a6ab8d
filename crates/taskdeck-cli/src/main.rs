//! taskdeck CLI - tasks, projects and tags from the command line
//!
//! Every command works against a local snapshot of the session, pulls
//! remote changes first and pushes queued local changes before exiting.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_local_session, open_session};
use crate::config_profiles::{CliProfilesConfig, Connection, ConnectionOverrides};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["taskdeck=info", "taskdeck_core=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { command } = cli.command {
        return commands::config::run_config(command, cli.profile.as_deref());
    }

    let config = CliProfilesConfig::load()?;
    let connection = Connection::resolve(
        &config,
        ConnectionOverrides {
            profile: cli.profile,
            api_url: cli.api_url,
            user: cli.user,
            token: cli.token,
            state: cli.state,
        },
        |key| std::env::var(key).ok(),
    )?;

    if let Commands::Status { json } = cli.command {
        let session = open_local_session(&connection).await?;
        return commands::sync::run_status(&session, json).await;
    }

    let session = open_session(&connection).await?;
    let result = match cli.command {
        Commands::List(args) => commands::list::run_list(&session, args).await,
        Commands::Add(args) => commands::add::run_add(&session, args).await,
        Commands::Edit(args) => commands::edit::run_edit(&session, args).await,
        Commands::Done { id } => commands::task_state::run_done(&session, &id).await,
        Commands::Star { id } => commands::task_state::run_star(&session, &id).await,
        Commands::Move { id, status } => {
            commands::task_state::run_move(&session, &id, status).await
        }
        Commands::Delete { id } => commands::delete::run_delete(&session, &id).await,
        Commands::Subtask { command } => commands::subtask::run_subtask(&session, command).await,
        Commands::Project { command } => commands::project::run_project(&session, command).await,
        Commands::Tag { command } => commands::tag::run_tag(&session, command).await,
        Commands::Sync { json } => commands::sync::run_sync(&session, json).await,
        Commands::Watch => commands::watch::run_watch(&session).await,
        Commands::Conflicts { json } => commands::sync::run_conflicts(&session, json).await,
        Commands::Resolve { id, keep } => commands::sync::run_resolve(&session, &id, keep).await,
        Commands::Status { .. } | Commands::Config { .. } => Ok(()),
    };

    // Local edits are kept even when the command itself failed.
    session.finish().await?;
    result
}

#[cfg(test)]
mod tests;
