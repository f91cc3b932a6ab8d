use std::path::PathBuf;

use clap::Parser;
use pretty_assertions::assert_eq;
use taskdeck_core::{
    EntityKind, EntityStore, NewTask, RemoteConfig, SyncState, TaskPatch, TaskStatus,
};

use crate::cli::{Cli, Commands, ConfigKey, EditArgs};
use crate::commands::common::{
    format_relative_time, format_sync_timestamp, format_task_line, normalize_task_identifier,
    open_local_session, resolve_project, resolve_tag, resolve_task, resolve_title, short_id,
    truncate,
};
use crate::commands::config::apply_setting;
use crate::commands::edit::edit_patch;
use crate::commands::subtask::resolve_subtask;
use crate::commands::sync::format_sync_report;
use crate::config_profiles::{CliProfilesConfig, Connection};
use crate::error::CliError;

fn store_with_tasks(ids: &[&str]) -> EntityStore {
    let mut store = EntityStore::new("user-1");
    for id in ids {
        let task = store.add_task(NewTask::titled(format!("Task {id}")));
        store.reassign_id(EntityKind::Task, task.id.as_str(), id);
    }
    store
}

#[test]
fn normalize_task_identifier_rejects_blank() {
    assert_eq!(normalize_task_identifier("  abc ").unwrap(), "abc");
    assert!(matches!(
        normalize_task_identifier("   "),
        Err(CliError::EmptyTaskId)
    ));
}

#[test]
fn resolve_title_joins_words() {
    let parts = vec!["Buy".to_string(), " milk ".to_string()];
    assert_eq!(resolve_title(&parts).unwrap(), "Buy  milk");
}

#[test]
fn truncate_adds_ellipsis() {
    assert_eq!(
        truncate("This is a very long sentence that should be shortened", 20),
        "This is a very lo..."
    );
    assert_eq!(truncate("short", 20), "short");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn resolve_task_accepts_exact_id_and_unique_prefix() {
    let store = store_with_tasks(&["alpha-1", "alpha-2", "beta-1"]);

    assert_eq!(resolve_task(&store, "alpha-1").unwrap().id.as_str(), "alpha-1");
    assert_eq!(resolve_task(&store, "beta").unwrap().id.as_str(), "beta-1");
    assert!(matches!(
        resolve_task(&store, "alpha"),
        Err(CliError::AmbiguousId(message)) if message.contains("alpha-1")
    ));
    assert!(matches!(
        resolve_task(&store, "gamma"),
        Err(CliError::TaskNotFound(_))
    ));
}

#[test]
fn resolve_project_and_tag_by_name() {
    let mut store = EntityStore::new("user-1");
    let project = store.add_project("Garden", None);
    let tag = store.add_tag("errand", None);

    assert_eq!(resolve_project(&store, "garden").unwrap().id, project.id);
    assert_eq!(resolve_tag(&store, "#Errand").unwrap().id, tag.id);
    assert!(matches!(
        resolve_tag(&store, "#missing"),
        Err(CliError::TagNotFound(name)) if name == "missing"
    ));
}

#[test]
fn task_line_shows_flags_due_and_tags() {
    let mut store = EntityStore::new("user-1");
    let tag = store.add_tag("home", None);
    let task = store.add_task(NewTask {
        important: true,
        due_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1),
        tags: vec![tag.id],
        ..NewTask::titled("Fix the sink")
    });

    let line = format_task_line(&task, &store);
    assert!(line.starts_with(&short_id(task.id.as_str())));
    assert!(line.contains("[ ] * Fix the sink"));
    assert!(line.contains("due 2026-03-01"));
    assert!(line.ends_with("#home"));
}

#[test]
fn edit_patch_clears_with_empty_values() {
    let args = EditArgs {
        id: "abc".to_string(),
        description: Some("  ".to_string()),
        project: Some(String::new()),
        clear_tags: true,
        no_due: true,
        ..EditArgs::default()
    };

    let patch = edit_patch(
        &args,
        |_| unreachable!("empty project clears"),
        |_| unreachable!("tags are cleared"),
    )
    .unwrap();

    assert_eq!(
        patch,
        TaskPatch {
            description: Some(None),
            project_id: Some(None),
            tags: Some(Vec::new()),
            due_date: Some(None),
            due_time: Some(None),
            ..TaskPatch::default()
        }
    );
}

#[test]
fn edit_patch_rejects_blank_title() {
    let args = EditArgs {
        id: "abc".to_string(),
        title: Some(" ".to_string()),
        ..EditArgs::default()
    };
    let result = edit_patch(&args, |_| unreachable!(), |_| unreachable!());
    assert!(matches!(result, Err(CliError::EmptyTitle)));
}

#[test]
fn subtasks_resolve_by_position_or_id() {
    let mut store = EntityStore::new("user-1");
    let task = store.add_task(NewTask::titled("Pack"));
    let task = store
        .update_task(
            &task.id,
            TaskPatch::subtasks(vec![
                taskdeck_core::models::Subtask::new("Socks"),
                taskdeck_core::models::Subtask::new("Charger"),
            ]),
        )
        .unwrap();

    let second = task.subtasks[1].id.clone();
    assert_eq!(resolve_subtask(&task, "2").unwrap(), second);
    assert_eq!(resolve_subtask(&task, second.as_str()).unwrap(), second);
    assert!(matches!(
        resolve_subtask(&task, "3"),
        Err(CliError::SubtaskNotFound(_))
    ));
    assert!(resolve_subtask(&task, "0").is_err());
}

#[test]
fn apply_setting_validates_api_url() {
    let mut config = CliProfilesConfig::default();
    assert!(matches!(
        apply_setting(
            &mut config,
            "default",
            ConfigKey::ApiUrl,
            Some("ftp://x".to_string())
        ),
        Err(CliError::Config(_))
    ));

    apply_setting(
        &mut config,
        "default",
        ConfigKey::ApiUrl,
        Some("https://tasks.example.com".to_string()),
    )
    .unwrap();
    apply_setting(&mut config, "default", ConfigKey::User, Some("me".to_string())).unwrap();
    apply_setting(&mut config, "default", ConfigKey::User, None).unwrap();

    let profile = config.profile("default").unwrap();
    assert_eq!(
        profile.api_url.as_deref(),
        Some("https://tasks.example.com")
    );
    assert_eq!(profile.user, None);
}

#[test]
fn sync_report_mentions_conflicts_and_errors() {
    let flush = taskdeck_core::sync::FlushReport {
        pushed: 2,
        failed: 1,
        ..Default::default()
    };
    let report = taskdeck_core::SyncReport {
        state: SyncState::Error,
        pending_count: 1,
        conflict_count: 1,
        last_error: Some("Remote API error: down (503)".to_string()),
        ..Default::default()
    };

    let lines = format_sync_report(&flush, &report);
    assert_eq!(
        lines[0],
        "Sync error: pushed 2, failed 1, dropped 0, 1 pending"
    );
    assert!(lines.iter().any(|line| line.contains("taskdeck conflicts")));
    assert!(lines.iter().any(|line| line.contains("down (503)")));
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "taskdeck",
        "move",
        "abc",
        "in-progress",
        "--user",
        "user-1",
        "--state",
        "/tmp/session.json",
    ])
    .unwrap();

    assert_eq!(cli.user.as_deref(), Some("user-1"));
    assert_eq!(cli.state, Some(PathBuf::from("/tmp/session.json")));
    assert!(matches!(
        cli.command,
        Commands::Move { id, status: TaskStatus::InProgress } if id == "abc"
    ));
}

#[test]
fn cli_rejects_unknown_status() {
    assert!(Cli::try_parse_from(["taskdeck", "move", "abc", "someday"]).is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn local_session_round_trips_through_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let connection = Connection {
        profile: "default".to_string(),
        remote: RemoteConfig::new("http://127.0.0.1:9", None).unwrap(),
        user: "user-1".to_string(),
        snapshot_path: dir.path().join("session.json"),
    };

    let session = open_local_session(&connection).await.unwrap();
    let task = session
        .engine
        .add_task(NewTask::titled("Offline thought"))
        .await
        .unwrap();
    session.save().await.unwrap();

    let reopened = open_local_session(&connection).await.unwrap();
    assert_eq!(reopened.engine.pending_count().await, 1);
    assert_eq!(
        reopened.engine.task(&task.id).await.unwrap().title,
        "Offline thought"
    );
}
