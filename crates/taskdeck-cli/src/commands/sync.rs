use serde::Serialize;
use taskdeck_core::sync::{DroppedChange, FlushReport};
use taskdeck_core::{ConflictChoice, SyncReport};

use crate::commands::common::{
    entity_label, format_sync_conflict_lines, format_sync_timestamp, sync_conflict_to_item,
    Session, SyncConflictItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub pushed: usize,
    pub failed: usize,
    pub dropped: usize,
    #[serde(flatten)]
    pub report: SyncReport,
}

pub async fn run_sync(session: &Session, as_json: bool) -> Result<(), CliError> {
    let flush = session.engine.flush_pending().await;
    let report = session.engine.report().await;

    if as_json {
        let summary = SyncSummary {
            pushed: flush.pushed,
            failed: flush.failed,
            dropped: flush.dropped,
            report,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for line in format_sync_report(&flush, &report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report(flush: &FlushReport, report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sync {}: pushed {}, failed {}, dropped {}, {} pending",
        report.state, flush.pushed, flush.failed, flush.dropped, report.pending_count
    )];
    if report.conflict_count > 0 {
        lines.push(format!(
            "{} open conflict(s); see `taskdeck conflicts`",
            report.conflict_count
        ));
    }
    if let Some(error) = report.last_error.as_deref() {
        lines.push(format!("Last error: {error}"));
    }
    lines
}

pub async fn run_conflicts(session: &Session, as_json: bool) -> Result<(), CliError> {
    let conflicts = session.engine.conflicts().await;

    if as_json {
        let items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    session: &Session,
    id: &str,
    keep: ConflictChoice,
) -> Result<(), CliError> {
    let written = session.engine.resolve_conflict(id.trim(), keep).await?;
    println!(
        "{} {} kept {keep} copy \"{}\" (v{})",
        written.kind(),
        written.id(),
        entity_label(&written),
        written.version()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusItem {
    #[serde(flatten)]
    pub report: SyncReport,
    pub pending: Vec<String>,
    pub dropped: Vec<DroppedChange>,
}

pub async fn run_status(session: &Session, as_json: bool) -> Result<(), CliError> {
    let report = session.engine.report().await;
    let pending = session
        .engine
        .pending_changes()
        .await
        .iter()
        .map(|change| {
            let retries = if change.retry_count > 0 {
                format!(" ({} failed attempt(s))", change.retry_count)
            } else {
                String::new()
            };
            format!("{}{retries}", change.describe())
        })
        .collect::<Vec<_>>();
    let dropped = session.engine.dropped_changes().await;

    if as_json {
        let status = StatusItem {
            report,
            pending,
            dropped,
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("State: {}", report.state);
    if let Some(at) = report.last_synced_at {
        println!("Last synced: {}", format_sync_timestamp(at));
    }
    if let Some(error) = report.last_error.as_deref() {
        println!("Last error: {error}");
    }
    println!("Pending changes: {}", report.pending_count);
    for line in &pending {
        println!("  {line}");
    }
    println!("Open conflicts: {}", report.conflict_count);
    if !dropped.is_empty() {
        println!("Dropped changes: {}", dropped.len());
        for entry in &dropped {
            println!(
                "  {}  {}: {}",
                format_sync_timestamp(entry.dropped_at),
                entry.change.describe(),
                entry.error
            );
        }
    }
    Ok(())
}
