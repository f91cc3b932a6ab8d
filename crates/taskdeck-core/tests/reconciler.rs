use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use taskdeck_core::remote::{MemoryRemote, RemotePersistence};
use taskdeck_core::{
    EntityKind, EntityStore, NewTask, Reconciler, SessionPhase, SyncEngine, SyncSettings,
    TaskPatch,
};

const USER: &str = "user-1";

fn engine(remote: &MemoryRemote) -> SyncEngine {
    let shared: Arc<dyn RemotePersistence> = Arc::new(remote.clone());
    SyncEngine::new(USER, shared, SyncSettings::default())
}

/// Let spawned flushes and pulls run to completion on the paused runtime.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn creates(remote: &MemoryRemote) -> usize {
    remote
        .calls()
        .await
        .iter()
        .filter(|call| call.starts_with("create"))
        .count()
}

#[tokio::test(start_paused = true)]
async fn reaches_steady_after_initial_load() {
    let remote = MemoryRemote::new();
    let reconciler = Reconciler::start(engine(&remote));

    assert_eq!(
        reconciler.wait_for(SessionPhase::Steady).await,
        SessionPhase::Steady
    );
    let engine = reconciler.stop().await;
    assert!(engine.is_initial_load_complete().await);
}

#[tokio::test(start_paused = true)]
async fn failed_initial_load_still_reaches_steady() {
    let remote = MemoryRemote::new();
    remote.set_offline(true).await;
    let reconciler = Reconciler::start(engine(&remote));

    assert_eq!(
        reconciler.wait_for(SessionPhase::Steady).await,
        SessionPhase::Steady
    );
    let engine = reconciler.stop().await;
    assert!(engine.is_initial_load_complete().await);
    assert!(engine.report().await.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn edits_within_debounce_window_flush_together() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    let reconciler = Reconciler::start(engine.clone());
    reconciler.wait_for(SessionPhase::Steady).await;

    let task = engine.add_task(NewTask::titled("Draft")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    engine
        .update_task(&task.id, TaskPatch::title("Draft v2"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(engine.flush_passes(), 0);
    assert_eq!(creates(&remote).await, 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;
    assert_eq!(engine.flush_passes(), 1);
    assert_eq!(engine.pending_count().await, 0);
    assert_eq!(remote.count(EntityKind::Task).await, 1);

    reconciler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn periodic_pull_adopts_remote_changes() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    let reconciler = Reconciler::start(engine.clone());
    reconciler.wait_for(SessionPhase::Steady).await;

    let mut laptop = EntityStore::new(USER);
    let task = laptop.add_task(NewTask::titled("From laptop"));
    remote.seed(task.clone().into()).await.unwrap();
    assert!(engine.task(&task.id).await.is_none());

    tokio::time::sleep(SyncSettings::default().poll_interval + Duration::from_secs(1)).await;
    settle().await;
    assert!(engine.task(&task.id).await.is_some());

    reconciler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn tick_retries_flush_instead_of_pulling_while_changes_wait() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    let reconciler = Reconciler::start(engine.clone());
    reconciler.wait_for(SessionPhase::Steady).await;

    remote.fail_next(1).await;
    engine.add_task(NewTask::titled("Flaky")).await.unwrap();
    tokio::time::sleep(SyncSettings::default().debounce + Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(engine.pending_count().await, 1);

    let lists_before = remote
        .calls()
        .await
        .iter()
        .filter(|call| call.starts_with("list"))
        .count();
    tokio::time::sleep(SyncSettings::default().poll_interval).await;
    settle().await;
    assert_eq!(engine.pending_count().await, 0);
    assert_eq!(creates(&remote).await, 2);
    let lists_after = remote
        .calls()
        .await
        .iter()
        .filter(|call| call.starts_with("list"))
        .count();
    assert_eq!(lists_after, lists_before);

    reconciler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn logout_stops_the_loop_and_clears_state() {
    let remote = MemoryRemote::new();
    let engine = engine(&remote);
    let reconciler = Reconciler::start(engine.clone());
    reconciler.wait_for(SessionPhase::Steady).await;
    let phase = reconciler.subscribe();

    engine.add_task(NewTask::titled("Unsent")).await.unwrap();
    reconciler.logout().await;

    assert_eq!(*phase.borrow(), SessionPhase::Stopped);
    assert!(engine.tasks().await.is_empty());
    assert_eq!(engine.pending_count().await, 0);

    // No timers survive the session.
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(creates(&remote).await, 0);
}
