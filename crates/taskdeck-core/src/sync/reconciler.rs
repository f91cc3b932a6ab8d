//! Reconciliation loop.
//!
//! Per session: `Idle -> InitialLoad -> Steady -> Stopped`. The initial load
//! always completes (successfully or not) before the loop reaches `Steady`.
//! In `Steady`, local changes arm a debounce timer that flushes the queue
//! once edits go quiet, and the pull trigger fetches remote changes when
//! nothing is queued. A tick that finds changes still queued (earlier pushes
//! failed) retries the flush instead.

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::SyncEngine;
use super::trigger::{PollingTrigger, PullTrigger};

/// Lifecycle of a session's reconciliation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Idle,
    InitialLoad,
    Steady,
    Stopped,
}

/// Handle to a running reconciliation loop
#[derive(Debug)]
pub struct Reconciler {
    engine: SyncEngine,
    phase: watch::Receiver<SessionPhase>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reconciler {
    /// Start the loop with interval polling from the engine settings.
    #[must_use]
    pub fn start(engine: SyncEngine) -> Self {
        let trigger = PollingTrigger::new(engine.settings().poll_interval);
        Self::start_with_trigger(engine, Box::new(trigger))
    }

    #[must_use]
    pub fn start_with_trigger(engine: SyncEngine, trigger: Box<dyn PullTrigger>) -> Self {
        let (phase_tx, phase) = watch::channel(SessionPhase::Idle);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(engine.clone(), trigger, phase_tx, shutdown_rx));
        Self {
            engine,
            phase,
            shutdown,
            handle,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.clone()
    }

    /// Wait until the loop reaches `target` (or stops).
    pub async fn wait_for(&self, target: SessionPhase) -> SessionPhase {
        let mut phase = self.phase.clone();
        phase
            .wait_for(|phase| *phase == target || *phase == SessionPhase::Stopped)
            .await
            .map_or(SessionPhase::Stopped, |phase| *phase)
    }

    /// Stop the loop and cancel its timers, keeping local state.
    pub async fn stop(self) -> SyncEngine {
        self.shutdown.send_replace(true);
        if let Err(error) = self.handle.await {
            tracing::error!("Reconciliation loop ended abnormally: {}", error);
        }
        self.engine
    }

    /// End the session: stop the loop and clear all in-memory state.
    pub async fn logout(self) {
        let engine = self.stop().await;
        engine.clear().await;
    }
}

async fn run(
    engine: SyncEngine,
    mut trigger: Box<dyn PullTrigger>,
    phase: watch::Sender<SessionPhase>,
    mut shutdown: watch::Receiver<bool>,
) {
    let settings = *engine.settings();

    phase.send_replace(SessionPhase::InitialLoad);
    tracing::info!("Initial load for {}", engine.user_id());
    tokio::select! {
        outcome = engine.load_from_remote(true) => {
            tracing::debug!("Initial load finished: {:?}", outcome);
        }
        _ = shutdown.changed() => {
            phase.send_replace(SessionPhase::Stopped);
            return;
        }
    }
    phase.send_replace(SessionPhase::Steady);

    let debounce = tokio::time::sleep(settings.debounce);
    tokio::pin!(debounce);
    // Changes restored from a previous run are pushed after the first quiet period.
    let mut armed = engine.pending_count().await > 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            () = engine.inner.changes.notified() => {
                debounce.as_mut().reset(Instant::now() + settings.debounce);
                armed = true;
            }
            () = &mut debounce, if armed => {
                armed = false;
                spawn_flush(&engine);
            }
            () = trigger.next() => {
                if engine.pending_count().await > 0 {
                    spawn_flush(&engine);
                } else {
                    spawn_pull(&engine);
                }
            }
        }
    }

    phase.send_replace(SessionPhase::Stopped);
    tracing::info!("Reconciliation loop stopped for {}", engine.user_id());
}

fn spawn_flush(engine: &SyncEngine) {
    let engine = engine.clone();
    tokio::spawn(async move {
        engine.flush_pending().await;
    });
}

fn spawn_pull(engine: &SyncEngine) {
    let engine = engine.clone();
    tokio::spawn(async move {
        engine.load_from_remote(false).await;
    });
}
