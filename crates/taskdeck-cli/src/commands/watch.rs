use std::time::Duration;

use taskdeck_core::{Reconciler, SessionPhase};

use crate::commands::common::Session;
use crate::error::CliError;

const SAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Run the reconciliation loop in the foreground until Ctrl-C, saving the
/// snapshot periodically.
pub async fn run_watch(session: &Session) -> Result<(), CliError> {
    let reconciler = Reconciler::start(session.engine.clone());
    reconciler.wait_for(SessionPhase::Steady).await;
    println!("Watching for changes as {} (Ctrl-C to stop)", session.engine.user_id());

    let mut save = tokio::time::interval(SAVE_INTERVAL);
    save.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = save.tick() => {
                if let Err(error) = session.save().await {
                    tracing::warn!("Failed to save session snapshot: {}", error);
                }
            }
        }
    }

    reconciler.stop().await;
    println!("Stopped watching");
    Ok(())
}
