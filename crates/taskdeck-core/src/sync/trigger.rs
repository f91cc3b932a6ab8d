//! When the reconciliation loop pulls.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Source of "pull now" signals for the reconciliation loop.
///
/// Polling is the only strategy today; a push channel from the remote
/// service would implement this trait and leave the merge untouched.
#[async_trait]
pub trait PullTrigger: Send {
    /// Resolve when the next pull is due.
    async fn next(&mut self);
}

/// Fixed-period polling. The first tick comes one period after creation,
/// since the session has just loaded.
#[derive(Debug)]
pub struct PollingTrigger {
    interval: Interval,
}

impl PollingTrigger {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl PullTrigger for PollingTrigger {
    async fn next(&mut self) {
        self.interval.tick().await;
    }
}
