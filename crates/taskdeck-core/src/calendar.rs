//! Best-effort calendar side channel.
//!
//! A task's `calendarEventId` is opaque to the sync engine. Keeping an
//! external calendar in step is delegated to a [`CalendarSink`], notified on
//! a detached task after each task mutation. Sink failures are logged and
//! never reach the caller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Task;

/// Task lifecycle events forwarded to a calendar integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarEvent {
    Created(Task),
    Updated(Task),
    Deleted(Task),
}

impl CalendarEvent {
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Updated(task) | Self::Deleted(task) => task,
        }
    }

    const fn action(&self) -> &'static str {
        match self {
            Self::Created(_) => "create",
            Self::Updated(_) => "update",
            Self::Deleted(_) => "delete",
        }
    }
}

#[async_trait]
pub trait CalendarSink: Send + Sync {
    async fn notify(&self, event: CalendarEvent) -> Result<()>;
}

/// Hand `event` to the sink without waiting for it.
pub(crate) fn notify_detached(sink: Option<&Arc<dyn CalendarSink>>, event: CalendarEvent) {
    let Some(sink) = sink.cloned() else {
        return;
    };
    tokio::spawn(async move {
        let action = event.action();
        let task_id = event.task().id.clone();
        if let Err(error) = sink.notify(event).await {
            tracing::warn!("Calendar {} for task {} failed: {}", action, task_id, error);
        }
    });
}
