// Structured orchestration events
//
// Both components emit through an injected sink rather than a
// process-wide logger, so embedders can route events to metrics, a log
// collector, or a test buffer. The default sink forwards to `tracing`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One orchestration event, timestamped at emission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    TaskAdded {
        task_id: Uuid,
        objective: String,
        priority: i64,
        at: DateTime<Utc>,
    },
    TaskClaimed {
        task_id: Uuid,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: Uuid,
        at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: Uuid,
        error: String,
        at: DateTime<Utc>,
    },
    ScheduledTaskFired {
        task_id: Uuid,
        name: String,
        run_count: u64,
        at: DateTime<Utc>,
    },
    ScheduledTaskError {
        task_id: Uuid,
        name: String,
        error: String,
        at: DateTime<Utc>,
    },
}

/// Destination for orchestration events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Default sink: structured `tracing` records
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: Event) {
        match &event {
            Event::TaskAdded {
                task_id,
                objective,
                priority,
                ..
            } => {
                tracing::info!(%task_id, priority, "Task added: {}", objective);
            }
            Event::TaskClaimed { task_id, .. } => {
                tracing::info!(%task_id, "Task claimed");
            }
            Event::TaskCompleted { task_id, .. } => {
                tracing::info!(%task_id, "Task completed");
            }
            Event::TaskFailed { task_id, error, .. } => {
                tracing::error!(%task_id, "Task failed: {}", error);
            }
            Event::ScheduledTaskFired {
                task_id,
                name,
                run_count,
                ..
            } => {
                tracing::info!(%task_id, run_count, "Executing scheduled task: {}", name);
            }
            Event::ScheduledTaskError {
                task_id,
                name,
                error,
                ..
            } => {
                tracing::error!(%task_id, "Scheduled task failed: {} (error: {})", name, error);
            }
        }
    }
}
