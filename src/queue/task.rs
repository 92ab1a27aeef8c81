// Task entities and per-execution outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal states are final; a task never returns to pending
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One unit of ad-hoc work.
///
/// Created pending; mutated only by the execution step
/// (pending -> in_progress -> completed | failed); never deleted,
/// retained for history and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub objective: String,
    pub task_type: String,
    pub priority: i64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set on entry to either terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Generator response, or the error text on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Task {
    pub(crate) fn new(objective: String, task_type: String, priority: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            objective,
            task_type,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        }
    }
}

/// Record of one completed task, kept for refinement and audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: Uuid,
    pub objective: String,
    pub result: String,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    /// Task ran and produced a result
    Completed { task_id: Uuid, result: String },
    /// The generator failed; the task is terminal with the error captured
    Failed { task_id: Uuid, error: String },
    /// Requested task id is unknown or no longer pending
    NotFound { task_id: Uuid },
    /// Nothing pending to claim - not an error
    Idle,
}

impl ExecutionReport {
    /// Whether this execution produced a completed task
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionReport::Completed { .. })
    }
}
