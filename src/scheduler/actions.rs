// Stock actions bridging scheduled firings into the rest of the system

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::capabilities::{CommandExecutor, ScheduledAction};
use crate::queue::PriorityTaskQueue;

/// Enqueues a fixed objective into the priority queue each time it fires
pub struct EnqueueAction {
    queue: Arc<PriorityTaskQueue>,
    objective: String,
    priority: i64,
}

impl EnqueueAction {
    pub fn new(queue: Arc<PriorityTaskQueue>, objective: impl Into<String>, priority: i64) -> Self {
        Self {
            queue,
            objective: objective.into(),
            priority,
        }
    }
}

#[async_trait]
impl ScheduledAction for EnqueueAction {
    async fn run(&self) -> Result<()> {
        let task_id = self
            .queue
            .add_task(&self.objective, "scheduled", self.priority)?;
        info!(%task_id, "Scheduled objective enqueued");
        Ok(())
    }
}

/// Runs one fixed command through the (externally gated) executor
pub struct CommandAction {
    executor: Arc<dyn CommandExecutor>,
    command: String,
}

impl CommandAction {
    pub fn new(executor: Arc<dyn CommandExecutor>, command: impl Into<String>) -> Self {
        Self {
            executor,
            command: command.into(),
        }
    }
}

#[async_trait]
impl ScheduledAction for CommandAction {
    async fn run(&self) -> Result<()> {
        let output = self.executor.execute(&self.command).await?;
        info!(
            command = %self.command,
            "Command completed ({} bytes of output)",
            output.len()
        );
        Ok(())
    }
}
