// Priority work queue with generator-driven execution and self-refinement
//
// The claim step (pending -> in_progress) happens under the state mutex
// so exactly one caller can take a task; the generator call happens
// outside it, so a long generation never blocks unrelated add/claim
// traffic. Re-planning always creates new tasks rather than
// resurrecting old ones.

mod task;

pub use task::{ExecutionReport, HistoryEntry, Task, TaskStatus};

use chrono::Utc;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::{MemoryContext, ResponseGenerator};
use crate::config::QueueConfig;
use crate::error::Error;
use crate::events::{Event, EventSink, TracingEventSink};

struct QueueState {
    tasks: Vec<Task>,
    history: Vec<HistoryEntry>,
}

/// Priority-ordered work queue executing objectives through a
/// [`ResponseGenerator`], with memory-augmented prompts and a periodic
/// refinement step that derives new tasks from recent history.
pub struct PriorityTaskQueue {
    state: Mutex<QueueState>,
    generator: Arc<dyn ResponseGenerator>,
    memory: Arc<dyn MemoryContext>,
    events: Arc<dyn EventSink>,
    config: QueueConfig,
    is_running: AtomicBool,
    stop_requested: AtomicBool,
}

/// Clears the single-flight and stop flags when a run exits, on every
/// path including unwinding, so the flag can never be left stuck.
struct RunGuard<'a> {
    queue: &'a PriorityTaskQueue,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.queue.stop_requested.store(false, Ordering::SeqCst);
        self.queue.is_running.store(false, Ordering::SeqCst);
    }
}

impl PriorityTaskQueue {
    /// Create a queue with default config, emitting events via `tracing`
    pub fn new(generator: Arc<dyn ResponseGenerator>, memory: Arc<dyn MemoryContext>) -> Self {
        Self::with_config(
            generator,
            memory,
            QueueConfig::default(),
            Arc::new(TracingEventSink),
        )
    }

    pub fn with_config(
        generator: Arc<dyn ResponseGenerator>,
        memory: Arc<dyn MemoryContext>,
        config: QueueConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                history: Vec::new(),
            }),
            generator,
            memory,
            events,
            config,
            is_running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // A panic elsewhere never leaves a half-applied transition here,
        // so a poisoned lock is safe to take over
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a task to the queue; returns its id.
    ///
    /// An empty (or whitespace-only) objective is rejected without
    /// mutating any state.
    pub fn add_task(&self, objective: &str, task_type: &str, priority: i64) -> Result<Uuid, Error> {
        let objective = objective.trim();
        if objective.is_empty() {
            return Err(Error::InvalidInput("task objective is empty".into()));
        }

        let task = Task::new(objective.to_string(), task_type.to_string(), priority);
        let (id, created_at) = (task.id, task.created_at);
        self.state().tasks.push(task);

        self.events.emit(Event::TaskAdded {
            task_id: id,
            objective: objective.to_string(),
            priority,
            at: created_at,
        });
        Ok(id)
    }

    /// Snapshot of one task by id
    pub fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.state().tasks.iter().find(|t| t.id == task_id).cloned()
    }

    /// Snapshot of all tasks, optionally filtered by status
    pub fn get_tasks(&self, status: Option<TaskStatus>) -> Vec<Task> {
        self.state()
            .tasks
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect()
    }

    /// Completed-task history (oldest first)
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state().history.clone()
    }

    /// Whether a run loop currently holds the single-flight flag
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Execute one task: the given id if pending, otherwise the
    /// highest-priority pending task (earliest-created wins ties).
    ///
    /// Generator failures are captured on the task, not propagated.
    pub async fn execute(&self, task_id: Option<Uuid>) -> ExecutionReport {
        let (id, objective) = {
            let mut state = self.state();
            let claimed = match task_id {
                Some(id) => {
                    let found = state
                        .tasks
                        .iter_mut()
                        .find(|t| t.id == id && t.status == TaskStatus::Pending);
                    match found {
                        Some(task) => task,
                        None => {
                            warn!(task_id = %id, "Task not found or not pending");
                            return ExecutionReport::NotFound { task_id: id };
                        }
                    }
                }
                None => {
                    // Highest priority first; FIFO among equal priorities
                    let best = state
                        .tasks
                        .iter_mut()
                        .filter(|t| t.status == TaskStatus::Pending)
                        .min_by_key(|t| (Reverse(t.priority), t.created_at));
                    match best {
                        Some(task) => task,
                        None => {
                            info!("No pending tasks to execute");
                            return ExecutionReport::Idle;
                        }
                    }
                }
            };
            claimed.status = TaskStatus::InProgress;
            (claimed.id, claimed.objective.clone())
        };

        self.events.emit(Event::TaskClaimed {
            task_id: id,
            at: Utc::now(),
        });
        info!(task_id = %id, "Executing task: {}", objective);

        // Context retrieval failures degrade to an empty context; only
        // the generator decides success or failure of the task itself
        let context = match self.memory.retrieve_context(&objective).await {
            Ok(context) => context,
            Err(e) => {
                warn!(task_id = %id, "Context retrieval failed: {e:#}");
                String::new()
            }
        };

        let prompt = build_prompt(&objective, &context);

        match self.generator.generate(&prompt).await {
            Ok(response) => {
                match self.memory.store_interaction(&prompt, &response).await {
                    Ok(true) => {}
                    Ok(false) => warn!(task_id = %id, "Interaction was not stored"),
                    Err(e) => warn!(task_id = %id, "Failed to store interaction: {e:#}"),
                }

                let completed_at = Utc::now();
                {
                    let mut state = self.state();
                    if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                        task.status = TaskStatus::Completed;
                        task.completed_at = Some(completed_at);
                        task.result = Some(response.clone());
                    }
                    state.history.push(HistoryEntry {
                        task_id: id,
                        objective,
                        result: response.clone(),
                        completed_at,
                    });
                }

                self.events.emit(Event::TaskCompleted {
                    task_id: id,
                    at: completed_at,
                });
                ExecutionReport::Completed {
                    task_id: id,
                    result: response,
                }
            }
            Err(e) => {
                let error = format!("{e:#}");
                let failed_at = Utc::now();
                {
                    let mut state = self.state();
                    if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                        task.status = TaskStatus::Failed;
                        task.completed_at = Some(failed_at);
                        task.result = Some(format!("Error: {error}"));
                    }
                }

                self.events.emit(Event::TaskFailed {
                    task_id: id,
                    error: error.clone(),
                    at: failed_at,
                });
                ExecutionReport::Failed { task_id: id, error }
            }
        }
    }

    /// Derive new tasks from recent completed-task history.
    ///
    /// Reads the last `history_window` entries; with no history this is
    /// a no-op. Each non-empty paragraph of the generator's response is
    /// enqueued at `refine_priority`. A generation failure logs a
    /// warning and yields no tasks - it never aborts a running loop.
    pub async fn refine(&self) -> Vec<Uuid> {
        let recent: Vec<HistoryEntry> = {
            let state = self.state();
            let start = state.history.len().saturating_sub(self.config.history_window);
            state.history[start..].to_vec()
        };
        if recent.is_empty() {
            info!("No task history to refine");
            return Vec::new();
        }

        info!("Refining tasks based on execution history");
        let prompt = build_refine_prompt(&recent);
        let response = match self.generator.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Refinement generation failed: {e:#}");
                return Vec::new();
            }
        };

        let mut new_ids = Vec::new();
        for objective in split_objectives(&response) {
            match self.add_task(objective, "general", self.config.refine_priority) {
                Ok(id) => new_ids.push(id),
                Err(e) => warn!("Skipping refined task: {e}"),
            }
        }
        info!("Created {} refined tasks", new_ids.len());
        new_ids
    }

    /// Run the queue for `iterations` iterations, refining after every
    /// `refine_every`-th one (0 disables refinement) and sleeping
    /// `interval` between iterations.
    ///
    /// Single-flight: a second concurrent run is rejected with
    /// [`Error::AlreadyRunning`] rather than interleaved.
    pub async fn run(
        &self,
        iterations: usize,
        interval: Duration,
        refine_every: usize,
    ) -> Result<Vec<ExecutionReport>, Error> {
        self.claim_run_flag()?;
        let _guard = RunGuard { queue: self };
        Ok(self.run_loop(iterations, interval, refine_every).await)
    }

    /// Launch [`run`](Self::run) on a background tokio task and invoke
    /// `callback` with the results when it finishes.
    ///
    /// The single-flight flag is claimed synchronously, so an
    /// already-running queue is reported to the caller, not the callback.
    pub fn run_async<F>(
        self: Arc<Self>,
        iterations: usize,
        interval: Duration,
        refine_every: usize,
        callback: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(Vec<ExecutionReport>) + Send + 'static,
    {
        self.claim_run_flag()?;
        tokio::spawn(async move {
            let results = {
                let _guard = RunGuard { queue: &self };
                self.run_loop(iterations, interval, refine_every).await
            };
            callback(results);
        });
        Ok(())
    }

    /// Request cooperative cancellation of an active run.
    ///
    /// The flag is checked at the top of each iteration; an `execute`
    /// already inside a generator call is not interrupted. Returns
    /// whether a run was active.
    pub fn stop(&self) -> bool {
        if !self.is_running.load(Ordering::SeqCst) {
            return false;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        info!("Queue stop requested");
        true
    }

    fn claim_run_flag(&self) -> Result<(), Error> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Queue run loop is already active");
            return Err(Error::AlreadyRunning);
        }
        Ok(())
    }

    async fn run_loop(
        &self,
        iterations: usize,
        interval: Duration,
        refine_every: usize,
    ) -> Vec<ExecutionReport> {
        info!(iterations, "Starting queue run loop");
        let mut results = Vec::with_capacity(iterations);

        for iteration in 1..=iterations {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!(iteration, "Stop requested; exiting run loop");
                break;
            }
            info!("Iteration {iteration}/{iterations}");

            results.push(self.execute(None).await);

            if refine_every > 0 && iteration % refine_every == 0 {
                self.refine().await;
            }

            if iteration < iterations {
                tokio::time::sleep(interval).await;
            }
        }

        info!("Queue run loop finished");
        results
    }
}

fn build_prompt(objective: &str, context: &str) -> String {
    let mut prompt = format!("Task: {objective}\n\n");
    if !context.is_empty() {
        prompt.push_str(&format!("Context:\n{context}\n\n"));
    }
    prompt.push_str("Execute this task and provide a detailed response.");
    prompt
}

fn build_refine_prompt(history: &[HistoryEntry]) -> String {
    let history_text = history
        .iter()
        .map(|h| format!("Task: {}\nResult: {}", h.objective, h.result))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on these previously completed tasks:\n\n{history_text}\n\n\
         Generate three new tasks that would be valuable to execute next. \
         Consider dependencies, logical next steps, and potential optimizations.\n\
         Format each task as a separate paragraph with a clear objective.\n"
    )
}

fn split_objectives(response: &str) -> impl Iterator<Item = &str> {
    response.split("\n\n").map(str::trim).filter(|s| !s.is_empty())
}
