// Recurring-task scheduler with a polling dispatch loop
//
// Fires registered actions when their interval elapses or their daily
// clock time arrives. Each due action runs on its own tokio task, so a
// slow action never delays unrelated due tasks. Action failures are
// recorded on the task and never disable it or stop the loop.

mod actions;
mod entry;

pub use actions::{CommandAction, EnqueueAction};
pub use entry::{Cadence, ScheduledTaskInfo};

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::ScheduledAction;
use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::events::{Event, EventSink, TracingEventSink};

use entry::ScheduledEntry;

/// Time-triggered job scheduler.
///
/// Registered tasks fire on a fixed interval or at a daily "HH:MM"
/// (UTC) clock time, observed at the configured tick granularity.
/// Stopping is cooperative: the dispatch loop exits within one tick and
/// in-flight actions are left to finish. Occurrences that fall due
/// while stopped are skipped forward on the next `start`, never fired
/// retroactively.
pub struct RecurringScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    entries: Mutex<Vec<ScheduledEntry>>,
    running: AtomicBool,
    events: Arc<dyn EventSink>,
    config: SchedulerConfig,
}

impl Default for RecurringScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecurringScheduler {
    /// Create a scheduler with default config, emitting events via `tracing`
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default(), Arc::new(TracingEventSink))
    }

    pub fn with_config(config: SchedulerConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                entries: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                events,
                config,
            }),
        }
    }

    /// Register a recurring task; returns its id.
    ///
    /// Exactly one of `interval` or `schedule` must be given. A
    /// malformed "HH:MM" string is accepted here - each next-run
    /// computation falls back to one hour ahead with a warning.
    pub fn add_task(
        &self,
        action: Arc<dyn ScheduledAction>,
        interval: Option<Duration>,
        schedule: Option<&str>,
        name: Option<&str>,
    ) -> Result<Uuid, Error> {
        let cadence = match (interval, schedule) {
            (Some(every), None) => Cadence::Interval(every),
            (None, Some(spec)) => Cadence::Daily(spec.to_string()),
            (Some(_), Some(_)) => {
                return Err(Error::InvalidInput(
                    "give either an interval or a daily schedule, not both".into(),
                ))
            }
            (None, None) => {
                return Err(Error::InvalidInput(
                    "a scheduled task needs an interval or a daily schedule".into(),
                ))
            }
        };

        let id = Uuid::new_v4();
        let name = name.map_or_else(|| format!("task-{id}"), str::to_string);
        let next_run = cadence.next_run(Utc::now());

        self.inner.entries().push(ScheduledEntry {
            id,
            name: name.clone(),
            action,
            cadence,
            last_run: None,
            next_run: Some(next_run),
            run_count: 0,
            enabled: true,
            last_error: None,
        });

        info!(task_id = %id, next_run = %next_run, "Scheduled task added: {}", name);
        Ok(id)
    }

    /// Start the background dispatch loop.
    ///
    /// Every enabled task is re-armed from now first, which is what
    /// skips occurrences missed while the scheduler was stopped.
    pub fn start(&self) -> Result<(), Error> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Scheduler is already running");
            return Err(Error::AlreadyRunning);
        }

        {
            let now = Utc::now();
            let mut entries = self.inner.entries();
            for entry in entries.iter_mut().filter(|e| e.enabled) {
                entry.next_run = Some(entry.cadence.next_run(now));
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.dispatch_loop().await });
        info!("Task scheduler started");
        Ok(())
    }

    /// Stop the dispatch loop (within one tick). Idempotent; in-flight
    /// actions are not cancelled.
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            info!("Task scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Re-enable a task, arming a fresh next-run. Returns whether the
    /// id was found; enabling an enabled task is a no-op that succeeds.
    pub fn enable_task(&self, task_id: Uuid) -> bool {
        let mut entries = self.inner.entries();
        match entries.iter_mut().find(|e| e.id == task_id) {
            Some(entry) => {
                entry.enabled = true;
                entry.next_run = Some(entry.cadence.next_run(Utc::now()));
                info!(task_id = %task_id, "Scheduled task enabled: {}", entry.name);
                true
            }
            None => false,
        }
    }

    /// Disable a task, preventing future firings only - an in-flight
    /// action is not aborted. Returns whether the id was found.
    pub fn disable_task(&self, task_id: Uuid) -> bool {
        let mut entries = self.inner.entries();
        match entries.iter_mut().find(|e| e.id == task_id) {
            Some(entry) => {
                entry.enabled = false;
                entry.next_run = None;
                info!(task_id = %task_id, "Scheduled task disabled: {}", entry.name);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every registered task, in registration order
    pub fn get_tasks(&self) -> Vec<ScheduledTaskInfo> {
        self.inner.entries().iter().map(|e| e.snapshot()).collect()
    }
}

impl SchedulerInner {
    fn entries(&self) -> MutexGuard<'_, Vec<ScheduledEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn dispatch_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.config.tick).await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let now = Utc::now();

            // Collect due entries in registration order. Bookkeeping and
            // re-arming happen here, under the lock, at dispatch time;
            // the actions themselves run on their own tasks.
            let due: Vec<(Uuid, String, Arc<dyn ScheduledAction>, u64)> = {
                let mut entries = self.entries();
                entries
                    .iter_mut()
                    .filter(|e| e.enabled && e.next_run.is_some_and(|at| at <= now))
                    .map(|e| {
                        e.last_run = Some(now);
                        e.run_count += 1;
                        e.next_run = Some(e.cadence.next_run(now));
                        (e.id, e.name.clone(), Arc::clone(&e.action), e.run_count)
                    })
                    .collect()
            };

            for (id, name, action, run_count) in due {
                self.events.emit(Event::ScheduledTaskFired {
                    task_id: id,
                    name: name.clone(),
                    run_count,
                    at: now,
                });

                let inner = Arc::clone(&self);
                tokio::spawn(async move {
                    match action.run().await {
                        Ok(()) => inner.record_outcome(id, None),
                        Err(e) => {
                            let error = format!("{e:#}");
                            warn!(task_id = %id, "Scheduled task failed: {} (error: {})", name, error);
                            inner.events.emit(Event::ScheduledTaskError {
                                task_id: id,
                                name,
                                error: error.clone(),
                                at: Utc::now(),
                            });
                            inner.record_outcome(id, Some(error));
                        }
                    }
                });
            }
        }
    }

    fn record_outcome(&self, task_id: Uuid, error: Option<String>) {
        if let Some(entry) = self.entries().iter_mut().find(|e| e.id == task_id) {
            entry.last_error = error;
        }
    }
}
