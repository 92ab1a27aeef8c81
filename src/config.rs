// Tunables for both components
//
// Plain structs with defaults, embeddable in an application's own
// configuration file; the core does no file I/O of its own.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the priority task queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Priority assigned to tasks spawned by refinement (kept below a
    /// manually-escalated priority, above the default of 1)
    pub refine_priority: i64,
    /// How many recent history entries feed the refinement prompt
    pub history_window: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            refine_priority: 2,
            history_window: 5,
        }
    }
}

/// Configuration for the recurring scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Dispatch loop poll tick; due times are observed at this granularity
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}
