// Typed errors surfaced synchronously to callers
//
// Generation and action failures are deliberately absent: those are
// converted at the capability boundary into task outcomes (a failed
// task, or a scheduled task's last_error) and never abort a loop.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any state was mutated
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation referenced an id that is not registered
    #[error("no task with id {0}")]
    NotFound(Uuid),

    /// A run/dispatch loop is already active on this component
    #[error("already running")]
    AlreadyRunning,
}
