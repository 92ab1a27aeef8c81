// Kestrel - autonomous task orchestration
//
// A priority-ordered work queue that executes objectives through an
// external generation capability and periodically re-plans itself,
// paired with a recurring scheduler for interval and daily clock jobs.
// Inference, memory, and command execution live behind the capability
// traits; this crate owns only the orchestration.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod events;
pub mod queue;
pub mod scheduler;

pub use error::Error;
