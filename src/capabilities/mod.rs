// Capability contracts consumed by the orchestrator
//
// The engine never implements inference, memory, or command execution
// itself - it calls these seams and the surrounding application
// provides them (gating the executor behind its own security
// validation). No implicit timeout is applied to any of these calls;
// a caller needing bounded latency wraps its implementation.

use anyhow::Result;
use async_trait::async_trait;

/// Text-generation capability (LLM or otherwise)
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce a response for a fully-built prompt.
    ///
    /// Failures must come back as `Err`, never as a panic across the
    /// boundary - the queue converts them into a failed task outcome.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Conversational memory / context store
#[async_trait]
pub trait MemoryContext: Send + Sync {
    /// Retrieve prior context relevant to a query (may be empty)
    async fn retrieve_context(&self, query: &str) -> Result<String>;

    /// Persist one interaction; returns whether it was stored
    async fn store_interaction(&self, query: &str, response: &str) -> Result<bool>;
}

/// OS command execution, pre-gated by the embedder's security validator
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String>;
}

/// An invocable scheduled-task action.
///
/// Actions are explicit objects rather than captured closures so they
/// can be named, inspected, and tested in isolation.
#[async_trait]
pub trait ScheduledAction: Send + Sync {
    async fn run(&self) -> Result<()>;
}

// Plain closures still work as actions where a dedicated type would be
// overkill (tests, one-off glue).
#[async_trait]
impl<F> ScheduledAction for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    async fn run(&self) -> Result<()> {
        (self)()
    }
}
