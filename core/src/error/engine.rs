use thiserror::Error;

use super::executor::ExecutorError;

/// Errors surfaced by the orchestration layer around the executor.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Planner failure. Maps to a generic user-facing message, no retry.
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
