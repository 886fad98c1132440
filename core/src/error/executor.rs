use thiserror::Error;

/// Executor-specific errors for task chain construction and execution
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    /// Raised when no task is executable while tasks remain. This covers a
    /// true dependency cycle and the case where an upstream dependency
    /// failed and stranded its dependents; the message lists the stalled
    /// tasks and their unmet dependencies so logs can tell the two apart.
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Service not found: {service}.{method}")]
    ServiceNotFound { service: String, method: String },

    #[error("Dispatch error: {0}")]
    Dispatch(String),
}
