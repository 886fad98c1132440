mod result;
mod task;

pub use result::{ExecutionResult, ExecutionStatus};
pub use task::{Task, TaskStatus, TaskTarget};
