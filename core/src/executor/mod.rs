//! Task executor: dependency-driven, per-wavefront parallel dispatch.
//!
//! ```text
//! Vec<Task>
//!   ↓
//! AmbiguityDetector::detect()      (whole plan, before anything runs)
//!   ↓
//! TaskGraph::from_tasks()          (duplicate-id rejection)
//!   ↓
//! loop: ready_ids() → resolve_parameters() → execute_wave_parallel()
//!   ↓
//! ExecutionResult { Success | NeedsConfirmation | Error }
//! ```
//!
//! Ordering across wavefronts is exactly the dependency partial order; no
//! ordering is guaranteed within one wavefront.

mod engine;
mod graph;
pub mod progress;
mod scheduler;
pub mod types;

pub use engine::TaskExecutor;
pub use graph::TaskGraph;
pub use progress::ProgressUpdate;
pub use scheduler::{execute_wave_parallel, TaskOutcome, WaveOutcome};
pub use types::{ExecutionResult, ExecutionStatus, Task, TaskStatus, TaskTarget};
