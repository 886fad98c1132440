use serde::{Deserialize, Serialize};

/// One progress notification, emitted once per wavefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Successful tasks so far.
    pub completed: usize,
    /// Total tasks in the chain.
    pub total: usize,
    /// 0-100, derived from completed/total.
    pub pct: u8,
    /// Label of the most recently finished task.
    pub label: String,
}

impl ProgressUpdate {
    pub fn new(completed: usize, total: usize, label: impl Into<String>) -> Self {
        let pct = if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            completed,
            total,
            pct,
            label: label.into(),
        }
    }
}
