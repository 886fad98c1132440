use std::collections::HashMap;

use serde_json::Value;

use crate::ambiguity::AmbiguityInfo;

/// Overall status of a chain execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    NeedsConfirmation,
    Error,
}

/// Result of executing a task chain.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// task_id -> result, Completed tasks only. Empty unless Success: a
    /// confirmation pause discards already-completed outputs from the
    /// caller's perspective, and chain-level errors expose no partial
    /// outputs.
    pub outputs: HashMap<String, Value>,

    /// Confirmation context, present when status is NeedsConfirmation.
    pub confirmation: Option<AmbiguityInfo>,

    /// Human-readable message (confirmation prompt or error text).
    pub message: Option<String>,
}

impl ExecutionResult {
    pub fn success(outputs: HashMap<String, Value>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            outputs,
            confirmation: None,
            message: None,
        }
    }

    pub fn needs_confirmation(info: AmbiguityInfo, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::NeedsConfirmation,
            outputs: HashMap::new(),
            confirmation: Some(info),
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            outputs: HashMap::new(),
            confirmation: None,
            message: Some(message.into()),
        }
    }
}
