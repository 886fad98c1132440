use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Service + method pair a task is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTarget {
    pub service: String,
    pub method: String,
}

impl TaskTarget {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// `service.method` label used in logs and progress updates.
    pub fn operation(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

/// Lifecycle of a single task within a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    WaitingForUser,
}

/// One planned operation inside a chain.
///
/// Tasks are value records: layers never share a mutable `Task`. Every
/// state transition produces a new record tracked by id, so there is no
/// aliasing between the executor, the confirmation coordinator and the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within a chain.
    pub id: String,
    pub target: TaskTarget,
    /// Ordered parameter map; values are literals or reference expressions
    /// understood by the resolver.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Ids of earlier tasks this one waits for. Acyclic by contract.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    /// Set once Completed.
    #[serde(default)]
    pub result: Option<Value>,
    /// Set once Failed.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target: TaskTarget::new(service, method),
            parameters: Map::new(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn running(&self) -> Self {
        Self {
            status: TaskStatus::Running,
            ..self.clone()
        }
    }

    pub fn completed(&self, result: Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
            ..self.clone()
        }
    }

    pub fn failed(&self, error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn waiting_for_user(&self) -> Self {
        Self {
            status: TaskStatus::WaitingForUser,
            ..self.clone()
        }
    }

    /// New record with the method rewritten to a disambiguation variant,
    /// reset to Pending for resubmission.
    pub fn with_method(&self, method: impl Into<String>) -> Self {
        Self {
            target: TaskTarget::new(self.target.service.clone(), method),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            ..self.clone()
        }
    }
}
