//! External-interface seams consumed by the engine.
//!
//! Everything the engine talks to — planner, service dispatcher, session
//! store, progress sink — is injected by handle through these traits. There
//! is no ambient global state; swapping a backing implementation is a
//! constructor argument, not a process-wide switch.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{EngineError, ExecutorError};
use crate::executor::progress::ProgressUpdate;
use crate::executor::types::Task;
use crate::session::Session;

/// Outcome of one service invocation.
///
/// Ambiguity is ordinary control flow here, not an unwound exception: a
/// dispatcher that cannot act without user input returns `NeedsConfirmation`
/// with an opaque context payload and a user-facing message.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Ok(Value),
    NeedsConfirmation { context: Value, message: String },
}

/// Service dispatcher: routes `(service, method, params)` to a backend.
#[async_trait]
pub trait ServiceDispatcher: Send + Sync {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError>;
}

/// Opaque planner: turns a natural-language request into an ordered task
/// chain. Possibly backed by a language model; the engine never looks
/// inside.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        text: &str,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Vec<Task>, EngineError>;
}

/// Session persistence. A session is owned exclusively by its
/// (session-id, owner-id) pair; `get` with a mismatched owner behaves as
/// not-found.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, owner_id: &str)
        -> Result<Option<Session>, EngineError>;

    async fn create(&self, session: Session) -> Result<(), EngineError>;

    async fn update(&self, session: Session) -> Result<(), EngineError>;

    async fn delete(&self, session_id: &str, owner_id: &str) -> Result<(), EngineError>;

    /// Remove sessions idle for longer than `max_age`. Returns the number
    /// of sessions reaped.
    async fn sweep_expired(&self, max_age: chrono::Duration) -> Result<usize, EngineError>;
}

/// Wire-level progress delivery is out of scope; the engine only pushes
/// notifications into this sink.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify_progress(&self, session_id: &str, update: &ProgressUpdate);

    async fn notify_complete(
        &self,
        session_id: &str,
        text: &str,
        payload: Option<Value>,
        confirmation: Option<Value>,
    );
}

/// Result of `Orchestrator::process_request`.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Ordinary reply, optionally asking the user to pick a candidate.
    Reply {
        text: String,
        requires_selection: bool,
        candidates: Option<Value>,
        task_id: Option<String>,
    },
    /// Execution paused; the next turn for this session should be tagged
    /// as a confirmation response.
    Confirmation {
        message: String,
        confirmation_session_id: String,
    },
}

impl ProcessOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            requires_selection: false,
            candidates: None,
            task_id: None,
        }
    }
}

/// Result of `Orchestrator::process_user_selection`.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub success: bool,
    /// Session to continue the flow with (a fresh child session when the
    /// additional-proposals sentinel was used).
    pub session_id: String,
    pub requires_next_stage: bool,
    /// Request text the caller should feed back into `process_request`
    /// to drive the next stage (or the additional-proposals round).
    pub next_stage_request: Option<String>,
    /// Assembled three-course menu, present once the flow completes.
    pub menu: Option<Value>,
    pub message: Option<String>,
}
