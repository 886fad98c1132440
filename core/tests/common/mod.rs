#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use kondate_core::api::{
    DispatchOutcome, Planner, ProgressSink, ServiceDispatcher, SessionStore,
};
use kondate_core::error::{EngineError, ExecutorError};
use kondate_core::executor::progress::ProgressUpdate;
use kondate_core::executor::types::Task;
use kondate_core::session::Session;

/// Scripted response for one method.
#[derive(Clone)]
pub enum Scripted {
    Ok(Value),
    Confirm { context: Value, message: String },
    Fail(String),
}

/// Dispatcher serving per-method scripted responses and recording every
/// invocation with its resolved parameters.
pub struct ScriptedDispatcher {
    responses: Mutex<HashMap<String, Scripted>>,
    invocations: Mutex<Vec<(String, String, Map<String, Value>)>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), Scripted::Ok(value));
    }

    pub fn respond_confirm(&self, method: &str, context: Value, message: &str) {
        self.responses.lock().unwrap().insert(
            method.to_string(),
            Scripted::Confirm {
                context,
                message: message.to_string(),
            },
        );
    }

    pub fn respond_fail(&self, method: &str, error: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), Scripted::Fail(error.to_string()));
    }

    /// Resolved parameter maps of every call to `method`, in call order.
    pub fn calls_of(&self, method: &str) -> Vec<Map<String, Value>> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == method)
            .map(|(_, _, params)| params.clone())
            .collect()
    }

    pub fn invoked_methods(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m, _)| m.clone())
            .collect()
    }
}

#[async_trait]
impl ServiceDispatcher for ScriptedDispatcher {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        self.invocations.lock().unwrap().push((
            service.to_string(),
            method.to_string(),
            params.clone(),
        ));

        let scripted = self.responses.lock().unwrap().get(method).cloned();
        match scripted {
            Some(Scripted::Ok(value)) => Ok(DispatchOutcome::Ok(value)),
            Some(Scripted::Confirm { context, message }) => {
                Ok(DispatchOutcome::NeedsConfirmation { context, message })
            }
            Some(Scripted::Fail(error)) => Err(ExecutorError::Dispatch(error)),
            None => Ok(DispatchOutcome::Ok(json!({"data": {"method": method}}))),
        }
    }
}

/// Planner popping pre-seeded plans, recording every request text.
pub struct QueuePlanner {
    plans: Mutex<VecDeque<Vec<Task>>>,
    requests: Mutex<Vec<String>>,
}

impl QueuePlanner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_plan(&self, tasks: Vec<Task>) {
        self.plans.lock().unwrap().push_back(tasks);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for QueuePlanner {
    async fn plan(
        &self,
        text: &str,
        _owner_id: &str,
        _session_id: &str,
    ) -> Result<Vec<Task>, EngineError> {
        self.requests.lock().unwrap().push(text.to_string());
        self.plans
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::Planning("no scripted plan".to_string()))
    }
}

/// Progress sink collecting everything it is told.
#[derive(Default)]
pub struct RecordingSink {
    pub progress: Mutex<Vec<(String, ProgressUpdate)>>,
    pub completions: Mutex<Vec<(String, String, Option<Value>, Option<Value>)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn progress_updates(&self) -> Vec<ProgressUpdate> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .map(|(_, u)| u.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn notify_progress(&self, session_id: &str, update: &ProgressUpdate) {
        self.progress
            .lock()
            .unwrap()
            .push((session_id.to_string(), update.clone()));
    }

    async fn notify_complete(
        &self,
        session_id: &str,
        text: &str,
        payload: Option<Value>,
        confirmation: Option<Value>,
    ) {
        self.completions.lock().unwrap().push((
            session_id.to_string(),
            text.to_string(),
            payload,
            confirmation,
        ));
    }
}

/// Minimal in-memory session store for the integration tests.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub async fn snapshot(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(
        &self,
        session_id: &str,
        owner_id: &str,
    ) -> Result<Option<Session>, EngineError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }

    async fn create(&self, session: Session) -> Result<(), EngineError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn update(&self, session: Session) -> Result<(), EngineError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str, _owner_id: &str) -> Result<(), EngineError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn sweep_expired(&self, max_age: chrono::Duration) -> Result<usize, EngineError> {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now - s.updated_at <= max_age);
        Ok(before - sessions.len())
    }
}
