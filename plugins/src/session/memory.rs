use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use kondate_core::api::SessionStore;
use kondate_core::error::EngineError;
use kondate_core::session::Session;

/// In-memory session store.
///
/// A session is visible only to its owner: a lookup with a mismatched
/// owner id behaves as not-found rather than erroring, so callers cannot
/// distinguish "absent" from "not yours".
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(
        &self,
        session_id: &str,
        owner_id: &str,
    ) -> Result<Option<Session>, EngineError> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(session_id) else {
            return Ok(None);
        };
        if session.owner_id != owner_id {
            debug!(session_id, "session owner mismatch, treating as not found");
            return Ok(None);
        }
        Ok(Some(session.clone()))
    }

    async fn create(&self, session: Session) -> Result<(), EngineError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn update(&self, session: Session) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(EngineError::SessionNotFound {
                session_id: session.id.clone(),
            });
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str, owner_id: &str) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            if session.owner_id == owner_id {
                sessions.remove(session_id);
            }
        }
        Ok(())
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<usize, EngineError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.updated_at <= max_age);
        let reaped = before - sessions.len();
        if reaped > 0 {
            debug!(reaped, "sessions reaped by sweep");
        }
        Ok(reaped)
    }
}
