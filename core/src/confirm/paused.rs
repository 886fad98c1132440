use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::ambiguity::AmbiguityInfo;
use crate::executor::types::Task;

/// Snapshot required to resume execution after a confirmation round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedState {
    pub session_id: String,
    pub owner_id: String,
    pub chain_id: String,
    /// The plan as it stood when the pause happened, with the ambiguous
    /// task marked WaitingForUser.
    pub original_tasks: Vec<Task>,
    /// Natural-language request that produced the plan; needed for the
    /// replanning resolution path.
    pub original_request: String,
    pub ambiguity: AmbiguityInfo,
    pub created_at: DateTime<Utc>,
}

/// In-memory paused-state store, keyed by session id.
///
/// Entries are consumed-and-deleted on resume or cancel; TTL-expired
/// entries behave as "not found". Expiry is passive — nothing fires when
/// an entry lapses, the next resume attempt simply misses.
pub struct PausedStateStore {
    inner: RwLock<HashMap<String, PausedState>>,
    ttl: Duration,
}

impl PausedStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn save(&self, state: PausedState) {
        debug!(
            session_id = state.session_id.as_str(),
            task_id = state.ambiguity.task_id.as_str(),
            "paused state saved"
        );
        self.inner
            .write()
            .await
            .insert(state.session_id.clone(), state);
    }

    /// Remove and return the paused state for `session_id`. The removal is
    /// unconditional — even an unrecognized reply consumes the entry; the
    /// caller re-saves when it wants another round. An entry older than
    /// the TTL, or owned by someone else, behaves as absent.
    pub async fn take(&self, session_id: &str, owner_id: &str) -> Option<PausedState> {
        let state = self.inner.write().await.remove(session_id)?;

        if state.owner_id != owner_id {
            debug!(session_id, "paused state owner mismatch, discarding");
            return None;
        }
        if Utc::now() - state.created_at > self.ttl {
            debug!(session_id, "paused state expired, discarding");
            return None;
        }

        Some(state)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, state| now - state.created_at <= self.ttl);
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    use crate::ambiguity::AmbiguityKind;

    fn state(session_id: &str, created_at: DateTime<Utc>) -> PausedState {
        PausedState {
            session_id: session_id.to_string(),
            owner_id: "user-1".to_string(),
            chain_id: "chain-1".to_string(),
            original_tasks: vec![],
            original_request: "カレーのレシピを更新して".to_string(),
            ambiguity: AmbiguityInfo {
                task_id: "t1".to_string(),
                operation: "update_recipe_by_title".to_string(),
                kind: AmbiguityKind::MultipleCandidates,
                details: serde_json::json!({}),
                original_parameters: Map::new(),
            },
            created_at,
        }
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let store = PausedStateStore::new(Duration::minutes(10));
        store.save(state("s1", Utc::now())).await;

        assert!(store.take("s1", "user-1").await.is_some());
        assert!(store.take("s1", "user-1").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_behave_as_not_found() {
        let store = PausedStateStore::new(Duration::minutes(10));
        store
            .save(state("s1", Utc::now() - Duration::minutes(11)))
            .await;

        assert!(store.take("s1", "user-1").await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn owner_mismatch_behaves_as_not_found() {
        let store = PausedStateStore::new(Duration::minutes(10));
        store.save(state("s1", Utc::now())).await;

        assert!(store.take("s1", "someone-else").await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = PausedStateStore::new(Duration::minutes(10));
        store.save(state("old", Utc::now() - Duration::hours(1))).await;
        store.save(state("fresh", Utc::now())).await;

        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
