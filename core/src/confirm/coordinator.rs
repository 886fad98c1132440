use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ambiguity::{AmbiguityInfo, AmbiguityKind};
use crate::executor::types::Task;

use super::paused::{PausedState, PausedStateStore};
use super::reply::{parse_reply, DisambiguationStrategy, ReplyIntent};

/// How a resume attempt ended.
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    /// User cancelled; nothing executes, paused state is gone.
    Cancelled { message: String },
    /// Candidate disambiguation resolved: the rewritten chain goes
    /// straight back to the executor, the planner is not re-invoked. The
    /// original request rides along in case the resubmission pauses again.
    Resubmit {
        tasks: Vec<Task>,
        original_request: String,
    },
    /// Missing-parameter resolution: the merged request re-enters the
    /// orchestrator as a brand-new planning request.
    Replan { request: String },
    /// Unrecognized reply; state re-persisted, ask again.
    Reprompt { message: String },
    /// No saved (or an expired) paused state; callers fall through to
    /// ordinary planning.
    NoPausedState,
}

/// Pause/resume state machine wrapping the executor.
pub struct ConfirmationCoordinator {
    store: Arc<PausedStateStore>,
}

impl ConfirmationCoordinator {
    pub fn new(store: Arc<PausedStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PausedStateStore {
        &self.store
    }

    /// Persist the paused chain and return the confirmation prompt. The
    /// ambiguous task is marked WaitingForUser in the snapshot; no task
    /// advances.
    pub async fn pause(
        &self,
        session_id: &str,
        owner_id: &str,
        original_request: &str,
        tasks: &[Task],
        ambiguity: &AmbiguityInfo,
    ) -> String {
        let snapshot = tasks
            .iter()
            .map(|task| {
                if task.id == ambiguity.task_id {
                    task.waiting_for_user()
                } else {
                    task.clone()
                }
            })
            .collect();

        self.store
            .save(PausedState {
                session_id: session_id.to_string(),
                owner_id: owner_id.to_string(),
                chain_id: Uuid::new_v4().to_string(),
                original_tasks: snapshot,
                original_request: original_request.to_string(),
                ambiguity: ambiguity.clone(),
                created_at: Utc::now(),
            })
            .await;

        info!(session_id, kind = ?ambiguity.kind, "awaiting confirmation");
        ambiguity.render_message()
    }

    /// Handle the next caller turn tagged as a confirmation response.
    /// The paused state is consumed eagerly — before the reply is even
    /// parsed — so resumption is single-use by construction.
    pub async fn resume(
        &self,
        session_id: &str,
        owner_id: &str,
        reply: &str,
    ) -> ConfirmationOutcome {
        let Some(state) = self.store.take(session_id, owner_id).await else {
            debug!(session_id, "no paused state for confirmation reply");
            return ConfirmationOutcome::NoPausedState;
        };

        match (parse_reply(reply), state.ambiguity.kind) {
            (ReplyIntent::Cancel, _) => {
                info!(session_id, "confirmation cancelled by user");
                ConfirmationOutcome::Cancelled {
                    message: "操作をキャンセルしました。".to_string(),
                }
            }

            (ReplyIntent::Strategy(strategy), AmbiguityKind::MultipleCandidates) => {
                let tasks = rewrite_for_strategy(&state, strategy);
                info!(
                    session_id,
                    strategy = strategy.variant_suffix(),
                    "resuming with disambiguation strategy"
                );
                ConfirmationOutcome::Resubmit {
                    tasks,
                    original_request: state.original_request,
                }
            }

            (ReplyIntent::Ingredient(name), AmbiguityKind::MissingOptionalParameter) => {
                let request = format!("{}を使って {}", name, state.original_request);
                info!(session_id, ingredient = name.as_str(), "replanning with ingredient");
                ConfirmationOutcome::Replan { request }
            }

            _ => {
                let message = format!(
                    "すみません、うまく読み取れませんでした。\n{}",
                    state.ambiguity.render_message()
                );
                // Re-persist with the original timestamp: re-prompting
                // does not extend the TTL window.
                self.store.save(state).await;
                ConfirmationOutcome::Reprompt { message }
            }
        }
    }
}

/// Rewrite the ambiguous task to the strategy-specific operation variant,
/// keeping the original parameters plus a strategy tag. Sibling tasks are
/// untouched.
fn rewrite_for_strategy(state: &PausedState, strategy: DisambiguationStrategy) -> Vec<Task> {
    state
        .original_tasks
        .iter()
        .map(|task| {
            if task.id != state.ambiguity.task_id {
                return task.clone();
            }

            let variant = format!(
                "{}_{}",
                state.ambiguity.operation,
                strategy.variant_suffix()
            );
            let mut rewritten = task.with_method(variant);
            rewritten.parameters.insert(
                "strategy".to_string(),
                Value::String(strategy.variant_suffix().to_string()),
            );
            if let DisambiguationStrategy::ById(id) = strategy {
                rewritten
                    .parameters
                    .insert("target_id".to_string(), json!(id));
            }
            rewritten
        })
        .collect()
}
