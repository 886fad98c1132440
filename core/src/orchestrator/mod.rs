//! Composition layer: Planner → Ambiguity/Executor → Confirmation
//! Coordinator → Stage Manager → response assembly.
//!
//! Everything here is wiring; the engine pieces stay independently
//! testable. All collaborators are injected by handle.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::api::{
    DispatchOutcome, Planner, ProcessOutcome, ProgressSink, SelectionOutcome, ServiceDispatcher,
    SessionStore,
};
use crate::config::AppConfig;
use crate::confirm::{ConfirmationCoordinator, ConfirmationOutcome, PausedStateStore};
use crate::error::EngineError;
use crate::executor::types::{ExecutionStatus, Task};
use crate::executor::TaskExecutor;
use crate::resolver::session_context_key;
use crate::session::{RecipeSelection, Session, Stage, StageManager};

/// Generic user-facing failure text for planner errors; no retry.
const PLANNING_FAILURE_TEXT: &str =
    "ご要望をうまく処理できませんでした。別の言い方でもう一度お試しください。";

const NO_PAUSED_STATE_NOTE: &str = "（確認待ちの操作は見つかりませんでした）";

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    dispatcher: Arc<dyn ServiceDispatcher>,
    sessions: Arc<dyn SessionStore>,
    progress: Arc<dyn ProgressSink>,
    executor: TaskExecutor,
    confirmations: ConfirmationCoordinator,
    session_max_age: Duration,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn Planner>,
        dispatcher: Arc<dyn ServiceDispatcher>,
        sessions: Arc<dyn SessionStore>,
        progress: Arc<dyn ProgressSink>,
        config: &AppConfig,
    ) -> Self {
        let executor = TaskExecutor::new(
            dispatcher.clone(),
            progress.clone(),
            config.executor.max_parallel,
        );
        let paused = Arc::new(PausedStateStore::new(Duration::seconds(
            config.confirmation.paused_ttl_secs as i64,
        )));
        Self {
            planner,
            dispatcher,
            sessions,
            progress,
            executor,
            confirmations: ConfirmationCoordinator::new(paused),
            session_max_age: Duration::hours(config.session.max_age_hours as i64),
        }
    }

    /// One caller turn: plan (or resume a paused confirmation) and execute.
    pub async fn process_request(
        &self,
        text: &str,
        owner_id: &str,
        session_id: Option<&str>,
        is_confirmation_response: bool,
    ) -> Result<ProcessOutcome, EngineError> {
        let mut session = self.load_or_create_session(session_id, owner_id).await?;
        let mut request_text = text.to_string();
        let mut reply_note: Option<&str> = None;

        if is_confirmation_response {
            match self
                .confirmations
                .resume(&session.id, owner_id, text)
                .await
            {
                ConfirmationOutcome::Cancelled { message } => {
                    session.confirmation_context = None;
                    session.touch();
                    self.sessions.update(session.clone()).await?;
                    self.progress
                        .notify_complete(&session.id, &message, None, None)
                        .await;
                    return Ok(ProcessOutcome::reply(message));
                }
                ConfirmationOutcome::Reprompt { message } => {
                    return Ok(ProcessOutcome::Confirmation {
                        message,
                        confirmation_session_id: session.id.clone(),
                    });
                }
                ConfirmationOutcome::Resubmit {
                    tasks,
                    original_request,
                } => {
                    // Straight back to the executor; the planner is not
                    // re-invoked for candidate disambiguation.
                    session.confirmation_context = None;
                    return self
                        .execute_chain(&mut session, &original_request, tasks, None)
                        .await;
                }
                ConfirmationOutcome::Replan { request } => {
                    // Missing-parameter resolution re-enters planning with
                    // the merged request.
                    session.confirmation_context = None;
                    request_text = request;
                }
                ConfirmationOutcome::NoPausedState => {
                    reply_note = Some(NO_PAUSED_STATE_NOTE);
                }
            }
        }

        let tasks = match self
            .planner
            .plan(&request_text, owner_id, &session.id)
            .await
        {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(session_id = session.id.as_str(), error = %err, "planning failed");
                return Ok(ProcessOutcome::reply(PLANNING_FAILURE_TEXT));
            }
        };

        if tasks.is_empty() {
            debug!(session_id = session.id.as_str(), "planner produced no tasks");
            return Ok(ProcessOutcome::reply(PLANNING_FAILURE_TEXT));
        }

        self.execute_chain(&mut session, &request_text, tasks, reply_note)
            .await
    }

    /// Handle a numbered pick from the last proposal batch. `index == 0`
    /// is the reserved additional-proposals sentinel, not a real choice.
    pub async fn process_user_selection(
        &self,
        task_id: &str,
        index: usize,
        session_id: &str,
        owner_id: &str,
        previous_session_id: Option<&str>,
    ) -> Result<SelectionOutcome, EngineError> {
        if index == 0 {
            return self
                .spawn_additional_proposals(session_id, owner_id, previous_session_id)
                .await;
        }

        let Some(mut session) = self.sessions.get(session_id, owner_id).await? else {
            return Err(EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        };

        if session.last_proposal_task_id.as_deref() != Some(task_id) {
            return Ok(failure_outcome(
                session.id.clone(),
                "その候補は現在の提案のものではありません。最新の候補から選んでください。",
            ));
        }

        let candidates = session
            .candidates
            .get(session.current_stage)
            .cloned()
            .unwrap_or_default();
        let Some(selection) = candidates.get(index - 1).cloned() else {
            return Ok(failure_outcome(
                session.id.clone(),
                "その番号の候補はありません。",
            ));
        };

        let inventory = self.fetch_inventory(owner_id).await;
        let next = match StageManager::advance(&mut session, selection, &inventory) {
            Ok(next) => next,
            Err(EngineError::InvalidSelection(msg)) => {
                return Ok(failure_outcome(session.id.clone(), &msg));
            }
            Err(err) => return Err(err),
        };

        if next == Stage::Completed {
            let merged =
                StageManager::aggregate_selections(&session, self.sessions.as_ref()).await;
            let menu = json!({
                "category": session.menu_category.map(|c| c.label_ja()),
                "main": merged.main.as_ref().map(course_payload),
                "sub": merged.sub.as_ref().map(course_payload),
                "soup": merged.soup.as_ref().map(course_payload),
            });
            self.sessions.update(session.clone()).await?;

            let text = "献立が完成しました！";
            self.progress
                .notify_complete(&session.id, text, Some(menu.clone()), None)
                .await;
            info!(session_id = session.id.as_str(), "menu completed");

            return Ok(SelectionOutcome {
                success: true,
                session_id: session.id.clone(),
                requires_next_stage: false,
                next_stage_request: None,
                menu: Some(menu),
                message: Some(text.to_string()),
            });
        }

        self.sessions.update(session.clone()).await?;
        Ok(SelectionOutcome {
            success: true,
            session_id: session.id.clone(),
            requires_next_stage: true,
            next_stage_request: Some(format!("{}を提案して", next.label_ja())),
            menu: None,
            message: None,
        })
    }

    /// Reap idle sessions; called by the host on startup or on a timer.
    pub async fn sweep_sessions(&self) -> Result<usize, EngineError> {
        let reaped = self.sessions.sweep_expired(self.session_max_age).await?;
        if reaped > 0 {
            info!(reaped, "expired sessions reaped");
        }
        Ok(reaped)
    }

    async fn execute_chain(
        &self,
        session: &mut Session,
        request: &str,
        tasks: Vec<Task>,
        reply_note: Option<&str>,
    ) -> Result<ProcessOutcome, EngineError> {
        // Phase one: session-context substitution, strictly before the
        // resolver sees any other reference form.
        let tasks = substitute_session_context(tasks, session);

        let result = self.executor.execute(&session.id, &tasks).await;

        match result.status {
            ExecutionStatus::NeedsConfirmation => {
                let info = result
                    .confirmation
                    .expect("NeedsConfirmation carries its ambiguity info");
                let message = self
                    .confirmations
                    .pause(&session.id, &session.owner_id, request, &tasks, &info)
                    .await;

                session.confirmation_context =
                    Some(serde_json::to_value(&info).unwrap_or(Value::Null));
                session.touch();
                self.sessions.update(session.clone()).await?;

                self.progress
                    .notify_complete(
                        &session.id,
                        &message,
                        None,
                        Some(json!({
                            "session_id": session.id,
                            "kind": info.kind,
                            "task_id": info.task_id,
                        })),
                    )
                    .await;

                Ok(ProcessOutcome::Confirmation {
                    message,
                    confirmation_session_id: session.id.clone(),
                })
            }

            ExecutionStatus::Error => {
                let detail = result
                    .message
                    .unwrap_or_else(|| "不明なエラー".to_string());
                warn!(session_id = session.id.as_str(), detail = detail.as_str(), "chain failed");
                Ok(ProcessOutcome::reply(format!(
                    "処理中にエラーが発生しました：{}",
                    detail
                )))
            }

            ExecutionStatus::Success => {
                self.assemble_success_reply(session, &tasks, result.outputs, reply_note)
                    .await
            }
        }
    }

    async fn assemble_success_reply(
        &self,
        session: &mut Session,
        tasks: &[Task],
        outputs: std::collections::HashMap<String, Value>,
        reply_note: Option<&str>,
    ) -> Result<ProcessOutcome, EngineError> {
        // A proposal task in the chain turns the reply into a selection
        // prompt backed by the stored candidate batch.
        let proposal = tasks.iter().find(|task| {
            task.target.method.starts_with("propose_") && outputs.contains_key(&task.id)
        });

        if let Some(task) = proposal {
            let candidates = outputs[&task.id]
                .get("data")
                .and_then(|d| d.get("candidates"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let batch: Vec<RecipeSelection> = candidates
                .iter()
                .filter_map(RecipeSelection::from_value)
                .collect();

            if !batch.is_empty() {
                session.record_proposals(batch.clone(), &task.id);
                self.sessions.update(session.clone()).await?;

                let text = render_candidate_prompt(
                    session.current_stage,
                    &batch,
                    reply_note,
                );
                self.progress
                    .notify_complete(&session.id, &text, Some(json!(candidates)), None)
                    .await;

                return Ok(ProcessOutcome::Reply {
                    text,
                    requires_selection: true,
                    candidates: Some(json!(candidates)),
                    task_id: Some(task.id.clone()),
                });
            }
        }

        let mut text = "ご要望の操作が完了しました。".to_string();
        if let Some(note) = reply_note {
            text = format!("{}\n{}", note, text);
        }
        self.progress
            .notify_complete(&session.id, &text, None, None)
            .await;
        session.touch();
        self.sessions.update(session.clone()).await?;

        Ok(ProcessOutcome::reply(text))
    }

    async fn spawn_additional_proposals(
        &self,
        session_id: &str,
        owner_id: &str,
        previous_session_id: Option<&str>,
    ) -> Result<SelectionOutcome, EngineError> {
        let base_id = previous_session_id.unwrap_or(session_id);
        let Some(base) = self.sessions.get(base_id, owner_id).await? else {
            return Err(EngineError::SessionNotFound {
                session_id: base_id.to_string(),
            });
        };

        let child = Session::child_of(&base);
        self.sessions.create(child.clone()).await?;
        info!(
            parent = base.id.as_str(),
            child = child.id.as_str(),
            "spawned child session for additional proposals"
        );

        Ok(SelectionOutcome {
            success: true,
            session_id: child.id.clone(),
            requires_next_stage: false,
            next_stage_request: Some(format!(
                "{}の別の候補を提案して",
                base.current_stage.label_ja()
            )),
            menu: None,
            message: None,
        })
    }

    async fn load_or_create_session(
        &self,
        session_id: Option<&str>,
        owner_id: &str,
    ) -> Result<Session, EngineError> {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.get(id, owner_id).await? {
                return Ok(session);
            }
            // Keep the caller's key so a later confirmation response still
            // finds its paused state under the same id.
            let mut session = Session::new(owner_id);
            session.id = id.to_string();
            self.sessions.create(session.clone()).await?;
            return Ok(session);
        }

        let session = Session::new(owner_id);
        self.sessions.create(session.clone()).await?;
        Ok(session)
    }

    /// Best-effort inventory lookup; accumulation simply skips when the
    /// inventory service is unavailable.
    async fn fetch_inventory(&self, owner_id: &str) -> Vec<String> {
        let mut params = Map::new();
        params.insert("owner_id".to_string(), Value::String(owner_id.to_string()));

        match self
            .dispatcher
            .invoke("inventory", "list_ingredients", &params)
            .await
        {
            Ok(DispatchOutcome::Ok(value)) => value
                .get("data")
                .and_then(|d| d.get("ingredients"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            _ => {
                debug!(owner_id, "inventory unavailable, skipping accumulation");
                Vec::new()
            }
        }
    }
}

/// Replace `session.context.<key>` string parameters against the active
/// session. Runs before the resolver; unknown keys stay literal and fall
/// out as the target operation's own validation error.
fn substitute_session_context(tasks: Vec<Task>, session: &Session) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|mut task| {
            let substituted: Map<String, Value> = task
                .parameters
                .iter()
                .map(|(key, value)| (key.clone(), substitute_value(value, session)))
                .collect();
            task.parameters = substituted;
            task
        })
        .collect()
}

fn substitute_value(value: &Value, session: &Session) -> Value {
    match value {
        Value::String(raw) => match session_context_key(raw) {
            Some(key) => session.context_value(key).unwrap_or_else(|| {
                warn!(key, "unknown session context key, leaving literal");
                value.clone()
            }),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, session))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_candidate_prompt(
    stage: Stage,
    batch: &[RecipeSelection],
    note: Option<&str>,
) -> String {
    let mut text = String::new();
    if let Some(note) = note {
        text.push_str(note);
        text.push('\n');
    }
    text.push_str(&format!("{}の候補です：\n", stage.label_ja()));
    for (idx, selection) in batch.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", idx + 1, selection.title));
    }
    text.push_str("番号で選んでください。0 でほかの候補を提案します。");
    text
}

fn course_payload(selection: &RecipeSelection) -> Value {
    json!({
        "title": selection.title,
        "recipe_id": selection.recipe_id,
        "url": selection.url,
    })
}

fn failure_outcome(session_id: String, message: &str) -> SelectionOutcome {
    SelectionOutcome {
        success: false,
        session_id,
        requires_next_stage: false,
        next_stage_request: None,
        menu: None,
        message: Some(message.to_string()),
    }
}
