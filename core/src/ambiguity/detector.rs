use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::{DispatchOutcome, ServiceDispatcher};
use crate::executor::types::Task;

use super::types::{AmbiguityInfo, AmbiguityKind, AmbiguityResult};

lazy_static! {
    /// By-title update/delete operations that need a disambiguation
    /// strategy when more than one recipe matches.
    static ref CANDIDATE_SENSITIVE_OPS: HashSet<&'static str> =
        ["update_recipe_by_title", "delete_recipe_by_title"]
            .into_iter()
            .collect();

    /// Proposal operations paired with the optional qualifier they accept.
    static ref OPTIONAL_PARAMETER_OPS: Vec<(&'static str, &'static str)> =
        vec![("propose_main_dish", "ingredient")];
}

/// Method used to probe candidate counts for by-title operations.
const PROBE_METHOD: &str = "find_recipes_by_title";

/// Classifies a full plan as ambiguous/unambiguous before execution
/// starts. Probes go through the same dispatcher the executor uses, so a
/// swapped backend changes both consistently.
pub struct AmbiguityDetector {
    dispatcher: Arc<dyn ServiceDispatcher>,
}

impl AmbiguityDetector {
    pub fn new(dispatcher: Arc<dyn ServiceDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn detect(&self, tasks: &[Task]) -> AmbiguityResult {
        let mut flagged = Vec::new();

        for task in tasks {
            let method = task.target.method.as_str();

            if CANDIDATE_SENSITIVE_OPS.contains(method) && !has_strategy(&task.parameters) {
                if let Some(info) = self.probe_candidates(task).await {
                    flagged.push(info);
                    continue;
                }
            }

            for &(op, param) in OPTIONAL_PARAMETER_OPS.iter() {
                if method == op && !task.parameters.contains_key(param) {
                    flagged.push(missing_parameter_info(task, param));
                }
            }
        }

        AmbiguityResult::ambiguous(flagged)
    }

    /// Look up how many recipes the by-title operation would hit. Probe
    /// failures never block execution; the operation will fail on its own
    /// terms if the title really is unresolvable.
    async fn probe_candidates(&self, task: &Task) -> Option<AmbiguityInfo> {
        let title = task.parameters.get("title")?.as_str()?;

        let mut probe_params = Map::new();
        probe_params.insert("title".to_string(), Value::String(title.to_string()));

        let outcome = self
            .dispatcher
            .invoke(&task.target.service, PROBE_METHOD, &probe_params)
            .await;

        let value = match outcome {
            Ok(DispatchOutcome::Ok(value)) => value,
            Ok(DispatchOutcome::NeedsConfirmation { .. }) => return None,
            Err(err) => {
                debug!(task_id = task.id.as_str(), error = %err, "candidate probe failed");
                return None;
            }
        };

        let candidates = value
            .get("data")
            .and_then(|d| d.get("recipes"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if candidates.len() <= 1 {
            return None;
        }

        let mut info = AmbiguityInfo {
            task_id: task.id.clone(),
            operation: task.target.method.clone(),
            kind: AmbiguityKind::MultipleCandidates,
            details: json!({
                "candidates": candidates,
                "keywords": ["最新", "最古", "すべて", "キャンセル"],
            }),
            original_parameters: task.parameters.clone(),
        };
        let message = info.render_message();
        info.details["message"] = Value::String(message);
        Some(info)
    }
}

fn has_strategy(params: &Map<String, Value>) -> bool {
    params.contains_key("strategy")
}

/// The optional-qualifier case always triggers confirmation: the user
/// either specifies the parameter or explicitly proceeds without it.
fn missing_parameter_info(task: &Task, param: &str) -> AmbiguityInfo {
    let mut info = AmbiguityInfo {
        task_id: task.id.clone(),
        operation: task.target.method.clone(),
        kind: AmbiguityKind::MissingOptionalParameter,
        details: json!({
            "parameter": param,
            "options": ["specify", "proceed_without"],
        }),
        original_parameters: task.parameters.clone(),
    };
    let message = info.render_message();
    info.details["message"] = Value::String(message);
    info
}
