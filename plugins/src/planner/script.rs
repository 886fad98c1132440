use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use kondate_core::api::Planner;
use kondate_core::error::EngineError;
use kondate_core::executor::types::Task;

/// Planner substitute for running the engine without a language model.
///
/// Accepts either a literal JSON plan (an array of task entries, or
/// `{"tasks": [...]}`) or a handful of fixed phrase forms covering the
/// three proposal stages. Anything else is a planning failure — this is a
/// scripted shim, not a language understander.
#[derive(Default)]
pub struct ScriptedPlanner;

impl ScriptedPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct PlanDocument {
    tasks: Vec<PlanEntry>,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    id: String,
    service: String,
    method: String,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    deps: Vec<String>,
}

impl PlanEntry {
    fn into_task(self) -> Task {
        let mut task = Task::new(self.id, self.service, self.method)
            .with_dependencies(self.deps);
        task.parameters = self.params;
        task
    }
}

lazy_static! {
    static ref INGREDIENT_PREFIX: Regex =
        Regex::new(r"^\s*(.+?)を使って\s*").unwrap();
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(
        &self,
        text: &str,
        _owner_id: &str,
        _session_id: &str,
    ) -> Result<Vec<Task>, EngineError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return parse_json_plan(trimmed);
        }

        let (ingredient, rest) = match INGREDIENT_PREFIX.captures(trimmed) {
            Some(caps) => {
                let end = caps.get(0).expect("whole match").end();
                (Some(caps[1].to_string()), &trimmed[end..])
            }
            None => (None, trimmed),
        };

        if rest.contains("主菜") || rest.contains("メイン") {
            let mut task = Task::new("t1", "recipe", "propose_main_dish")
                .with_parameter("exclude_titles", json!("session.context.proposed_titles"));
            if let Some(ingredient) = ingredient {
                task = task.with_parameter("ingredient", json!(ingredient));
            }
            debug!("phrase plan: main dish proposal");
            return Ok(vec![task]);
        }

        if rest.contains("副菜") {
            debug!("phrase plan: side dish proposal");
            return Ok(vec![Task::new("t1", "recipe", "propose_side_dish")
                .with_parameter("category", json!("session.context.menu_category"))
                .with_parameter(
                    "exclude_ingredients",
                    json!("session.context.used_ingredients"),
                )
                .with_parameter("exclude_titles", json!("session.context.proposed_titles"))]);
        }

        if rest.contains("汁物") || rest.contains("スープ") {
            debug!("phrase plan: soup proposal");
            return Ok(vec![Task::new("t1", "recipe", "propose_soup")
                .with_parameter("category", json!("session.context.menu_category"))
                .with_parameter(
                    "exclude_ingredients",
                    json!("session.context.used_ingredients"),
                )
                .with_parameter("exclude_titles", json!("session.context.proposed_titles"))]);
        }

        Err(EngineError::Planning(format!(
            "no scripted plan for request: {trimmed}"
        )))
    }
}

fn parse_json_plan(text: &str) -> Result<Vec<Task>, EngineError> {
    let entries: Vec<PlanEntry> = if text.starts_with('[') {
        serde_json::from_str(text)
            .map_err(|e| EngineError::Planning(format!("invalid plan JSON: {e}")))?
    } else {
        serde_json::from_str::<PlanDocument>(text)
            .map_err(|e| EngineError::Planning(format!("invalid plan JSON: {e}")))?
            .tasks
    };

    Ok(entries.into_iter().map(PlanEntry::into_task).collect())
}
