use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::executor::types::Task;

/// Why a plan needs user confirmation before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityKind {
    /// A by-title update/delete matched more than one recipe.
    MultipleCandidates,
    /// A proposal operation was planned without its optional qualifier.
    MissingOptionalParameter,
}

/// One ambiguous task, with enough context to resume after the user
/// answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguityInfo {
    pub task_id: String,
    /// Method name of the flagged operation.
    pub operation: String,
    pub kind: AmbiguityKind,
    /// Candidate list or option-menu payload.
    pub details: Value,
    /// Parameters as planned, before any strategy tag is added.
    pub original_parameters: Map<String, Value>,
}

impl AmbiguityInfo {
    /// Build from a dispatcher-returned confirmation request (the runtime
    /// path; the static detector is the primary source).
    pub fn from_dispatch(task: &Task, context: Value, _message: &str) -> Self {
        let kind = match context.get("kind").and_then(Value::as_str) {
            Some("missing_parameter") => AmbiguityKind::MissingOptionalParameter,
            _ => AmbiguityKind::MultipleCandidates,
        };
        Self {
            task_id: task.id.clone(),
            operation: task.target.method.clone(),
            kind,
            details: context,
            original_parameters: task.parameters.clone(),
        }
    }

    /// Confirmation prompt for this ambiguity, from the fixed template set.
    pub fn render_message(&self) -> String {
        match self.kind {
            AmbiguityKind::MultipleCandidates => {
                let title = self
                    .original_parameters
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("指定の名前");
                let candidates = self
                    .details
                    .get("candidates")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                let mut lines = String::new();
                for (idx, candidate) in candidates.iter().enumerate() {
                    let c_title = candidate
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("(無題)");
                    let c_id = candidate.get("id").and_then(Value::as_i64).unwrap_or(0);
                    lines.push_str(&format!("{}. {} (ID: {})\n", idx + 1, c_title, c_id));
                }

                format!(
                    "「{}」に一致するレシピが{}件見つかりました。\n{}「最新」「最古」「すべて」か、IDで対象を指定してください。「キャンセル」で中止します。",
                    title,
                    candidates.len(),
                    lines
                )
            }
            AmbiguityKind::MissingOptionalParameter => {
                "主菜の提案に使う食材の指定がありません。食材名を返信してください。\
                 「おまかせ」でそのまま提案します。「キャンセル」で中止します。"
                    .to_string()
            }
        }
    }
}

/// Classification of a whole plan. Only the first ambiguous task is
/// surfaced to the user; the rest wait for later turns.
#[derive(Debug, Clone, Default)]
pub struct AmbiguityResult {
    pub requires_confirmation: bool,
    pub ambiguous_tasks: Vec<AmbiguityInfo>,
}

impl AmbiguityResult {
    pub fn unambiguous() -> Self {
        Self::default()
    }

    pub fn ambiguous(tasks: Vec<AmbiguityInfo>) -> Self {
        Self {
            requires_confirmation: !tasks.is_empty(),
            ambiguous_tasks: tasks,
        }
    }

    pub fn first(&self) -> Option<&AmbiguityInfo> {
        self.ambiguous_tasks.first()
    }
}
