use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Selection flow stage. Strictly linear: no skip, no regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Main,
    Sub,
    Soup,
    Completed,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Main => Some(Stage::Sub),
            Stage::Sub => Some(Stage::Soup),
            Stage::Soup => Some(Stage::Completed),
            Stage::Completed => None,
        }
    }

    /// Course label used in user-facing text.
    pub fn label_ja(self) -> &'static str {
        match self {
            Stage::Main => "主菜",
            Stage::Sub => "副菜",
            Stage::Soup => "汁物",
            Stage::Completed => "完成",
        }
    }
}

/// Menu category, fixed by the Main-stage selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCategory {
    Japanese,
    Western,
    Chinese,
}

impl MenuCategory {
    /// Map a recipe's declared cuisine tag onto a category.
    pub fn from_cuisine_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "和食" | "japanese" => Some(Self::Japanese),
            "洋食" | "western" => Some(Self::Western),
            "中華" | "chinese" => Some(Self::Chinese),
            _ => None,
        }
    }

    pub fn label_ja(self) -> &'static str {
        match self {
            Self::Japanese => "和食",
            Self::Western => "洋食",
            Self::Chinese => "中華",
        }
    }
}

/// One selected (or proposed) recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSelection {
    pub recipe_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl RecipeSelection {
    /// Read a selection out of a service candidate payload. Candidates
    /// carry `id` where the selection stores `recipe_id`; a missing title
    /// disqualifies the entry.
    pub fn from_value(value: &Value) -> Option<Self> {
        let title = value.get("title")?.as_str()?.to_string();
        Some(Self {
            recipe_id: value.get("id").and_then(Value::as_i64),
            title,
            ingredients: value
                .get("ingredients")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            cuisine: value
                .get("cuisine")
                .and_then(Value::as_str)
                .map(str::to_string),
            url: value.get("url").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// One slot per selectable stage (Completed has no slot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerStage<T> {
    pub main: T,
    pub sub: T,
    pub soup: T,
}

impl<T> PerStage<T> {
    pub fn get(&self, stage: Stage) -> Option<&T> {
        match stage {
            Stage::Main => Some(&self.main),
            Stage::Sub => Some(&self.sub),
            Stage::Soup => Some(&self.soup),
            Stage::Completed => None,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> Option<&mut T> {
        match stage {
            Stage::Main => Some(&mut self.main),
            Stage::Sub => Some(&mut self.sub),
            Stage::Soup => Some(&mut self.soup),
            Stage::Completed => None,
        }
    }
}

/// Per-session selection state.
///
/// A session is owned exclusively by its (id, owner_id) pair and assumes at
/// most one in-flight request at a time — enforced by the caller, not by an
/// internal lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub current_stage: Stage,
    #[serde(default)]
    pub selections: PerStage<Option<RecipeSelection>>,
    /// Accumulating set; insertion order preserved.
    #[serde(default)]
    pub used_ingredients: Vec<String>,
    #[serde(default)]
    pub menu_category: Option<MenuCategory>,
    /// Dedup history of every title ever proposed, per stage.
    #[serde(default)]
    pub proposed_titles: PerStage<Vec<String>>,
    /// Last proposal batch, per stage; what a selection index points into.
    #[serde(default)]
    pub candidates: PerStage<Vec<RecipeSelection>>,
    #[serde(default)]
    pub last_proposal_task_id: Option<String>,
    /// Weak back-reference for "more suggestions" child sessions. Never an
    /// ownership edge; the parent may be reaped independently.
    #[serde(default)]
    pub parent_session_id: Option<String>,
    /// Mirrors the paused confirmation state while one is outstanding.
    #[serde(default)]
    pub confirmation_context: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            current_stage: Stage::Main,
            selections: PerStage::default(),
            used_ingredients: Vec::new(),
            menu_category: None,
            proposed_titles: PerStage::default(),
            candidates: PerStage::default(),
            last_proposal_task_id: None,
            parent_session_id: None,
            confirmation_context: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh session continuing `parent`'s flow at the same stage.
    /// Selections are *not* copied — `aggregate_selections` consults the
    /// parent chain instead — but the proposal history, used ingredients
    /// and fixed category carry over so new proposals never repeat.
    pub fn child_of(parent: &Session) -> Self {
        let mut child = Self::new(parent.owner_id.clone());
        child.current_stage = parent.current_stage;
        child.menu_category = parent.menu_category;
        child.used_ingredients = parent.used_ingredients.clone();
        child.proposed_titles = parent.proposed_titles.clone();
        child.parent_session_id = Some(parent.id.clone());
        child
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_completed(&self) -> bool {
        self.current_stage == Stage::Completed
    }

    /// Record a proposal batch for the current stage: replaces the live
    /// candidates, extends the dedup history, and remembers which task the
    /// batch came from.
    pub fn record_proposals(&mut self, batch: Vec<RecipeSelection>, task_id: impl Into<String>) {
        let stage = self.current_stage;
        if let Some(titles) = self.proposed_titles.get_mut(stage) {
            for selection in &batch {
                if !titles.contains(&selection.title) {
                    titles.push(selection.title.clone());
                }
            }
        }
        if let Some(slot) = self.candidates.get_mut(stage) {
            *slot = batch;
        }
        self.last_proposal_task_id = Some(task_id.into());
        self.touch();
    }

    /// Value behind a `session.context.<key>` parameter reference.
    pub fn context_value(&self, key: &str) -> Option<Value> {
        match key {
            "menu_category" => self.menu_category.map(|c| json!(c.label_ja())),
            "used_ingredients" => Some(json!(self.used_ingredients)),
            "proposed_titles" => self
                .proposed_titles
                .get(self.current_stage)
                .map(|titles| json!(titles)),
            "stage" => Some(json!(self.current_stage.label_ja())),
            "main_title" => self.selections.main.as_ref().map(|s| json!(s.title)),
            "sub_title" => self.selections.sub.as_ref().map(|s| json!(s.title)),
            "soup_title" => self.selections.soup.as_ref().map(|s| json!(s.title)),
            _ => None,
        }
    }
}
