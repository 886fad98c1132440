use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use kondate_core::api::DispatchOutcome;
use kondate_core::error::ExecutorError;
use kondate_core::session::normalize::names_match;

use super::registry::Service;

/// Course slot a recipe can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCourse {
    Main,
    Side,
    Soup,
}

impl RecipeCourse {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Side => "side",
            Self::Soup => "soup",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "main" => Some(Self::Main),
            "side" => Some(Self::Side),
            "soup" => Some(Self::Soup),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub ingredients: Vec<String>,
    pub cuisine: String,
    pub course: RecipeCourse,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per proposal batch.
const MAX_PROPOSALS: usize = 3;

/// In-memory recipe catalog behind the `recipe` service name.
///
/// The by-title update/delete family carries latest/oldest/all/by-id
/// variants; the unsuffixed forms return a confirmation request when the
/// title is ambiguous, as a runtime safety net behind the static detector.
pub struct RecipeService {
    recipes: RwLock<Vec<Recipe>>,
    next_id: AtomicI64,
}

impl RecipeService {
    pub fn new() -> Self {
        Self {
            recipes: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn with_catalog(recipes: Vec<Recipe>) -> Self {
        let next = recipes.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            recipes: RwLock::new(recipes),
            next_id: AtomicI64::new(next),
        }
    }

    /// Small demo catalog covering every course and cuisine.
    pub fn seeded() -> Self {
        let mut id = 0;
        let mut seed = |title: &str,
                        ingredients: &[&str],
                        cuisine: &str,
                        course: RecipeCourse|
         -> Recipe {
            id += 1;
            Recipe {
                id,
                title: title.to_string(),
                ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
                cuisine: cuisine.to_string(),
                course,
                url: None,
                created_at: Utc::now() - Duration::minutes(100 - id),
            }
        };

        let catalog = vec![
            seed("肉じゃが", &["じゃがいも", "たまねぎ", "牛肉"], "和食", RecipeCourse::Main),
            seed("唐揚げ", &["鶏肉", "にんにく"], "和食", RecipeCourse::Main),
            seed("鮭の塩焼き", &["鮭"], "和食", RecipeCourse::Main),
            seed("ハンバーグ", &["牛ひき肉", "たまねぎ", "卵"], "洋食", RecipeCourse::Main),
            seed("オムライス", &["卵", "ごはん", "鶏肉"], "洋食", RecipeCourse::Main),
            seed("麻婆豆腐", &["豆腐", "ひき肉", "ねぎ"], "中華", RecipeCourse::Main),
            seed("回鍋肉", &["豚肉", "キャベツ", "ピーマン"], "中華", RecipeCourse::Main),
            seed("ほうれん草のお浸し", &["ほうれん草"], "和食", RecipeCourse::Side),
            seed("きんぴらごぼう", &["ごぼう", "にんじん"], "和食", RecipeCourse::Side),
            seed("ポテトサラダ", &["じゃがいも", "きゅうり"], "洋食", RecipeCourse::Side),
            seed("コールスロー", &["キャベツ", "コーン"], "洋食", RecipeCourse::Side),
            seed("春雨サラダ", &["春雨", "きゅうり"], "中華", RecipeCourse::Side),
            seed("バンバンジー", &["鶏肉", "きゅうり"], "中華", RecipeCourse::Side),
            seed("味噌汁", &["豆腐", "わかめ"], "和食", RecipeCourse::Soup),
            seed("けんちん汁", &["大根", "にんじん", "ごぼう"], "和食", RecipeCourse::Soup),
            seed("コーンスープ", &["コーン", "牛乳"], "洋食", RecipeCourse::Soup),
            seed("ミネストローネ", &["トマト", "たまねぎ"], "洋食", RecipeCourse::Soup),
            seed("卵スープ", &["卵", "ねぎ"], "中華", RecipeCourse::Soup),
            seed("ワンタンスープ", &["ワンタン", "ねぎ"], "中華", RecipeCourse::Soup),
        ];

        Self::with_catalog(catalog)
    }

    async fn matches_by_title(&self, title: &str) -> Vec<Recipe> {
        self.recipes
            .read()
            .await
            .iter()
            .filter(|r| names_match(&r.title, title))
            .cloned()
            .collect()
    }

    async fn search(&self, query: &str) -> Value {
        let recipes: Vec<Value> = self
            .matches_by_title(query)
            .await
            .iter()
            .map(recipe_json)
            .collect();
        json!({"data": {"recipes": recipes}})
    }

    async fn get(&self, params: &Map<String, Value>) -> Result<Value, ExecutorError> {
        let id = require_i64(params, "id")?;
        let recipes = self.recipes.read().await;
        recipes
            .iter()
            .find(|r| r.id == id)
            .map(|r| json!({"data": recipe_json(r)}))
            .ok_or_else(|| ExecutorError::Dispatch(format!("レシピが見つかりません (ID: {id})")))
    }

    async fn register(&self, params: &Map<String, Value>) -> Result<Value, ExecutorError> {
        let title = require_str(params, "title")?;
        let recipe = Recipe {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title: title.to_string(),
            ingredients: string_list(params.get("ingredients")),
            cuisine: params
                .get("cuisine")
                .and_then(Value::as_str)
                .unwrap_or("和食")
                .to_string(),
            course: params
                .get("course")
                .and_then(Value::as_str)
                .and_then(RecipeCourse::from_str)
                .unwrap_or(RecipeCourse::Main),
            url: params
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string),
            created_at: Utc::now(),
        };
        let payload = json!({"data": {"id": recipe.id, "title": recipe.title}});
        self.recipes.write().await.push(recipe);
        Ok(payload)
    }

    /// Resolve the targets of a by-title operation under a strategy.
    /// `None` strategy with several matches yields the confirmation
    /// request instead of picking silently.
    async fn select_targets(
        &self,
        params: &Map<String, Value>,
        strategy: Option<&str>,
    ) -> Result<Result<Vec<i64>, DispatchOutcome>, ExecutorError> {
        let title = require_str(params, "title")?;
        let mut matches = self.matches_by_title(title).await;
        if matches.is_empty() {
            return Err(ExecutorError::Dispatch(format!(
                "「{title}」に一致するレシピがありません"
            )));
        }

        matches.sort_by_key(|r| r.created_at);

        let ids = match strategy {
            None => {
                if matches.len() > 1 {
                    let candidates: Vec<Value> = matches
                        .iter()
                        .map(|r| json!({"id": r.id, "title": r.title}))
                        .collect();
                    return Ok(Err(DispatchOutcome::NeedsConfirmation {
                        context: json!({
                            "kind": "multiple_candidates",
                            "candidates": candidates,
                        }),
                        message: format!(
                            "「{title}」に一致するレシピが{}件あります。どれを対象にしますか？",
                            matches.len()
                        ),
                    }));
                }
                vec![matches[0].id]
            }
            Some("latest") => vec![matches.last().expect("non-empty").id],
            Some("oldest") => vec![matches[0].id],
            Some("all") => matches.iter().map(|r| r.id).collect(),
            Some("by_id") => {
                let target = require_i64(params, "target_id")?;
                if !matches.iter().any(|r| r.id == target) {
                    return Err(ExecutorError::Dispatch(format!(
                        "ID {target} は「{title}」の候補にありません"
                    )));
                }
                vec![target]
            }
            Some(other) => {
                return Err(ExecutorError::Dispatch(format!(
                    "不明な指定方法です: {other}"
                )))
            }
        };

        Ok(Ok(ids))
    }

    async fn update(
        &self,
        params: &Map<String, Value>,
        strategy: Option<&str>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        let ids = match self.select_targets(params, strategy).await? {
            Ok(ids) => ids,
            Err(confirmation) => return Ok(confirmation),
        };

        let mut recipes = self.recipes.write().await;
        let mut updated = 0;
        for recipe in recipes.iter_mut().filter(|r| ids.contains(&r.id)) {
            if let Some(new_title) = params.get("new_title").and_then(Value::as_str) {
                recipe.title = new_title.to_string();
            }
            if let Some(url) = params.get("url").and_then(Value::as_str) {
                recipe.url = Some(url.to_string());
            }
            if params.get("ingredients").is_some() {
                recipe.ingredients = string_list(params.get("ingredients"));
            }
            updated += 1;
        }
        debug!(updated, "recipes updated");
        Ok(DispatchOutcome::Ok(
            json!({"data": {"updated": updated, "ids": ids}}),
        ))
    }

    async fn delete(
        &self,
        params: &Map<String, Value>,
        strategy: Option<&str>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        let ids = match self.select_targets(params, strategy).await? {
            Ok(ids) => ids,
            Err(confirmation) => return Ok(confirmation),
        };

        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|r| !ids.contains(&r.id));
        let deleted = before - recipes.len();
        debug!(deleted, "recipes deleted");
        Ok(DispatchOutcome::Ok(
            json!({"data": {"deleted": deleted, "ids": ids}}),
        ))
    }

    async fn propose(&self, course: RecipeCourse, params: &Map<String, Value>) -> Value {
        let category = params.get("category").and_then(Value::as_str);
        let ingredient = params.get("ingredient").and_then(Value::as_str);
        let exclude_titles = string_list(params.get("exclude_titles"));
        let exclude_ingredients = string_list(params.get("exclude_ingredients"));

        let recipes = self.recipes.read().await;
        let candidates: Vec<Value> = recipes
            .iter()
            .filter(|r| r.course == course)
            .filter(|r| category.is_none_or(|c| r.cuisine == c))
            .filter(|r| {
                ingredient.is_none_or(|wanted| {
                    r.ingredients.iter().any(|have| names_match(have, wanted))
                })
            })
            .filter(|r| !exclude_titles.iter().any(|t| names_match(t, &r.title)))
            .filter(|r| {
                !r.ingredients
                    .iter()
                    .any(|have| exclude_ingredients.iter().any(|e| names_match(have, e)))
            })
            .take(MAX_PROPOSALS)
            .map(recipe_json)
            .collect();

        json!({"data": {"candidates": candidates}})
    }
}

impl Default for RecipeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for RecipeService {
    fn name(&self) -> &str {
        "recipe"
    }

    async fn handle(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        let ok = |value: Value| Ok(DispatchOutcome::Ok(value));

        match method {
            "search_recipes" => ok(self.search(require_str(params, "query")?).await),
            "find_recipes_by_title" => ok(self.search(require_str(params, "title")?).await),
            "get_recipe" => ok(self.get(params).await?),
            "register_recipe" => ok(self.register(params).await?),

            "update_recipe_by_title" => self.update(params, None).await,
            "update_recipe_by_title_latest" => self.update(params, Some("latest")).await,
            "update_recipe_by_title_oldest" => self.update(params, Some("oldest")).await,
            "update_recipe_by_title_all" => self.update(params, Some("all")).await,
            "update_recipe_by_title_by_id" => self.update(params, Some("by_id")).await,

            "delete_recipe_by_title" => self.delete(params, None).await,
            "delete_recipe_by_title_latest" => self.delete(params, Some("latest")).await,
            "delete_recipe_by_title_oldest" => self.delete(params, Some("oldest")).await,
            "delete_recipe_by_title_all" => self.delete(params, Some("all")).await,
            "delete_recipe_by_title_by_id" => self.delete(params, Some("by_id")).await,

            "propose_main_dish" => ok(self.propose(RecipeCourse::Main, params).await),
            "propose_side_dish" => ok(self.propose(RecipeCourse::Side, params).await),
            "propose_soup" => ok(self.propose(RecipeCourse::Soup, params).await),

            _ => Err(ExecutorError::ServiceNotFound {
                service: "recipe".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

fn recipe_json(recipe: &Recipe) -> Value {
    json!({
        "id": recipe.id,
        "title": recipe.title,
        "ingredients": recipe.ingredients,
        "cuisine": recipe.cuisine,
        "course": recipe.course.as_str(),
        "url": recipe.url,
    })
}

fn require_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str, ExecutorError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ExecutorError::Dispatch(format!("パラメータ {key} が必要です")))
}

fn require_i64(params: &Map<String, Value>, key: &str) -> Result<i64, ExecutorError> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ExecutorError::Dispatch(format!("パラメータ {key} が必要です")))
}

/// Flatten a parameter into a list of strings; accepts a single string, a
/// list, or one level of nested lists (the shape session-context
/// substitution can produce).
fn string_list(value: Option<&Value>) -> Vec<String> {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() => out.push(s.clone()),
            Value::Array(items) => {
                for item in items {
                    collect(item, out);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    if let Some(value) = value {
        collect(value, &mut out);
    }
    out
}
