use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use kondate_core::api::DispatchOutcome;
use kondate_core::error::ExecutorError;
use kondate_core::session::normalize::names_match;

use super::registry::Service;

/// Per-owner ingredient inventory behind the `inventory` service name.
#[derive(Default)]
pub struct InventoryService {
    ingredients: RwLock<HashMap<String, Vec<String>>>,
}

impl InventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(owner_id: &str, names: &[&str]) -> Self {
        let mut map = HashMap::new();
        map.insert(
            owner_id.to_string(),
            names.iter().map(|s| s.to_string()).collect(),
        );
        Self {
            ingredients: RwLock::new(map),
        }
    }
}

#[async_trait]
impl Service for InventoryService {
    fn name(&self) -> &str {
        "inventory"
    }

    async fn handle(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        let owner_id = params
            .get("owner_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::Dispatch("パラメータ owner_id が必要です".to_string()))?;

        match method {
            "list_ingredients" => {
                let ingredients = self.ingredients.read().await;
                let list = ingredients.get(owner_id).cloned().unwrap_or_default();
                Ok(DispatchOutcome::Ok(json!({"data": {"ingredients": list}})))
            }
            "add_ingredient" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        ExecutorError::Dispatch("パラメータ name が必要です".to_string())
                    })?;
                let mut ingredients = self.ingredients.write().await;
                let list = ingredients.entry(owner_id.to_string()).or_default();
                if !list.iter().any(|have| names_match(have, name)) {
                    list.push(name.to_string());
                }
                Ok(DispatchOutcome::Ok(json!({"data": {"count": list.len()}})))
            }
            "remove_ingredient" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ExecutorError::Dispatch("パラメータ name が必要です".to_string())
                    })?;
                let mut ingredients = self.ingredients.write().await;
                if let Some(list) = ingredients.get_mut(owner_id) {
                    list.retain(|have| !names_match(have, name));
                }
                Ok(DispatchOutcome::Ok(json!({"data": {"removed": name}})))
            }
            _ => Err(ExecutorError::ServiceNotFound {
                service: "inventory".to_string(),
                method: method.to_string(),
            }),
        }
    }
}
