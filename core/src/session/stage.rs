use tracing::{debug, info};

use crate::api::SessionStore;
use crate::error::EngineError;

use super::normalize::match_ingredients;
use super::types::{MenuCategory, PerStage, RecipeSelection, Session, Stage};

/// Bound on the parent-session walk in `aggregate_selections`. The parent
/// reference is weak and user-supplied, so a reference cycle must not spin.
pub const MAX_PARENT_DEPTH: usize = 8;

/// Linear Main→Sub→Soup→Completed selection state machine.
pub struct StageManager;

impl StageManager {
    /// Store `selection` at the session's current stage and move one stage
    /// forward. Rejected once the session is Completed.
    ///
    /// Used-ingredient accumulation maps the selection's ingredient names
    /// onto `inventory` (the caller's known ingredient names); unmatched
    /// names are dropped, never added. The Main-stage selection fixes the
    /// session's menu category from its declared cuisine tag.
    pub fn advance(
        session: &mut Session,
        selection: RecipeSelection,
        inventory: &[String],
    ) -> Result<Stage, EngineError> {
        let stage = session.current_stage;
        let next = stage.next().ok_or_else(|| {
            EngineError::InvalidSelection(format!(
                "session {} is already completed",
                session.id
            ))
        })?;

        for name in match_ingredients(&selection.ingredients, inventory) {
            if !session.used_ingredients.contains(&name) {
                session.used_ingredients.push(name);
            }
        }

        if stage == Stage::Main {
            session.menu_category = selection
                .cuisine
                .as_deref()
                .and_then(MenuCategory::from_cuisine_tag);
        }

        info!(
            session_id = session.id.as_str(),
            stage = stage.label_ja(),
            title = selection.title.as_str(),
            "stage selection stored"
        );

        if let Some(slot) = session.selections.get_mut(stage) {
            *slot = Some(selection);
        }
        session.current_stage = next;
        session.touch();

        Ok(next)
    }

    /// Merge stage selections across the weak parent-session chain. The
    /// more specific (descendant) session's non-null value always wins;
    /// stages left unset locally are filled from the nearest ancestor that
    /// has them. Depth-bounded against reference cycles.
    pub async fn aggregate_selections(
        session: &Session,
        store: &dyn SessionStore,
    ) -> PerStage<Option<RecipeSelection>> {
        let mut merged = session.selections.clone();
        let mut parent_id = session.parent_session_id.clone();

        for _ in 0..MAX_PARENT_DEPTH {
            let Some(id) = parent_id else {
                break;
            };
            let parent = match store.get(&id, &session.owner_id).await {
                Ok(Some(parent)) => parent,
                // A reaped or foreign parent simply ends the walk.
                Ok(None) | Err(_) => break,
            };

            for stage in [Stage::Main, Stage::Sub, Stage::Soup] {
                let slot = merged.get_mut(stage).expect("selectable stage");
                if slot.is_none() {
                    if let Some(Some(value)) = parent.selections.get(stage) {
                        debug!(
                            session_id = session.id.as_str(),
                            from = id.as_str(),
                            stage = stage.label_ja(),
                            "selection inherited from ancestor"
                        );
                        *slot = Some(value.clone());
                    }
                }
            }

            parent_id = parent.parent_session_id.clone();
        }

        merged
    }
}
