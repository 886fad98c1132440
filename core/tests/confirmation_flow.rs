//! Orchestrator round-trips: confirmation pause/resume and the staged
//! selection flow.

mod common;

use serde_json::json;
use std::sync::Arc;

use kondate_core::api::ProcessOutcome;
use kondate_core::config::AppConfig;
use kondate_core::executor::types::Task;
use kondate_core::{Orchestrator, Stage};

use common::{MemoryStore, QueuePlanner, RecordingSink, ScriptedDispatcher};

struct Harness {
    planner: Arc<QueuePlanner>,
    dispatcher: Arc<ScriptedDispatcher>,
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    orchestrator: Orchestrator,
}

fn harness() -> Harness {
    let planner = QueuePlanner::new();
    let dispatcher = ScriptedDispatcher::new();
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let orchestrator = Orchestrator::new(
        planner.clone(),
        dispatcher.clone(),
        store.clone(),
        sink.clone(),
        &AppConfig::default(),
    );
    Harness {
        planner,
        dispatcher,
        store,
        sink,
        orchestrator,
    }
}

fn two_curry_candidates() -> serde_json::Value {
    json!({"data": {"recipes": [
        {"id": 1, "title": "カレーライス"},
        {"id": 2, "title": "カレーうどん"},
    ]}})
}

#[tokio::test]
async fn candidate_ambiguity_pauses_then_resumes_without_replanning() {
    let h = harness();
    h.dispatcher
        .respond("find_recipes_by_title", two_curry_candidates());
    h.dispatcher
        .respond("update_recipe_by_title_oldest", json!({"data": {"id": 2}}));
    h.planner.push_plan(vec![Task::new(
        "t1",
        "recipe",
        "update_recipe_by_title",
    )
    .with_parameter("title", json!("カレー"))]);

    let outcome = h
        .orchestrator
        .process_request("カレーのレシピを更新して", "user-1", Some("s1"), false)
        .await
        .unwrap();

    let ProcessOutcome::Confirmation {
        message,
        confirmation_session_id,
    } = outcome
    else {
        panic!("expected a confirmation pause");
    };
    assert_eq!(confirmation_session_id, "s1");
    assert!(message.contains("カレーライス"));
    assert!(message.contains("最新"));

    // Nothing but the probe has run.
    assert!(!h
        .dispatcher
        .invoked_methods()
        .contains(&"update_recipe_by_title".to_string()));

    let outcome = h
        .orchestrator
        .process_request("一番古いので", "user-1", Some("s1"), true)
        .await
        .unwrap();

    let ProcessOutcome::Reply { text, .. } = outcome else {
        panic!("expected a reply after resume");
    };
    assert!(text.contains("完了"));

    // Resumed straight into the executor: planner ran exactly once, and
    // the rewritten variant carried the strategy tag plus the original
    // parameters.
    assert_eq!(h.planner.requests().len(), 1);
    let calls = h.dispatcher.calls_of("update_recipe_by_title_oldest");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["strategy"], json!("oldest"));
    assert_eq!(calls[0]["title"], json!("カレー"));
}

#[tokio::test]
async fn cancel_reply_stops_everything() {
    let h = harness();
    h.dispatcher
        .respond("find_recipes_by_title", two_curry_candidates());
    h.planner.push_plan(vec![Task::new(
        "t1",
        "recipe",
        "delete_recipe_by_title",
    )
    .with_parameter("title", json!("カレー"))]);

    h.orchestrator
        .process_request("カレーを消して", "user-1", Some("s1"), false)
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .process_request("やっぱりキャンセル", "user-1", Some("s1"), true)
        .await
        .unwrap();

    let ProcessOutcome::Reply { text, .. } = outcome else {
        panic!("expected a cancellation reply");
    };
    assert!(text.contains("キャンセル"));

    // No delete variant ever ran.
    assert!(h
        .dispatcher
        .invoked_methods()
        .iter()
        .all(|m| !m.starts_with("delete_recipe_by_title")));

    // Paused state was consumed: a second confirmation turn falls through
    // to planning and reports the missing state.
    h.planner
        .push_plan(vec![Task::new("t2", "recipe", "plain")]);
    let outcome = h
        .orchestrator
        .process_request("最新で", "user-1", Some("s1"), true)
        .await
        .unwrap();
    let ProcessOutcome::Reply { text, .. } = outcome else {
        panic!("expected fall-through reply");
    };
    assert!(text.contains("確認待ちの操作は見つかりませんでした"));
}

#[tokio::test]
async fn missing_parameter_reply_replans_with_merged_request() {
    let h = harness();

    // First plan: proposal without the optional ingredient.
    h.planner
        .push_plan(vec![Task::new("p1", "recipe", "propose_main_dish")]);
    // Second plan (after the merged request): proposal with ingredient.
    h.planner.push_plan(vec![Task::new(
        "p2",
        "recipe",
        "propose_main_dish",
    )
    .with_parameter("ingredient", json!("鶏肉"))]);

    h.dispatcher.respond(
        "propose_main_dish",
        json!({"data": {"candidates": [
            {"id": 11, "title": "唐揚げ", "cuisine": "和食", "ingredients": ["鶏肉"]},
            {"id": 12, "title": "チキン南蛮", "cuisine": "和食", "ingredients": ["鶏肉", "卵"]},
        ]}}),
    );

    let outcome = h
        .orchestrator
        .process_request("主菜を提案して", "user-1", Some("s1"), false)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::Confirmation { .. }));

    let outcome = h
        .orchestrator
        .process_request("鶏肉でお願いします", "user-1", Some("s1"), true)
        .await
        .unwrap();

    let ProcessOutcome::Reply {
        text,
        requires_selection,
        candidates,
        task_id,
    } = outcome
    else {
        panic!("expected a proposal reply");
    };
    assert!(requires_selection);
    assert!(text.contains("唐揚げ"));
    assert!(candidates.is_some());
    assert_eq!(task_id.as_deref(), Some("p2"));

    // The planner saw the original request, then the merged one.
    let requests = h.planner.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], "主菜を提案して");
    assert_eq!(requests[1], "鶏肉を使って 主菜を提案して");
}

#[tokio::test]
async fn selection_flow_walks_stages_to_a_complete_menu() {
    let h = harness();
    h.dispatcher.respond(
        "list_ingredients",
        json!({"data": {"ingredients": ["じゃがいも", "鶏肉"]}}),
    );

    // Main proposals.
    h.planner.push_plan(vec![Task::new(
        "p1",
        "recipe",
        "propose_main_dish",
    )
    .with_parameter("ingredient", json!("鶏肉"))]);
    h.dispatcher.respond(
        "propose_main_dish",
        json!({"data": {"candidates": [
            {"id": 11, "title": "唐揚げ", "cuisine": "和食", "ingredients": ["鶏肉"]},
        ]}}),
    );

    let outcome = h
        .orchestrator
        .process_request("鶏肉で主菜を提案して", "user-1", Some("s1"), false)
        .await
        .unwrap();
    let ProcessOutcome::Reply { task_id, .. } = outcome else {
        panic!("expected proposals");
    };
    let main_task = task_id.unwrap();

    let picked = h
        .orchestrator
        .process_user_selection(&main_task, 1, "s1", "user-1", None)
        .await
        .unwrap();
    assert!(picked.success);
    assert!(picked.requires_next_stage);
    assert_eq!(picked.next_stage_request.as_deref(), Some("副菜を提案して"));

    let session = h.store.snapshot("s1").await.unwrap();
    assert_eq!(session.current_stage, Stage::Sub);
    assert_eq!(session.used_ingredients, vec!["鶏肉"]);

    // Sub proposals, then pick.
    h.planner
        .push_plan(vec![Task::new("p2", "recipe", "propose_side_dish")]);
    h.dispatcher.respond(
        "propose_side_dish",
        json!({"data": {"candidates": [
            {"id": 21, "title": "ポテトサラダ", "ingredients": ["じゃがいも"]},
        ]}}),
    );
    h.orchestrator
        .process_request("副菜を提案して", "user-1", Some("s1"), false)
        .await
        .unwrap();
    let picked = h
        .orchestrator
        .process_user_selection("p2", 1, "s1", "user-1", None)
        .await
        .unwrap();
    assert_eq!(picked.next_stage_request.as_deref(), Some("汁物を提案して"));

    // Soup proposals, then the final pick completes the menu.
    h.planner
        .push_plan(vec![Task::new("p3", "recipe", "propose_soup")]);
    h.dispatcher.respond(
        "propose_soup",
        json!({"data": {"candidates": [
            {"id": 31, "title": "味噌汁", "ingredients": ["豆腐"]},
        ]}}),
    );
    h.orchestrator
        .process_request("汁物を提案して", "user-1", Some("s1"), false)
        .await
        .unwrap();
    let done = h
        .orchestrator
        .process_user_selection("p3", 1, "s1", "user-1", None)
        .await
        .unwrap();

    assert!(done.success);
    assert!(!done.requires_next_stage);
    let menu = done.menu.expect("completed flow returns the menu");
    assert_eq!(menu["category"], json!("和食"));
    assert_eq!(menu["main"]["title"], json!("唐揚げ"));
    assert_eq!(menu["sub"]["title"], json!("ポテトサラダ"));
    assert_eq!(menu["soup"]["title"], json!("味噌汁"));

    // Further selections are rejected: the flow is over.
    let rejected = h
        .orchestrator
        .process_user_selection("p3", 1, "s1", "user-1", None)
        .await
        .unwrap();
    assert!(!rejected.success);
}

#[tokio::test]
async fn index_zero_spawns_a_child_session_for_more_proposals() {
    let h = harness();
    h.planner.push_plan(vec![Task::new(
        "p1",
        "recipe",
        "propose_main_dish",
    )
    .with_parameter("ingredient", json!("鶏肉"))]);
    h.dispatcher.respond(
        "propose_main_dish",
        json!({"data": {"candidates": [
            {"id": 11, "title": "唐揚げ", "cuisine": "和食"},
        ]}}),
    );

    h.orchestrator
        .process_request("主菜を提案して", "user-1", Some("s1"), false)
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .process_user_selection("p1", 0, "s1", "user-1", None)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_ne!(outcome.session_id, "s1");
    assert!(!outcome.requires_next_stage);
    assert!(outcome
        .next_stage_request
        .as_deref()
        .unwrap()
        .contains("別の候補"));

    let child = h.store.snapshot(&outcome.session_id).await.unwrap();
    assert_eq!(child.parent_session_id.as_deref(), Some("s1"));
    // Proposal history carried over so new proposals never repeat.
    assert_eq!(child.proposed_titles.main, vec!["唐揚げ"]);
}

#[tokio::test]
async fn planner_failure_maps_to_a_generic_reply() {
    let h = harness();
    // No plan seeded: the planner errors.

    let outcome = h
        .orchestrator
        .process_request("なにかおいしいもの", "user-1", None, false)
        .await
        .unwrap();

    let ProcessOutcome::Reply {
        text,
        requires_selection,
        ..
    } = outcome
    else {
        panic!("expected generic failure reply");
    };
    assert!(!requires_selection);
    assert!(text.contains("処理できませんでした"));
    // Nothing was dispatched and no progress flowed.
    assert!(h.dispatcher.invoked_methods().is_empty());
    assert!(h.sink.progress_updates().is_empty());
}
