//! End-to-end executor behavior against a scripted dispatcher.

mod common;

use serde_json::json;
use std::sync::Arc;

use kondate_core::executor::types::Task;
use kondate_core::executor::TaskExecutor;
use kondate_core::ExecutionStatus;

use common::{RecordingSink, ScriptedDispatcher};

fn executor(
    dispatcher: Arc<ScriptedDispatcher>,
    sink: Arc<RecordingSink>,
) -> TaskExecutor {
    TaskExecutor::new(dispatcher, sink, 4)
}

#[tokio::test]
async fn dependent_tasks_run_in_wavefronts_with_injected_results() {
    let dispatcher = ScriptedDispatcher::new();
    dispatcher.respond("step_a", json!({"data": {"id": 7, "title": "肉じゃが"}}));

    let tasks = vec![
        Task::new("A", "recipe", "step_a"),
        Task::new("B", "recipe", "step_b")
            .with_dependencies(vec!["A".into()])
            .with_parameter("x", json!("A.result.data")),
        Task::new("C", "recipe", "step_c").with_dependencies(vec!["A".into()]),
    ];

    let sink = RecordingSink::new();
    let result = executor(dispatcher.clone(), sink.clone())
        .execute("s1", &tasks)
        .await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.outputs.len(), 3);
    assert!(["A", "B", "C"]
        .iter()
        .all(|id| result.outputs.contains_key(*id)));

    // A strictly precedes the second wavefront.
    let methods = dispatcher.invoked_methods();
    assert_eq!(methods[0], "step_a");
    assert_eq!(methods.len(), 3);

    // B saw A's resolved result, not the reference literal.
    let b_calls = dispatcher.calls_of("step_b");
    assert_eq!(b_calls[0]["x"], json!({"id": 7, "title": "肉じゃが"}));

    // One progress notification per wavefront.
    let updates = sink.progress_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].completed, 1);
    assert_eq!(updates[0].total, 3);
    assert_eq!(updates[1].completed, 3);
    assert_eq!(updates[1].pct, 100);
}

#[tokio::test]
async fn list_concatenation_resolves_across_wavefronts() {
    let dispatcher = ScriptedDispatcher::new();
    dispatcher.respond("left", json!({"data": ["a", "b"]}));
    dispatcher.respond("right", json!({"data": ["c"]}));

    let tasks = vec![
        Task::new("t1", "recipe", "left"),
        Task::new("t2", "recipe", "right"),
        Task::new("t3", "recipe", "merge")
            .with_dependencies(vec!["t1".into(), "t2".into()])
            .with_parameter("items", json!("t1.result.data + t2.result.data")),
    ];

    let result = executor(dispatcher.clone(), RecordingSink::new())
        .execute("s1", &tasks)
        .await;

    assert_eq!(result.status, ExecutionStatus::Success);
    let merge_calls = dispatcher.calls_of("merge");
    assert_eq!(merge_calls[0]["items"], json!(["a", "b", "c"]));
}

#[tokio::test]
async fn runtime_confirmation_discards_all_outputs() {
    let dispatcher = ScriptedDispatcher::new();
    dispatcher.respond_confirm(
        "confirmable",
        json!({"kind": "multiple_candidates", "candidates": []}),
        "どれにしますか？",
    );

    let tasks = vec![
        Task::new("A", "recipe", "confirmable"),
        Task::new("B", "recipe", "plain"),
    ];

    let result = executor(dispatcher, RecordingSink::new())
        .execute("s1", &tasks)
        .await;

    assert_eq!(result.status, ExecutionStatus::NeedsConfirmation);
    // Sibling B may well have succeeded inside the wavefront; the caller
    // still sees nothing.
    assert!(result.outputs.is_empty());
    let info = result.confirmation.expect("ambiguity info");
    assert_eq!(info.task_id, "A");
}

#[tokio::test]
async fn static_ambiguity_prevents_any_dispatch() {
    let dispatcher = ScriptedDispatcher::new();
    dispatcher.respond(
        "find_recipes_by_title",
        json!({"data": {"recipes": [
            {"id": 1, "title": "カレーライス"},
            {"id": 2, "title": "カレーうどん"},
        ]}}),
    );

    let tasks = vec![
        Task::new("t1", "recipe", "update_recipe_by_title")
            .with_parameter("title", json!("カレー")),
        Task::new("t2", "recipe", "plain"),
    ];

    let result = executor(dispatcher.clone(), RecordingSink::new())
        .execute("s1", &tasks)
        .await;

    assert_eq!(result.status, ExecutionStatus::NeedsConfirmation);
    // Only the detector's probe ran; no planned task was dispatched.
    let methods = dispatcher.invoked_methods();
    assert_eq!(methods, vec!["find_recipes_by_title".to_string()]);
}

#[tokio::test]
async fn true_cycle_terminates_with_circular_dependency() {
    let tasks = vec![
        Task::new("a", "recipe", "x").with_dependencies(vec!["c".into()]),
        Task::new("b", "recipe", "x").with_dependencies(vec!["a".into()]),
        Task::new("c", "recipe", "x").with_dependencies(vec!["b".into()]),
    ];

    let result = executor(ScriptedDispatcher::new(), RecordingSink::new())
        .execute("s1", &tasks)
        .await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result
        .message
        .as_deref()
        .unwrap()
        .contains("Circular dependency"));
    assert!(result.outputs.is_empty());
}

#[tokio::test]
async fn failed_dependency_reports_like_a_cycle() {
    let dispatcher = ScriptedDispatcher::new();
    dispatcher.respond_fail("broken", "backend unavailable");

    let tasks = vec![
        Task::new("a", "recipe", "broken"),
        Task::new("b", "recipe", "plain").with_dependencies(vec!["a".into()]),
    ];

    let result = executor(dispatcher, RecordingSink::new())
        .execute("s1", &tasks)
        .await;

    // The stall after an upstream failure is indistinguishable from a
    // cycle at the contract level; only the message names the culprit.
    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result.message.unwrap().contains("b (waiting on: a)"));
}
