use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::ambiguity::{AmbiguityDetector, AmbiguityInfo};
use crate::api::{DispatchOutcome, ProgressSink, ServiceDispatcher};
use crate::error::ExecutorError;
use crate::resolver::resolve_parameters;

use super::graph::TaskGraph;
use super::progress::ProgressUpdate;
use super::scheduler::{execute_wave_parallel, TaskOutcome, WaveOutcome};
use super::types::{ExecutionResult, Task, TaskTarget};

/// Drives a task chain to completion via dependency-ordered, per-wavefront
/// parallel dispatch.
pub struct TaskExecutor {
    dispatcher: Arc<dyn ServiceDispatcher>,
    progress: Arc<dyn ProgressSink>,
    detector: AmbiguityDetector,
    max_parallel: usize,
}

impl TaskExecutor {
    pub fn new(
        dispatcher: Arc<dyn ServiceDispatcher>,
        progress: Arc<dyn ProgressSink>,
        max_parallel: usize,
    ) -> Self {
        let detector = AmbiguityDetector::new(dispatcher.clone());
        Self {
            dispatcher,
            progress,
            detector,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Execute a chain. Chain-level failures fold into
    /// `ExecutionResult(Error, message)`; no partial outputs are exposed.
    pub async fn execute(&self, session_id: &str, tasks: &[Task]) -> ExecutionResult {
        match self.run(session_id, tasks).await {
            Ok(result) => result,
            Err(err) => {
                warn!(session_id, error = %err, "chain execution failed");
                ExecutionResult::error(err.to_string())
            }
        }
    }

    async fn run(
        &self,
        session_id: &str,
        tasks: &[Task],
    ) -> Result<ExecutionResult, ExecutorError> {
        // Static pre-pass over the whole plan, before any task runs.
        let ambiguity = self.detector.detect(tasks).await;
        if ambiguity.requires_confirmation {
            let info = ambiguity
                .ambiguous_tasks
                .into_iter()
                .next()
                .expect("requires_confirmation implies at least one ambiguous task");
            let message = info.render_message();
            debug!(session_id, task_id = info.task_id.as_str(), "plan is ambiguous");
            return Ok(ExecutionResult::needs_confirmation(info, message));
        }

        let graph = TaskGraph::from_tasks(tasks)?;
        let total = graph.len();
        let mut remaining: HashSet<String> = graph.ids().cloned().collect();
        let mut completed: HashMap<String, Value> = HashMap::new();
        let mut records: HashMap<String, Task> = graph.nodes.clone();
        let mut progress_count = 0usize;

        loop {
            let wave = graph.ready_ids(&completed, &remaining);

            if wave.is_empty() {
                if remaining.is_empty() {
                    debug!(session_id, completed = completed.len(), total, "chain finished");
                    return Ok(ExecutionResult::success(completed));
                }
                // True cycle or a failed upstream dependency; the two are
                // deliberately indistinguishable at this level.
                return Err(ExecutorError::CircularDependency(
                    graph.stalled_summary(&completed, &remaining),
                ));
            }

            debug!(session_id, wave = ?wave, "dispatching wavefront");

            // Mark the group Running and inject parameters against the
            // results completed so far.
            let mut prepared: HashMap<String, (TaskTarget, Map<String, Value>)> = HashMap::new();
            for id in &wave {
                let task = records
                    .get(id)
                    .expect("wavefront ids come from the graph")
                    .clone();
                let params = resolve_parameters(&task.parameters, &completed);
                prepared.insert(id.clone(), (task.target.clone(), params));
                records.insert(id.clone(), task.running());
            }

            let prepared = Arc::new(prepared);
            let dispatcher = self.dispatcher.clone();
            let run_task = move |task_id: String| {
                let prepared = prepared.clone();
                let dispatcher = dispatcher.clone();
                async move {
                    let (target, params) = prepared
                        .get(&task_id)
                        .expect("scheduler only sees prepared ids")
                        .clone();
                    let outcome =
                        match dispatcher.invoke(&target.service, &target.method, &params).await {
                            Ok(DispatchOutcome::Ok(value)) => WaveOutcome::Completed(value),
                            Ok(DispatchOutcome::NeedsConfirmation { context, message }) => {
                                WaveOutcome::NeedsConfirmation { context, message }
                            }
                            Err(err) => WaveOutcome::Failed(err.to_string()),
                        };
                    TaskOutcome { task_id, outcome }
                }
            };

            let outcomes = execute_wave_parallel(&wave, self.max_parallel, run_task).await;

            // A confirmation request from any task in the group aborts the
            // whole execution; outputs completed so far are discarded from
            // the caller's perspective.
            if let Some(paused) = outcomes
                .iter()
                .find(|o| matches!(o.outcome, WaveOutcome::NeedsConfirmation { .. }))
            {
                let WaveOutcome::NeedsConfirmation { context, message } = &paused.outcome else {
                    unreachable!()
                };
                let task = records
                    .get(&paused.task_id)
                    .expect("outcome ids come from the wavefront");
                let info = AmbiguityInfo::from_dispatch(task, context.clone(), message);
                records.insert(paused.task_id.clone(), task.waiting_for_user());
                debug!(
                    session_id,
                    task_id = paused.task_id.as_str(),
                    "dispatch requested confirmation, aborting chain"
                );
                return Ok(ExecutionResult::needs_confirmation(info, message.clone()));
            }

            let mut wave_successes = 0usize;
            let mut last_label = records
                .get(&wave[0])
                .map(|t| t.target.operation())
                .unwrap_or_default();

            for TaskOutcome { task_id, outcome } in outcomes {
                let task = records
                    .get(&task_id)
                    .expect("outcome ids come from the wavefront")
                    .clone();
                match outcome {
                    WaveOutcome::Completed(value) => {
                        last_label = task.target.operation();
                        completed.insert(task_id.clone(), value.clone());
                        records.insert(task_id.clone(), task.completed(value));
                        wave_successes += 1;
                    }
                    WaveOutcome::Failed(error) => {
                        // Recorded locally; siblings keep running and the
                        // chain continues. Dependents of this task stall
                        // into the circular-dependency path above.
                        warn!(session_id, task_id = task_id.as_str(), error = error.as_str(), "task failed");
                        records.insert(task_id.clone(), task.failed(error));
                    }
                    WaveOutcome::NeedsConfirmation { .. } => unreachable!("handled above"),
                }
                remaining.remove(&task_id);
            }

            progress_count += wave_successes;
            let update = ProgressUpdate::new(progress_count, total, last_label);
            self.progress.notify_progress(session_id, &update).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::executor::types::ExecutionStatus;

    /// Echoes resolved params back, with per-method scripted behavior.
    struct EchoDispatcher {
        invocations: Mutex<Vec<String>>,
    }

    impl EchoDispatcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                invocations: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ServiceDispatcher for EchoDispatcher {
        async fn invoke(
            &self,
            _service: &str,
            method: &str,
            params: &Map<String, Value>,
        ) -> Result<DispatchOutcome, ExecutorError> {
            self.invocations.lock().unwrap().push(method.to_string());
            match method {
                "fail" => Err(ExecutorError::Dispatch("scripted failure".into())),
                "confirm" => Ok(DispatchOutcome::NeedsConfirmation {
                    context: json!({"kind": "multiple_candidates"}),
                    message: "which one?".into(),
                }),
                _ => Ok(DispatchOutcome::Ok(json!({"data": {"method": method, "params": params}}))),
            }
        }
    }

    struct NullSink;

    #[async_trait]
    impl ProgressSink for NullSink {
        async fn notify_progress(&self, _session_id: &str, _update: &ProgressUpdate) {}
        async fn notify_complete(
            &self,
            _session_id: &str,
            _text: &str,
            _payload: Option<Value>,
            _confirmation: Option<Value>,
        ) {
        }
    }

    fn executor(dispatcher: Arc<EchoDispatcher>) -> TaskExecutor {
        TaskExecutor::new(dispatcher, Arc::new(NullSink), 4)
    }

    #[test]
    fn max_parallel_is_clamped_to_one() {
        let exec = TaskExecutor::new(EchoDispatcher::new(), Arc::new(NullSink), 0);
        assert_eq!(exec.max_parallel, 1);
    }

    #[tokio::test]
    async fn diamond_chain_completes_in_dependency_order() {
        let tasks = vec![
            Task::new("a", "recipe", "step_a"),
            Task::new("b", "recipe", "step_b")
                .with_dependencies(vec!["a".into()])
                .with_parameter("x", json!("a.result.data")),
            Task::new("c", "recipe", "step_c").with_dependencies(vec!["a".into()]),
        ];

        let dispatcher = EchoDispatcher::new();
        let result = executor(dispatcher.clone()).execute("s1", &tasks).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.outputs.len(), 3);

        let order = dispatcher.invocations.lock().unwrap().clone();
        assert_eq!(order[0], "step_a");
        assert!(order[1..].contains(&"step_b".to_string()));
        assert!(order[1..].contains(&"step_c".to_string()));
    }

    #[tokio::test]
    async fn dispatch_confirmation_discards_sibling_outputs() {
        let tasks = vec![
            Task::new("a", "recipe", "confirm"),
            Task::new("b", "recipe", "step_b"),
        ];

        let result = executor(EchoDispatcher::new()).execute("s1", &tasks).await;

        assert_eq!(result.status, ExecutionStatus::NeedsConfirmation);
        assert!(result.outputs.is_empty());
        assert!(result.confirmation.is_some());
    }

    #[tokio::test]
    async fn cycle_reports_circular_dependency() {
        let tasks = vec![
            Task::new("a", "recipe", "step_a").with_dependencies(vec!["b".into()]),
            Task::new("b", "recipe", "step_b").with_dependencies(vec!["a".into()]),
        ];

        let result = executor(EchoDispatcher::new()).execute("s1", &tasks).await;

        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.message.unwrap().contains("Circular dependency"));
    }

    #[tokio::test]
    async fn failed_upstream_stalls_dependents_into_cycle_error() {
        let tasks = vec![
            Task::new("a", "recipe", "fail"),
            Task::new("b", "recipe", "step_b").with_dependencies(vec!["a".into()]),
        ];

        let result = executor(EchoDispatcher::new()).execute("s1", &tasks).await;

        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.message.unwrap().contains("b (waiting on: a)"));
    }

    #[tokio::test]
    async fn failed_leaf_still_reaches_success_without_its_output() {
        let tasks = vec![
            Task::new("a", "recipe", "step_a"),
            Task::new("b", "recipe", "fail").with_dependencies(vec!["a".into()]),
            Task::new("c", "recipe", "step_c").with_dependencies(vec!["a".into()]),
        ];

        let result = executor(EchoDispatcher::new()).execute("s1", &tasks).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.outputs.contains_key("a"));
        assert!(result.outputs.contains_key("c"));
        assert!(!result.outputs.contains_key("b"));
    }
}
