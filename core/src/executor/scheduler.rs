use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use serde_json::Value;

/// How one task in a wavefront ended.
#[derive(Debug, Clone)]
pub enum WaveOutcome {
    Completed(Value),
    Failed(String),
    NeedsConfirmation { context: Value, message: String },
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub outcome: WaveOutcome,
}

/// Dispatch one wavefront concurrently and await the whole group.
///
/// This is a fan-out/fan-in barrier: there is no partial harvesting, and a
/// slow task delays the next wavefront. One task's failure never aborts
/// sibling dispatches; every outcome is collected and the caller decides.
/// No ordering is guaranteed among tasks within the group.
pub async fn execute_wave_parallel<F, Fut>(
    task_ids: &[String],
    max_concurrency: usize,
    run_task: F,
) -> Vec<TaskOutcome>
where
    F: Fn(String) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = TaskOutcome> + Send,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for id in task_ids {
        let task_id = id.clone();
        let sem = sem.clone();
        let run = run_task.clone();

        futs.push(async move {
            let _permit = match sem.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return TaskOutcome {
                        task_id: task_id.clone(),
                        outcome: WaveOutcome::Failed("semaphore closed unexpectedly".into()),
                    }
                }
            };

            run(task_id).await
        });
    }

    let mut results = Vec::with_capacity(task_ids.len());
    while let Some(outcome) = futs.next().await {
        results.push(outcome);
    }

    results
}
