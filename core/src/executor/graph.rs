use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::ExecutorError;
use crate::executor::types::Task;

/// Dependency bookkeeping for one chain.
///
/// The executable group is computed per iteration against the set of
/// completed results rather than pre-scheduled: a task whose dependency
/// failed must stall exactly like a task inside a cycle, and a precomputed
/// schedule cannot express that.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<String, Task>,

    /// Original insertion order (for stable wavefront ordering)
    insertion_order: Vec<String>,
}

impl TaskGraph {
    /// Construct the graph from a task list, rejecting duplicate ids.
    pub fn from_tasks(tasks: &[Task]) -> Result<Self, ExecutorError> {
        let mut nodes = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            if nodes.contains_key(&task.id) {
                return Err(ExecutorError::DuplicateTaskId(task.id.clone()));
            }
            insertion_order.push(task.id.clone());
            nodes.insert(task.id.clone(), task.clone());
        }

        Ok(Self {
            nodes,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all tasks, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.insertion_order.iter()
    }

    /// The executable group: remaining tasks whose every dependency id is
    /// already in completed-results. Insertion order is preserved so the
    /// wavefront is stable for a given input.
    pub fn ready_ids(
        &self,
        completed: &HashMap<String, Value>,
        remaining: &HashSet<String>,
    ) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter(|id| remaining.contains(*id))
            .filter(|id| {
                self.nodes[*id]
                    .dependencies
                    .iter()
                    .all(|dep| completed.contains_key(dep))
            })
            .cloned()
            .collect()
    }

    /// One line per stalled task with its unmet dependencies, for the
    /// circular-dependency error message.
    pub fn stalled_summary(
        &self,
        completed: &HashMap<String, Value>,
        remaining: &HashSet<String>,
    ) -> String {
        self.insertion_order
            .iter()
            .filter(|id| remaining.contains(*id))
            .map(|id| {
                let unmet: Vec<&str> = self.nodes[id]
                    .dependencies
                    .iter()
                    .filter(|dep| !completed.contains_key(*dep))
                    .map(String::as_str)
                    .collect();
                format!("{} (waiting on: {})", id, unmet.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "recipe", "search_recipes")
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn all_remaining(graph: &TaskGraph) -> HashSet<String> {
        graph.ids().cloned().collect()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let tasks = vec![task("t1", &[]), task("t1", &[])];
        assert!(matches!(
            TaskGraph::from_tasks(&tasks),
            Err(ExecutorError::DuplicateTaskId(_))
        ));
    }

    #[test]
    fn ready_ids_follow_insertion_order() {
        let tasks = vec![task("b", &[]), task("a", &[]), task("c", &["a"])];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();

        let ready = graph.ready_ids(&HashMap::new(), &all_remaining(&graph));
        assert_eq!(ready, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn tasks_unblock_as_results_complete() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();

        let mut remaining = all_remaining(&graph);
        remaining.remove("a");
        let mut completed = HashMap::new();

        assert!(graph.ready_ids(&completed, &remaining).is_empty());

        completed.insert("a".to_string(), serde_json::json!({}));
        assert_eq!(graph.ready_ids(&completed, &remaining), vec!["b".to_string()]);
    }

    #[test]
    fn stalled_summary_names_unmet_dependencies() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();

        let summary = graph.stalled_summary(&HashMap::new(), &all_remaining(&graph));
        assert!(summary.contains("a (waiting on: b)"));
        assert!(summary.contains("b (waiting on: a)"));
    }
}
