//! Goal/Task decomposition and dependency scheduling (§4.8).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalType {
    Main,
    Sub,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub goal_type: GoalType,
    pub description: String,
    pub priority: u32,
    pub status: GoalStatus,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(description: impl Into<String>, goal_type: GoalType, priority: u32) -> Self {
        Goal {
            id: Uuid::new_v4().to_string(),
            goal_type,
            description: description.into(),
            priority,
            status: GoalStatus::Pending,
            parent_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub goal_id: String,
    pub description: String,
    pub action_name: String,
    pub parameters: serde_json::Value,
    pub priority: u32,
    pub status: TaskStatus,
    pub dependencies: Vec<String>,
    pub estimated_duration_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// A DAG of tasks scoped to a single goal. Dependency ids are validated at
/// insertion time: every dependency must already exist within the same goal (I7).
#[derive(Default)]
pub struct TaskGraph {
    tasks: HashMap<String, Task>,
    insertion_order: Vec<String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        TaskGraph::default()
    }

    pub fn add_task(
        &mut self,
        goal_id: &str,
        description: impl Into<String>,
        action_name: impl Into<String>,
        parameters: serde_json::Value,
        priority: u32,
        dependencies: Vec<String>,
    ) -> Result<String, String> {
        for dep in &dependencies {
            match self.tasks.get(dep) {
                Some(t) if t.goal_id == goal_id => {}
                Some(_) => return Err(format!("dependency {} belongs to a different goal", dep)),
                None => return Err(format!("dependency {} does not exist", dep)),
            }
        }
        let id = Uuid::new_v4().to_string();
        let status = if dependencies.is_empty() { TaskStatus::Pending } else { TaskStatus::Blocked };
        let task = Task {
            id: id.clone(),
            goal_id: goal_id.to_string(),
            description: description.into(),
            action_name: action_name.into(),
            parameters,
            priority,
            status,
            dependencies,
            estimated_duration_secs: None,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        };
        self.tasks.insert(id.clone(), task);
        self.insertion_order.push(id.clone());
        self.refresh_blocked_tasks(goal_id);
        Ok(id)
    }

    fn refresh_blocked_tasks(&mut self, goal_id: &str) {
        let ready: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.goal_id == goal_id && t.status == TaskStatus::Blocked)
            .filter(|t| t.dependencies.iter().all(|d| self.tasks.get(d).map(|dt| dt.status == TaskStatus::Completed).unwrap_or(false)))
            .map(|t| t.id.clone())
            .collect();
        for id in ready {
            if let Some(t) = self.tasks.get_mut(&id) {
                t.status = TaskStatus::Pending;
            }
        }
    }

    /// The first pending task (by priority, ties broken by insertion order)
    /// whose dependencies are all completed.
    pub fn get_next_executable_task(&self, goal_id: &str) -> Option<&Task> {
        let mut candidates: Vec<&Task> = self
            .insertion_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.goal_id == goal_id && t.status == TaskStatus::Pending)
            .collect();
        candidates.sort_by_key(|t| t.priority);
        candidates.into_iter().next()
    }

    pub fn complete_task(&mut self, id: &str) -> Result<(), String> {
        let goal_id = {
            let task = self.tasks.get_mut(id).ok_or_else(|| format!("no such task {}", id))?;
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            task.goal_id.clone()
        };
        self.refresh_blocked_tasks(&goal_id);
        Ok(())
    }

    pub fn fail_task(&mut self, id: &str, error: impl Into<String>) -> Result<(), String> {
        let task = self.tasks.get_mut(id).ok_or_else(|| format!("no such task {}", id))?;
        task.status = TaskStatus::Failed;
        task.completed_at = None;
        task.error = Some(error.into());
        Ok(())
    }

    /// Percentage of tasks in `goal_id` with status = completed, truncated
    /// to the nearest integer (2 of 3 complete is 66, not 67).
    pub fn get_progress(&self, goal_id: &str) -> u32 {
        let tasks: Vec<&Task> = self.tasks.values().filter(|t| t.goal_id == goal_id).collect();
        if tasks.is_empty() {
            return 0;
        }
        let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
        (completed as u32 * 100) / tasks.len() as u32
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks_for_goal(&self, goal_id: &str) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.goal_id == goal_id).collect()
    }

    /// Every dependency id resolves to a task of the same goal (I7), checked
    /// across the whole graph; useful as an invariant assertion in tests.
    pub fn dependencies_well_formed(&self) -> bool {
        let ids: HashSet<&String> = self.tasks.keys().collect();
        self.tasks.values().all(|t| {
            t.dependencies.iter().all(|d| {
                ids.contains(d) && self.tasks.get(d).map(|dt| dt.goal_id == t.goal_id).unwrap_or(false)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_dag_resolves_in_dependency_order() {
        let goal_id = "goal-1";
        let mut graph = TaskGraph::new();
        let t1 = graph.add_task(goal_id, "t1", "noop", serde_json::json!({}), 1, vec![]).unwrap();
        let t2 = graph.add_task(goal_id, "t2", "noop", serde_json::json!({}), 1, vec![t1.clone()]).unwrap();
        let t3 = graph.add_task(goal_id, "t3", "noop", serde_json::json!({}), 1, vec![t2.clone()]).unwrap();

        assert_eq!(graph.get_next_executable_task(goal_id).unwrap().id, t1);
        graph.complete_task(&t1).unwrap();
        assert_eq!(graph.get_next_executable_task(goal_id).unwrap().id, t2);
        graph.complete_task(&t2).unwrap();
        assert_eq!(graph.get_next_executable_task(goal_id).unwrap().id, t3);
        assert_eq!(graph.get_progress(goal_id), 66);
        graph.complete_task(&t3).unwrap();
        assert_eq!(graph.get_progress(goal_id), 100);
    }

    #[test]
    fn completed_at_set_iff_completed() {
        let goal_id = "goal-1";
        let mut graph = TaskGraph::new();
        let t1 = graph.add_task(goal_id, "t1", "noop", serde_json::json!({}), 1, vec![]).unwrap();
        assert!(graph.task(&t1).unwrap().completed_at.is_none());
        graph.complete_task(&t1).unwrap();
        assert!(graph.task(&t1).unwrap().completed_at.is_some());
    }

    #[test]
    fn cross_goal_dependency_is_rejected() {
        let mut graph = TaskGraph::new();
        let t1 = graph.add_task("goal-a", "t1", "noop", serde_json::json!({}), 1, vec![]).unwrap();
        let result = graph.add_task("goal-b", "t2", "noop", serde_json::json!({}), 1, vec![t1]);
        assert!(result.is_err());
    }
}
