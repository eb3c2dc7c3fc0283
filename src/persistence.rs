//! The Persistence Port (C1): three bounded, append-only collections —
//! Goals, Messages, WorldStates — backed by one newline-delimited JSON file
//! each. Schema is initialized idempotently at open: a missing file is
//! created empty, an existing one is loaded back into memory. No
//! hash-chaining: there is no tamper-evidence requirement for this data.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::goals::{Goal, GoalStatus};
use crate::llm::{Message, Role};
use crate::world::Position;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldStateRow {
    pub id: u64,
    pub position: Position,
    pub health: f64,
    pub food: f64,
    pub dimension: String,
    pub recorded_at: DateTime<Utc>,
}

struct Inner {
    goals: Vec<Goal>,
    messages: Vec<StoredMessage>,
    world_states: Vec<WorldStateRow>,
    next_message_id: u64,
    next_world_state_id: u64,
}

pub struct PersistencePort {
    goals_path: PathBuf,
    messages_path: PathBuf,
    world_states_path: PathBuf,
    state: Mutex<Inner>,
}

fn load_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(line)?);
    }
    Ok(rows)
}

fn append_jsonl<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let line = serde_json::to_string(row)?;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line).map_err(AgentError::from)?;
    Ok(())
}

fn rewrite_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut buf = String::new();
    for row in rows {
        buf.push_str(&serde_json::to_string(row)?);
        buf.push('\n');
    }
    std::fs::write(path, buf)?;
    Ok(())
}

impl PersistencePort {
    /// Opens (creating if absent) the three collections under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let goals_path = dir.join("goals.jsonl");
        let messages_path = dir.join("messages.jsonl");
        let world_states_path = dir.join("world_states.jsonl");

        let goals: Vec<Goal> = load_jsonl(&goals_path)?;
        let messages: Vec<StoredMessage> = load_jsonl(&messages_path)?;
        let world_states: Vec<WorldStateRow> = load_jsonl(&world_states_path)?;

        let next_message_id = messages.last().map(|m| m.id + 1).unwrap_or(0);
        let next_world_state_id = world_states.last().map(|w| w.id + 1).unwrap_or(0);

        Ok(PersistencePort {
            goals_path,
            messages_path,
            world_states_path,
            state: Mutex::new(Inner { goals, messages, world_states, next_message_id, next_world_state_id }),
        })
    }

    pub async fn insert_goal(&self, goal: Goal) -> Result<()> {
        let mut inner = self.state.lock().await;
        append_jsonl(&self.goals_path, &goal)?;
        inner.goals.push(goal);
        Ok(())
    }

    pub async fn get_goal(&self, id: &str) -> Option<Goal> {
        self.state.lock().await.goals.iter().find(|g| g.id == id).cloned()
    }

    pub async fn update_goal_status(&self, id: &str, status: GoalStatus) -> Result<()> {
        let mut inner = self.state.lock().await;
        let goal = inner
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| AgentError::StorageError(format!("no such goal {}", id)))?;
        goal.status = status;
        goal.completed_at = if matches!(status, GoalStatus::Completed) { Some(Utc::now()) } else { None };
        let snapshot = inner.goals.clone();
        rewrite_jsonl(&self.goals_path, &snapshot)?;
        Ok(())
    }

    pub async fn get_pending_goals(&self) -> Vec<Goal> {
        let mut pending: Vec<Goal> = self
            .state
            .lock()
            .await
            .goals
            .iter()
            .filter(|g| matches!(g.status, GoalStatus::Pending))
            .cloned()
            .collect();
        pending.sort_by_key(|g| g.priority);
        pending
    }

    pub async fn insert_message(&self, role: Role, content: String) -> Result<u64> {
        let mut inner = self.state.lock().await;
        let id = inner.next_message_id;
        inner.next_message_id += 1;
        let row = StoredMessage { id, role, content, created_at: Utc::now() };
        append_jsonl(&self.messages_path, &row)?;
        inner.messages.push(row);
        Ok(id)
    }

    /// The last `n` messages, newest first. This ordering is a contract:
    /// consumers reverse it to restore chronology.
    pub async fn get_recent_messages(&self, n: usize) -> Vec<StoredMessage> {
        let inner = self.state.lock().await;
        inner.messages.iter().rev().take(n).cloned().collect()
    }

    pub async fn clear_old_messages(&self, keep_last: usize) -> Result<()> {
        let mut inner = self.state.lock().await;
        if inner.messages.len() > keep_last {
            let excess = inner.messages.len() - keep_last;
            inner.messages.drain(0..excess);
        }
        let snapshot = inner.messages.clone();
        rewrite_jsonl(&self.messages_path, &snapshot)?;
        Ok(())
    }

    pub async fn insert_world_state(&self, position: Position, health: f64, food: f64, dimension: String) -> Result<u64> {
        let mut inner = self.state.lock().await;
        let id = inner.next_world_state_id;
        inner.next_world_state_id += 1;
        let row = WorldStateRow { id, position, health, food, dimension, recorded_at: Utc::now() };
        append_jsonl(&self.world_states_path, &row)?;
        inner.world_states.push(row);
        Ok(id)
    }

    pub async fn get_latest_world_state(&self) -> Option<WorldStateRow> {
        self.state.lock().await.world_states.last().cloned()
    }
}

/// Materializes a `StoredMessage` into the in-memory `Message` shape Memory
/// and the LLM bridge operate on, discarding persistence-only fields.
pub fn into_message(row: StoredMessage) -> Message {
    Message { role: row.role, content: row.content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::GoalType;

    #[tokio::test]
    async fn insert_goal_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let port = PersistencePort::open(dir.path()).unwrap();
        let goal = Goal::new("mine diamonds", GoalType::Main, 1);
        let id = goal.id.clone();
        port.insert_goal(goal.clone()).await.unwrap();
        let fetched = port.get_goal(&id).await.unwrap();
        assert_eq!(fetched.description, goal.description);
    }

    #[tokio::test]
    async fn insert_message_then_recent_returns_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let port = PersistencePort::open(dir.path()).unwrap();
        port.insert_message(Role::User, "hello".to_string()).await.unwrap();
        let recent = port.get_recent_messages(1).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "hello");
    }

    #[tokio::test]
    async fn reopen_loads_persisted_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let port = PersistencePort::open(dir.path()).unwrap();
            port.insert_message(Role::User, "m1".to_string()).await.unwrap();
            port.insert_message(Role::Assistant, "m2".to_string()).await.unwrap();
        }
        let reopened = PersistencePort::open(dir.path()).unwrap();
        let recent = reopened.get_recent_messages(10).await;
        assert_eq!(recent.len(), 2);
        // newest first.
        assert_eq!(recent[0].content, "m2");
    }

    #[tokio::test]
    async fn clear_old_messages_retains_only_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let port = PersistencePort::open(dir.path()).unwrap();
        for i in 0..10 {
            port.insert_message(Role::User, format!("m_{}", i)).await.unwrap();
        }
        port.clear_old_messages(3).await.unwrap();
        let recent = port.get_recent_messages(100).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "m_9");
    }
}
