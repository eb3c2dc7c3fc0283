//! The Memory Store (C4): the working conversation context the Agent Loop
//! builds for every `chat_with_tools` exchange, plus its token-budget trim
//! and its bridge to Persistence.
//!
//! Trim policy: rather than estimating tokens locally message by message,
//! Memory trusts the most recent usage the LLM itself reported and reacts to
//! *that* crossing `max_tokens`, truncating wholesale to `keep_messages`
//! entries in one step.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::goals::{Goal, GoalStatus};
use crate::llm::{Message, Role, TokenUsage};
use crate::persistence::{into_message, PersistencePort};
use crate::world::WorldSnapshot;

#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub include_world_summary: bool,
    pub include_goals: bool,
}

struct Inner {
    system_message: String,
    messages: Vec<Message>,
    last_snapshot: Option<WorldSnapshot>,
    active_goals: Vec<Goal>,
    token_usage: TokenUsage,
}

pub struct Memory {
    persistence: Arc<PersistencePort>,
    max_tokens: usize,
    keep_messages: usize,
    state: Mutex<Inner>,
}

const DEFAULT_SYSTEM_MESSAGE: &str = "You are an autonomous agent playing a survival game. Use the available tools to progress.";

impl Memory {
    pub fn new(persistence: Arc<PersistencePort>, max_tokens: usize, keep_messages: usize) -> Self {
        Memory {
            persistence,
            max_tokens,
            keep_messages,
            state: Mutex::new(Inner {
                system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
                messages: Vec::new(),
                last_snapshot: None,
                active_goals: Vec::new(),
                token_usage: TokenUsage::default(),
            }),
        }
    }

    pub async fn set_system_message(&self, content: impl Into<String>) {
        self.state.lock().await.system_message = content.into();
    }

    pub async fn update_token_usage(&self, usage: TokenUsage) {
        let mut inner = self.state.lock().await;
        inner.token_usage = usage;
        self.trim_locked(&mut inner);
    }

    pub async fn update_world_snapshot(&self, snapshot: WorldSnapshot) {
        self.state.lock().await.last_snapshot = Some(snapshot);
    }

    pub async fn set_active_goals(&self, goals: Vec<Goal>) {
        self.state.lock().await.active_goals = goals;
    }

    /// Appends `m`, then auto-trims per I9: if the last reported
    /// `token_usage.prompt` exceeds `max_tokens`, the message list is
    /// truncated to the most recent `keep_messages` entries.
    pub async fn add_message(&self, m: Message) {
        let mut inner = self.state.lock().await;
        inner.messages.push(m);
        self.trim_locked(&mut inner);
    }

    fn trim_locked(&self, inner: &mut Inner) {
        if inner.token_usage.prompt > self.max_tokens as u64 && inner.messages.len() > self.keep_messages {
            let excess = inner.messages.len() - self.keep_messages;
            inner.messages.drain(0..excess);
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    /// Assembles the sequence sent to the LLM: a synthesized system message
    /// (stored content plus, if requested, a world summary and a goals
    /// bullet list), followed by the stored messages in chronological order.
    pub async fn build_context(&self, options: &ContextOptions) -> Vec<Message> {
        let inner = self.state.lock().await;
        let mut system = inner.system_message.clone();

        if options.include_world_summary {
            if let Some(s) = &inner.last_snapshot {
                system.push_str(&format!(
                    "\n\nCurrent situation: position ({:.1}, {:.1}, {:.1}), health {:.0}/20, food {:.0}/20, dimension {}.",
                    s.position.x, s.position.y, s.position.z, s.health, s.food, s.dimension
                ));
            }
        }

        if options.include_goals {
            let active: Vec<&Goal> = inner
                .active_goals
                .iter()
                .filter(|g| matches!(g.status, GoalStatus::Pending | GoalStatus::InProgress))
                .collect();
            if !active.is_empty() {
                system.push_str("\n\nActive goals:");
                for g in active {
                    system.push_str(&format!("\n- {}", g.description));
                }
            }
        }

        let mut sequence = vec![Message::system(system)];
        sequence.extend(inner.messages.iter().cloned());
        sequence
    }

    /// Appends every in-memory message to Persistence.
    pub async fn save_to_database(&self) -> Result<()> {
        let messages = self.state.lock().await.messages.clone();
        for m in messages {
            self.persistence.insert_message(m.role, m.content).await?;
        }
        Ok(())
    }

    /// Replaces the in-memory message list with the `n` most recent
    /// Persistence rows, reversed into chronological order (I8).
    pub async fn load_from_database(&self, n: usize) -> Result<()> {
        let rows = self.persistence.get_recent_messages(n).await;
        let mut chronological: Vec<Message> = rows.into_iter().rev().map(into_message).collect();
        let mut inner = self.state.lock().await;
        inner.messages.clear();
        inner.messages.append(&mut chronological);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_with(max_tokens: usize, keep_messages: usize) -> Memory {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(PersistencePort::open(dir.path()).unwrap());
        Memory::new(persistence, max_tokens, keep_messages)
    }

    #[tokio::test]
    async fn token_budget_trim_keeps_most_recent() {
        let memory = memory_with(100, 5).await;
        memory.update_token_usage(TokenUsage { prompt: 200, completion: 0, total: 200 }).await;
        for i in 1..=50 {
            memory.add_message(Message::user(format!("m_{}", i))).await;
        }
        let messages = memory.messages().await;
        assert_eq!(messages.len(), 5);
        assert_eq!(messages.last().unwrap().content, "m_50");
    }

    #[tokio::test]
    async fn no_trim_while_under_token_budget() {
        let memory = memory_with(100_000, 5).await;
        for i in 1..=10 {
            memory.add_message(Message::user(format!("m_{}", i))).await;
        }
        assert_eq!(memory.messages().await.len(), 10);
    }

    #[tokio::test]
    async fn build_context_prepends_synthesized_system_message() {
        let memory = memory_with(100_000, 20).await;
        memory.add_message(Message::user("hi")).await;
        let context = memory.build_context(&ContextOptions::default()).await;
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, Role::System);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_chronologically() {
        let memory = memory_with(100_000, 20).await;
        memory.add_message(Message::user("m1")).await;
        memory.add_message(Message::assistant("m2")).await;
        memory.save_to_database().await.unwrap();

        memory.load_from_database(10).await.unwrap();
        let messages = memory.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "m1");
        assert_eq!(messages[1].content, "m2");
    }
}
