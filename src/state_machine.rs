//! The State Machine (C6): a fixed legal-transition table over bot activity
//! states, with bounded history and advisory-mutex semantics for the rest of
//! the crate — handlers that change what the bot is doing only run while the
//! machine reports an appropriate state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};

const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BotState {
    Idle,
    Planning,
    Mining,
    Crafting,
    Navigating,
    Combat,
    Eating,
    Gathering,
    Building,
    Error,
}

impl BotState {
    fn allowed_destinations(self) -> &'static [BotState] {
        use BotState::*;
        match self {
            Idle => &[Planning, Eating, Error],
            Planning => &[Mining, Crafting, Navigating, Gathering, Combat, Idle, Error],
            Mining => &[Idle, Navigating, Eating, Combat, Error],
            Crafting => &[Idle, Navigating, Error],
            Navigating => &[Idle, Mining, Crafting, Gathering, Building, Combat, Error],
            Combat => &[Idle, Navigating, Eating, Error],
            Eating => &[Idle, Mining, Navigating, Combat, Error],
            Gathering => &[Idle, Navigating, Mining, Error],
            Building => &[Idle, Navigating, Error],
            Error => &[Idle, Planning],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: BotState,
    pub to: BotState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

struct Inner {
    current: BotState,
    entered_at: DateTime<Utc>,
    history: Vec<StateTransition>,
}

/// Not `Send`-restricted on callbacks: `on_exit`/`on_enter` are plain closures
/// run synchronously, matching the advisory-mutex role this component plays —
/// there is no separate lock for "what the bot is doing".
pub struct StateMachine {
    inner: Mutex<Inner>,
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            inner: Mutex::new(Inner {
                current: BotState::Idle,
                entered_at: Utc::now(),
                history: Vec::new(),
            }),
        }
    }

    pub async fn current_state(&self) -> BotState {
        self.inner.lock().await.current
    }

    /// Returns true iff the transition was accepted. `to == current` is a
    /// no-op success. Runs `on_exit`/`on_enter` around the mutation; if either
    /// fails, reverts to `from` and reports the error.
    pub async fn transition(
        &self,
        to: BotState,
        reason: Option<String>,
        on_exit: impl FnOnce(BotState) -> Result<()>,
        on_enter: impl FnOnce(BotState) -> Result<()>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let from = inner.current;
        if to == from {
            return Ok(true);
        }
        if !from.allowed_destinations().contains(&to) {
            return Ok(false);
        }

        if let Err(e) = on_exit(from) {
            log::warn!("on_exit({:?}) failed, staying in {:?}: {}", from, from, e);
            return Err(e);
        }
        if let Err(e) = on_enter(to) {
            log::warn!("on_enter({:?}) failed, reverting to {:?}: {}", to, from, e);
            return Err(e);
        }

        inner.current = to;
        inner.entered_at = Utc::now();
        inner.history.push(StateTransition { from, to, timestamp: Utc::now(), reason });
        if inner.history.len() > HISTORY_CAPACITY {
            let excess = inner.history.len() - HISTORY_CAPACITY;
            inner.history.drain(0..excess);
        }
        Ok(true)
    }

    /// Convenience wrapper over `transition` for callers with no entry/exit
    /// side effects — the overwhelming majority of call sites.
    pub async fn transition_plain(&self, to: BotState, reason: Option<String>) -> bool {
        self.transition(to, reason, |_| Ok(()), |_| Ok(())).await.unwrap_or(false)
    }

    /// Always accepted, bypassing the legal-transition table.
    pub async fn transition_to_error(&self, reason: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        let from = inner.current;
        let reason = reason.into();
        log::error!("forced transition to error from {:?}: {}", from, reason);
        inner.current = BotState::Error;
        inner.entered_at = Utc::now();
        inner.history.push(StateTransition {
            from,
            to: BotState::Error,
            timestamp: Utc::now(),
            reason: Some(reason),
        });
        if inner.history.len() > HISTORY_CAPACITY {
            let excess = inner.history.len() - HISTORY_CAPACITY;
            inner.history.drain(0..excess);
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.current = BotState::Idle;
        inner.entered_at = Utc::now();
        inner.history.clear();
    }

    pub async fn is_idle(&self) -> bool {
        self.inner.lock().await.current == BotState::Idle
    }

    pub async fn is_busy(&self) -> bool {
        !matches!(self.inner.lock().await.current, BotState::Idle | BotState::Planning)
    }

    pub async fn is_error(&self) -> bool {
        self.inner.lock().await.current == BotState::Error
    }

    pub async fn time_in_current_state(&self) -> chrono::Duration {
        let inner = self.inner.lock().await;
        Utc::now() - inner.entered_at
    }

    pub async fn history(&self) -> Vec<StateTransition> {
        self.inner.lock().await.history.clone()
    }

    pub async fn statistics(&self) -> HashMap<BotState, u32> {
        let inner = self.inner.lock().await;
        let mut stats = HashMap::new();
        for t in &inner.history {
            *stats.entry(t.to).or_insert(0) += 1;
        }
        stats
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn legal_transition_chain() {
        let machine = StateMachine::new();
        assert!(machine.transition_plain(BotState::Planning, Some("plan".to_string())).await);
        assert_eq!(machine.current_state().await, BotState::Planning);

        assert!(machine.transition_plain(BotState::Mining, None).await);
        assert_eq!(machine.current_state().await, BotState::Mining);

        // mining has no edge to building.
        assert!(!machine.transition_plain(BotState::Building, None).await);
        assert_eq!(machine.current_state().await, BotState::Mining);

        assert!(machine.transition_plain(BotState::Idle, None).await);
        assert_eq!(machine.current_state().await, BotState::Idle);

        assert_eq!(machine.history().await.len(), 3);
    }

    #[tokio::test]
    async fn illegal_transition_leaves_state_unchanged() {
        let machine = StateMachine::new();
        // idle has no edge to mining directly.
        assert!(!machine.transition_plain(BotState::Mining, None).await);
        assert_eq!(machine.current_state().await, BotState::Idle);
        assert!(machine.history().await.is_empty());
    }

    #[tokio::test]
    async fn error_is_always_accepted_and_reset_clears_history() {
        let machine = StateMachine::new();
        machine.transition_plain(BotState::Planning, None).await;
        machine.transition_to_error("network down").await;
        assert!(machine.is_error().await);
        machine.reset().await;
        assert!(machine.is_idle().await);
        assert!(machine.history().await.is_empty());
    }

    #[tokio::test]
    async fn failing_on_enter_reverts_to_previous_state() {
        let machine = StateMachine::new();
        let result = machine
            .transition(BotState::Planning, None, |_| Ok(()), |_| Err(AgentError::DecisionCycleError("boom".to_string())))
            .await;
        assert!(result.is_err());
        assert_eq!(machine.current_state().await, BotState::Idle);
    }
}
