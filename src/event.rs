//! Observability events (ambient stack): a callback-based layer for watching
//! the Decision Cycle from outside — logging, metrics, a TUI — without
//! coupling those concerns into the cycle itself.

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::TokenUsage;
use crate::state_machine::BotState;
use crate::world::Danger;

/// Events emitted by the Agent Loop during one Decision Cycle. Every variant
/// that matters downstream carries enough context to be logged on its own.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    CycleStarted,
    CycleCompleted { duration_ms: u64 },
    CycleFailed { error: String },

    ObservationCompleted { dangers: Vec<Danger> },

    LlmCallStarted,
    LlmCallCompleted { tokens_used: Option<TokenUsage>, response_length: usize },

    ToolCallDetected { tool_name: String, parameters: Value },
    ToolExecutionCompleted { tool_name: String, success: bool, error: Option<String> },
    ToolMaxIterationsReached { max_iterations: usize },

    StateTransitioned { from: BotState, to: BotState },
    IllegalTransitionAttempted { from: BotState, to: BotState },
}

/// Implement to receive real-time notifications; every method has a no-op
/// default so handlers only override what they care about.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, _event: &AgentEvent) {}
}

/// Forwards every event to `log::info!`/`log::warn!` at a severity matching
/// the event's nature. Used as the default handler when none is configured.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_event(&self, event: &AgentEvent) {
        match event {
            AgentEvent::CycleFailed { error } => log::warn!("cycle failed: {}", error),
            AgentEvent::IllegalTransitionAttempted { from, to } => {
                log::warn!("illegal transition attempted: {:?} -> {:?}", from, to)
            }
            AgentEvent::ToolExecutionCompleted { tool_name, success: false, error } => {
                log::warn!("tool {} failed: {:?}", tool_name, error)
            }
            other => log::debug!("{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_handler_is_a_silent_noop() {
        struct Silent;
        #[async_trait]
        impl EventHandler for Silent {}
        let handler = Silent;
        handler.on_event(&AgentEvent::CycleStarted).await;
    }
}
