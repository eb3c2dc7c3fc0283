//! Crate-wide error kinds.
//!
//! One variant per error kind named by the error-handling design: callers match
//! on kind rather than message text. Conversions from the underlying I/O/HTTP/JSON
//! errors are provided where the source is unambiguous.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("bot has not spawned yet")]
    BotNotSpawned,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("LLM error: {0}")]
    LLMError(String),

    #[error("tool validation error: {0}")]
    ToolValidationError(String),

    #[error("tool execution error: {0}")]
    ToolExecutionError(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("decision cycle error: {0}")]
    DecisionCycleError(String),
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::StorageError(e.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::LLMError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
