//! Validated configuration loading.
//!
//! The agent's configuration surface is wide enough (game endpoint, LLM
//! provider knobs, persistence path, memory limits) to warrant a real file
//! format. Configuration loads from a TOML file, optionally overridden by
//! environment variables, and is validated eagerly: a missing `api_key` is
//! fatal at load time rather than surfacing on the first LLM call.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub version: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            host: "localhost".to_string(),
            port: 25565,
            username: "agent".to_string(),
            version: "1.20.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> usize {
    128_000
}
fn default_max_tool_iterations() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BotBehaviorConfig {
    #[serde(default)]
    pub auto_eat: bool,
    #[serde(default)]
    pub auto_armor: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_persistence_path")]
    pub path: PathBuf,
}

fn default_persistence_path() -> PathBuf {
    PathBuf::from("agent_data")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            path: default_persistence_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_keep_messages")]
    pub keep_messages: usize,
}

fn default_keep_messages() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            max_tokens: default_max_tokens(),
            keep_messages: default_keep_messages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub game: GameConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub bot: BotBehaviorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl AgentConfig {
    /// Loads configuration from `path`, then applies `AGENT_`-prefixed
    /// environment variable overrides for a handful of common deployment knobs,
    /// then validates. A missing API key is a fatal `ConfigInvalid`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::ConfigInvalid(format!("cannot read config file {:?}: {}", path, e))
        })?;
        let mut config: AgentConfig = toml::from_str(&raw)
            .map_err(|e| AgentError::ConfigInvalid(format!("malformed config: {}", e)))?;

        if let Ok(key) = std::env::var("AGENT_LLM_API_KEY") {
            config.llm.api_key = key;
        }
        if let Ok(host) = std::env::var("AGENT_GAME_HOST") {
            config.game.host = host;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AgentError::ConfigInvalid(
                "llm.api_key is required".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AgentError::ConfigInvalid(
                "llm.model is required".to_string(),
            ));
        }
        if self.memory.keep_messages == 0 {
            return Err(AgentError::ConfigInvalid(
                "memory.keep_messages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command-line entry point flags. The config file path defaults to
/// `agent.toml` in the current directory, overridable by `--config` or the
/// `AGENT_CONFIG` environment variable.
#[derive(Debug, clap::Parser)]
#[command(name = "gamecraft-agent", about = "Autonomous game agent control plane")]
pub struct Cli {
    #[arg(short, long, env = "AGENT_CONFIG", default_value = "agent.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_fatal() {
        let toml_src = r#"
            [llm]
            provider = "openai"
            model = "gpt-4.1"
        "#;
        let config: AgentConfig = toml::from_str(toml_src).unwrap();
        assert!(matches!(
            config.validate(),
            Err(AgentError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn valid_config_passes() {
        let toml_src = r#"
            [llm]
            provider = "openai"
            model = "gpt-4.1"
            api_key = "sk-test"
        "#;
        let config: AgentConfig = toml::from_str(toml_src).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.keep_messages, 20);
    }
}
