//! The Tool Registry & Dispatcher (C5): declarative schema, validation,
//! execution, and normalized results.
//!
//! Tool handlers are expressed as a registry of `(ToolMetadata, handler)`
//! values behind a common function-object signature, not an inheritance
//! hierarchy over handler types.

mod game_tools;

pub use game_tools::{register_game_tools, ToolContext};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParameterType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterType>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        ToolParameter {
            name: name.into(),
            param_type,
            description: String::new(),
            required: false,
            enum_values: None,
            minimum: None,
            maximum: None,
            default: None,
            items: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        ToolMetadata {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        ToolResult { success: true, message: message.into(), data, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        ToolResult {
            success: false,
            message: String::new(),
            data: None,
            error: Some(error),
        }
    }

    /// The value the LLM bridge reports back to the model as the tool's
    /// response: prefers `data`, else `message`, else `{success}`.
    pub fn to_model_response(&self) -> Value {
        if let Some(data) = &self.data {
            data.clone()
        } else if !self.message.is_empty() {
            Value::String(self.message.clone())
        } else {
            serde_json::json!({ "success": self.success })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    MissingId,
    MissingName,
    UnknownTool(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::MissingId => write!(f, "Tool call ID is required"),
            ToolError::MissingName => write!(f, "Tool call name is required"),
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
        }
    }
}

impl std::error::Error for ToolError {}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

pub type ToolHandler =
    Arc<dyn Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult> + Send>> + Send + Sync>;

struct RegisteredTool {
    metadata: ToolMetadata,
    handler: ToolHandler,
}

/// A flat, in-process registry of game tools. Every handler is a local
/// synchronous actor on the bot — there is no multi-protocol routing layer,
/// since this crate's tools are never remote.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: HashMap::new() }
    }

    pub fn add_tool(&mut self, metadata: ToolMetadata, handler: ToolHandler) {
        let name = metadata.name.clone();
        self.tools.insert(name, RegisteredTool { metadata, handler });
    }

    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        self.tools.values().map(|t| t.metadata.clone()).collect()
    }

    pub fn validate_tool_call(&self, call: &ToolCall) -> Result<(), ToolError> {
        if call.id.is_empty() {
            return Err(ToolError::MissingId);
        }
        if call.name.is_empty() {
            return Err(ToolError::MissingName);
        }
        if !self.tools.contains_key(&call.name) {
            return Err(ToolError::UnknownTool(call.name.clone()));
        }
        Ok(())
    }

    /// Validates, invokes the handler, and returns a normalized `ToolResult`.
    /// Never propagates an error across the boundary: validation failures and
    /// unknown tools are returned as `{success: false, error}`.
    pub async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        if let Err(e) = self.validate_tool_call(call) {
            return ToolResult::failure(e.to_string());
        }
        let tool = self.tools.get(&call.name).expect("validated above");
        (tool.handler)(call.arguments.clone()).await
    }

    /// Processes calls sequentially, never short-circuiting on failure (I10).
    pub async fn execute_tool_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_tool(call).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_id_is_rejected_before_handler_runs() {
        let mut registry = ToolRegistry::new();
        registry.add_tool(
            ToolMetadata::new("get_position", "returns position"),
            Arc::new(|_args| Box::pin(async { ToolResult::success("ok", None) })),
        );
        let call = ToolCall { id: String::new(), name: "get_position".to_string(), arguments: serde_json::json!({}) };
        let result = registry.execute_tool(&call).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool call ID is required"));
    }

    #[tokio::test]
    async fn batch_never_drops_results_on_failure() {
        let mut registry = ToolRegistry::new();
        registry.add_tool(
            ToolMetadata::new("ok_tool", ""),
            Arc::new(|_| Box::pin(async { ToolResult::success("done", None) })),
        );
        let calls = vec![
            ToolCall { id: "1".to_string(), name: "ok_tool".to_string(), arguments: serde_json::json!({}) },
            ToolCall { id: "2".to_string(), name: "missing_tool".to_string(), arguments: serde_json::json!({}) },
            ToolCall { id: "3".to_string(), name: "ok_tool".to_string(), arguments: serde_json::json!({}) },
        ];
        let results = registry.execute_tool_batch(&calls).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
    }
}
