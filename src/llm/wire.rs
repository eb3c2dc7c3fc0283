//! OpenAI-compatible wire format shared by the non-streaming `chat()` path and
//! the streaming SSE consumer. JSON shapes follow the provider's Chat
//! Completions API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{ChatOptions, Message, ResponseFormat, Role};
use crate::tools::ToolMetadata;

#[derive(Debug, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        WireMessage {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireFunctionDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunctionDecl,
}

pub fn parameters_schema(tool: &ToolMetadata) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &tool.parameters {
        let mut prop = serde_json::Map::new();
        prop.insert(
            "type".to_string(),
            Value::String(
                match p.param_type {
                    crate::tools::ParameterType::String => "string",
                    crate::tools::ParameterType::Number => "number",
                    crate::tools::ParameterType::Boolean => "boolean",
                    crate::tools::ParameterType::Array => "array",
                    crate::tools::ParameterType::Object => "object",
                }
                .to_string(),
            ),
        );
        prop.insert("description".to_string(), Value::String(p.description.clone()));
        if let Some(min) = p.minimum {
            prop.insert("minimum".to_string(), serde_json::json!(min));
        }
        if let Some(max) = p.maximum {
            prop.insert("maximum".to_string(), serde_json::json!(max));
        }
        if let Some(values) = &p.enum_values {
            prop.insert("enum".to_string(), serde_json::json!(values));
        }
        properties.insert(p.name.clone(), Value::Object(prop));
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn tool_declarations_to_wire(tools: &[ToolMetadata]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|t| WireTool {
            kind: "function",
            function: WireFunctionDecl {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: parameters_schema(t),
            },
        })
        .collect()
}

pub fn response_format_to_wire(format: &ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::FreeText => None,
        ResponseFormat::JsonObject => Some(serde_json::json!({ "type": "json_object" })),
        ResponseFormat::JsonSchema { name, strict, schema } => Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": { "name": name, "strict": strict, "schema": schema }
        })),
    }
}

pub fn build_request_body(
    model: &str,
    messages: &[Message],
    tools: Option<&[ToolMetadata]>,
    options: &ChatOptions,
    stream: bool,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages.iter().map(WireMessage::from).collect::<Vec<_>>(),
        "stream": stream,
    });
    let obj = body.as_object_mut().expect("object literal");
    if let Some(t) = options.temperature {
        obj.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(mt) = options.max_tokens {
        obj.insert("max_tokens".to_string(), serde_json::json!(mt));
    }
    if let Some(tp) = options.top_p {
        obj.insert("top_p".to_string(), serde_json::json!(tp));
    }
    if let Some(fmt) = response_format_to_wire(&options.response_format) {
        obj.insert("response_format".to_string(), fmt);
    }
    if let Some(tools) = tools {
        if !tools.is_empty() {
            obj.insert("tools".to_string(), serde_json::json!(tool_declarations_to_wire(tools)));
        }
    }
    body
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct WireToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: WireToolCallFunction,
}

#[derive(Debug, Deserialize, Default)]
pub struct WireResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct WireChoice {
    pub message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct WireChatResponse {
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

// Streaming deltas never carry fragmented tool-call pieces here: complete
// invocations arrive out-of-band in a top-level `tool_calls` array on the
// same frame, parsed directly off the raw JSON value by the stream consumer.
#[derive(Debug, Deserialize, Default)]
pub struct WireDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireStreamChoice {
    #[serde(default)]
    pub delta: WireDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireStreamChunk {
    pub choices: Vec<WireStreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}
