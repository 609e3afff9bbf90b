//! Tool trait, registry and the tools that need nothing but the clock.
//!
//! Tools that reach the knowledge base live in the application crate and
//! are registered next to these at startup.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::debug;

use super::ToolSpec;
use crate::error::GenerationError;
use crate::models::ToolCall;

/// A function the model may call.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use ragbot_core::agent::Tool;
///
/// pub struct Shout;
///
/// #[async_trait]
/// impl Tool for Shout {
///     fn name(&self) -> &str { "shout" }
///     fn description(&self) -> &str { "Upper-case some text" }
///     fn parameters_schema(&self) -> Value {
///         json!({
///             "type": "object",
///             "properties": { "text": { "type": "string" } },
///             "required": ["text"]
///         })
///     }
///     async fn execute(&self, params: Value) -> Result<String> {
///         Ok(params["text"].as_str().unwrap_or("").to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"get_time"`.
    fn name(&self) -> &str;

    /// One line the model reads to decide whether to call the tool.
    fn description(&self) -> &str;

    /// OpenAI function-calling JSON Schema for the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object. The returned text is
    /// handed back to the model as the tool result.
    async fn execute(&self, params: Value) -> Result<String>;
}

/// Ordered set of tools available to the agent.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `get_time` and `echo`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GetTimeTool));
        registry.register(Box::new(EchoTool));
        registry
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Execute one model-requested call.
    ///
    /// Unknown names, arguments that are not a JSON object and tool
    /// failures all come back as [`GenerationError`]s.
    pub async fn invoke(&self, call: &ToolCall) -> Result<String, GenerationError> {
        let tool = self
            .find(&call.name)
            .ok_or_else(|| GenerationError::UnknownTool(call.name.clone()))?;

        let params = parse_arguments(&call.arguments).map_err(|reason| GenerationError::Tool {
            name: call.name.clone(),
            reason,
        })?;

        debug!(tool = %call.name, "executing tool call");
        tool.execute(params)
            .await
            .map_err(|e| GenerationError::Tool {
                name: call.name.clone(),
                reason: format!("{:#}", e),
            })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(json!({})),
        Ok(other) => Err(format!("arguments must be a JSON object, got {}", other)),
        Err(e) => Err(format!("malformed arguments: {}", e)),
    }
}

/// Current UTC time, ISO 8601 to the second.
pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Get the current time in ISO 8601 format"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the provided text"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        match params["text"].as_str() {
            Some(text) if !text.is_empty() => Ok(format!("You said: {}", text)),
            _ => Ok("No text provided.".to_string()),
        }
    }
}
