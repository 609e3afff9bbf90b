//! OpenAI-compatible chat-completions backend for the agent graph.
//!
//! Speaks `POST {base_url}/chat/completions` with bearer auth, so any
//! endpoint implementing that API (OpenAI, Azure-style proxies, local
//! gateways) works by changing `OPENAI_BASE_URL`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ragbot_core::agent::{ChatModel, ModelReply, ToolSpec};
use ragbot_core::models::{ConversationTurn, Role, ToolCall, ToolPayload};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;

pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.model.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.model.base_url.trim_end_matches('/')
            ),
            api_key,
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
        })
    }

    fn request_body(&self, messages: &[ConversationTurn], tools: &[ToolSpec]) -> Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages.iter().map(turn_to_message).collect::<Vec<_>>(),
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(tool_to_function).collect());
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ConversationTurn], tools: &[ToolSpec]) -> Result<ModelReply> {
        let body = self.request_body(messages, tools);
        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("chat completion error {}: {}", status, text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("invalid chat completion response")?;
        parse_reply(parsed)
    }
}

/// One conversation turn in the chat-completions message format.
fn turn_to_message(turn: &ConversationTurn) -> Value {
    match (&turn.role, &turn.tool) {
        (Role::Assistant, Some(ToolPayload::Requested { calls })) => json!({
            "role": "assistant",
            "content": if turn.content.is_empty() { Value::Null } else { json!(turn.content) },
            "tool_calls": calls.iter().map(|c| json!({
                "id": c.id,
                "type": "function",
                "function": { "name": c.name, "arguments": c.arguments },
            })).collect::<Vec<_>>(),
        }),
        (Role::Tool, Some(ToolPayload::Result { call_id, .. })) => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": turn.content,
        }),
        (role, _) => json!({
            "role": role.as_str(),
            "content": turn.content,
        }),
    }
}

fn tool_to_function(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        }
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    /// Absent or `null` when the model answered in text.
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_reply(response: ChatResponse) -> Result<ModelReply> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))?;

    let content = message.content.unwrap_or_default();
    let tool_calls = message.tool_calls.unwrap_or_default();
    if tool_calls.is_empty() {
        return Ok(ModelReply::Text(content));
    }

    let calls = tool_calls
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect();
    Ok(ModelReply::ToolRequest { content, calls })
}
