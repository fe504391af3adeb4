// libs/chat-cell/src/services/agent.rs
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::models::{AgentReply, ChatTurn, ToolCall, ToolSchema};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Agent API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected agent response: {0}")]
    Decode(String),

    #[error("Agent returned neither text nor a tool call")]
    EmptyResponse,
}

/// The language-model side of a conversation. Given the full history it
/// either asks for one tool call or produces the final text of the turn.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    async fn respond(
        &self,
        system_prompt: &str,
        tools: &[ToolSchema],
        history: &[ChatTurn],
    ) -> Result<AgentReply, AgentError>;
}

/// OpenAI-compatible Chat Completions agent using function tools.
pub struct OpenAiAgent {
    api_key: String,
    model: String,
    base_url: String,
    http_client: Client,
}

impl OpenAiAgent {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_chat_configured() {
            return None;
        }
        Some(Self::new(&config.openai_api_key, &config.openai_model, &config.openai_base_url))
    }

    fn build_request(&self, system_prompt: &str, tools: &[ToolSchema], history: &[ChatTurn]) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(json!({ "role": "system", "content": system_prompt }));
        messages.extend(history.iter().map(to_message));

        let tools: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto",
            "temperature": 0.3
        })
    }
}

fn to_message(turn: &ChatTurn) -> Value {
    match turn {
        ChatTurn::User { content } => json!({ "role": "user", "content": content }),
        ChatTurn::Assistant { content } => json!({ "role": "assistant", "content": content }),
        ChatTurn::ToolCall { call } => json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": Value::Object(call.arguments.clone()).to_string(),
                }
            }]
        }),
        ChatTurn::ToolResult { call_id, result, .. } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": result.to_string(),
        }),
    }
}

/// Reads the first choice: its first tool call if any, otherwise its text.
fn parse_reply(body: &Value) -> Result<AgentReply, AgentError> {
    let message = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| AgentError::Decode("missing choices[0].message".to_string()))?;

    if let Some(tool_call) = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
    {
        let id = tool_call["id"]
            .as_str()
            .ok_or_else(|| AgentError::Decode("tool call without id".to_string()))?;
        let function = &tool_call["function"];
        let name = function["name"]
            .as_str()
            .ok_or_else(|| AgentError::Decode("tool call without function name".to_string()))?;

        let raw_arguments = function["arguments"].as_str().unwrap_or("{}");
        let arguments = match serde_json::from_str::<Value>(raw_arguments) {
            Ok(Value::Object(map)) => map,
            _ => {
                // Left empty so the tool reports the missing arguments back.
                warn!("Discarding unparsable arguments for tool {}: {}", name, raw_arguments);
                Map::new()
            }
        };

        return Ok(AgentReply::ToolCall(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }));
    }

    match message.get("content").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(AgentReply::Text(text.to_string())),
        _ => Err(AgentError::EmptyResponse),
    }
}

#[async_trait]
impl ConversationalAgent for OpenAiAgent {
    async fn respond(
        &self,
        system_prompt: &str,
        tools: &[ToolSchema],
        history: &[ChatTurn],
    ) -> Result<AgentReply, AgentError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Calling {} with {} history turns", url, history.len());

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.build_request(system_prompt, tools, history))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            error!("Agent API error ({}): {}", status, body);
            return Err(AgentError::Api { status: status.as_u16(), body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;

        parse_reply(&body)
    }
}
