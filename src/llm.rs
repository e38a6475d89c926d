//! Chat-completion model boundary
//!
//! `OpenAiChatModel` speaks the OpenAI chat completions wire format (any
//! compatible endpoint works through `OPENAI_BASE_URL`). `ScriptedModel`
//! replays canned responses for tests and offline runs.

use crate::error::AgentError;
use crate::models::{Message, MessageBody, ToolCallRequest, ToolResultStatus, ToolSpec};
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// One model turn: text, tool call requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse>;
}

//
// ================= OpenAI-compatible endpoint =================
//

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChatModel {
    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("OPENAI_API_KEY not configured".to_string()));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completion request failed: {}", e);
                AgentError::LlmError(format!("Chat completion request failed: {}", e))
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("Invalid chat completion response: {}", e)))?;

        match status {
            StatusCode::OK => Ok(body),
            status => Err(AgentError::LlmError(format!(
                "Chat completion returned {}: {}",
                status,
                body.get("error").unwrap_or(&body)
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse> {
        let mut messages_array = vec![json!({"role": "system", "content": system})];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.model,
            "messages": messages_array,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools_to_openai_spec(tools)?);
        }

        info!(model = %self.model, messages = messages.len(), "Calling chat model");
        let response = self.post(&payload).await?;
        let parsed = openai_response_to_model_response(&response)?;

        debug!(
            tool_calls = parsed.tool_calls.len(),
            total_tokens = ?parsed.usage.total_tokens,
            "Chat model responded"
        );
        Ok(parsed)
    }
}

fn tool_content_text(status: ToolResultStatus, content: &Value) -> String {
    let text = match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match status {
        ToolResultStatus::Error => format!("The tool call returned the following error:\n{}", text),
        _ => text,
    }
}

pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match &message.body {
            MessageBody::User { content } => json!({"role": "user", "content": content}),
            MessageBody::Assistant {
                content,
                tool_calls,
            } => {
                let mut converted = json!({"role": "assistant"});
                converted["content"] = if content.is_empty() {
                    Value::Null
                } else {
                    json!(content)
                };
                if !tool_calls.is_empty() {
                    converted["tool_calls"] = tool_calls
                        .iter()
                        .map(|call| {
                            let arguments = match &call.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            };
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {"name": call.name, "arguments": arguments},
                            })
                        })
                        .collect();
                }
                converted
            }
            MessageBody::Tool {
                tool_call_id,
                status,
                content,
                ..
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": tool_content_text(*status, content),
            }),
        })
        .collect()
}

pub fn tools_to_openai_spec(tools: &[ToolSpec]) -> Result<Vec<Value>> {
    let mut names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !names.insert(tool.name.as_str()) {
            return Err(AgentError::Config(format!("Duplicate tool name: {}", tool.name)));
        }
        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Arguments that are not valid JSON are kept as the raw string; the tool's
/// typed parse then rejects them.
pub fn openai_response_to_model_response(response: &Value) -> Result<ModelResponse> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| AgentError::LlmError(format!("No message in response: {}", response)))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|call| {
            let raw = call["function"]["arguments"].as_str().unwrap_or_default();
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            };
            ToolCallRequest::new(
                call["id"].as_str().unwrap_or_default(),
                call["function"]["name"].as_str().unwrap_or_default(),
                arguments,
            )
        })
        .collect();

    let usage = response
        .get("usage")
        .map(|u| {
            let field = |key: &str| u.get(key).and_then(Value::as_u64).map(|v| v as u32);
            Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        content,
        tool_calls,
        usage,
    })
}

//
// ================= Scripted model =================
//

/// What the scripted model was asked.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Returns pre-configured responses in order
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: system.to_string(),
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        self.responses
            .lock()
            .map_err(|_| AgentError::LlmError("Scripted model lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("Scripted model has no more responses".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_tool_calls() {
        let response = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "get_stock_price", "arguments": "{\"ticker\":\"AAPL\"}"}},
                    {"id": "call_2", "type": "function", "function": {"name": "list_tools", "arguments": ""}},
                    {"id": "call_3", "type": "function", "function": {"name": "get_earnings", "arguments": "{ticker: AAPL"}}
                ]
            }}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let parsed = openai_response_to_model_response(&response).unwrap();
        assert_eq!(parsed.content, "");
        assert_eq!(parsed.tool_calls.len(), 3);
        assert_eq!(parsed.tool_calls[0].arguments, json!({"ticker": "AAPL"}));
        assert_eq!(parsed.tool_calls[1].arguments, json!({}));
        assert_eq!(parsed.tool_calls[2].arguments, json!("{ticker: AAPL"));
        assert_eq!(parsed.usage.total_tokens, Some(15));
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let call = ToolCallRequest::new("call_1", "get_stock_price", json!({"ticker": "AAPL"}));
        let messages = vec![
            Message::user("price of AAPL?"),
            Message::assistant("", vec![call.clone()]),
            Message::tool_result(&call, ToolResultStatus::Error, json!("Finnhub request timed out")),
        ];

        let spec = messages_to_openai_spec(&messages);
        assert_eq!(spec[0], json!({"role": "user", "content": "price of AAPL?"}));
        assert_eq!(spec[1]["content"], Value::Null);
        assert_eq!(spec[1]["tool_calls"][0]["function"]["arguments"], "{\"ticker\":\"AAPL\"}");
        assert_eq!(spec[2]["tool_call_id"], "call_1");
        assert!(spec[2]["content"]
            .as_str()
            .unwrap()
            .starts_with("The tool call returned the following error:"));
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let spec = ToolSpec {
            name: "web_search".into(),
            description: "d".into(),
            input_schema: json!({"type": "object"}),
        };
        assert!(tools_to_openai_spec(&[spec.clone(), spec]).is_err());
    }

    #[tokio::test]
    async fn test_openai_model_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "Hello"}}]}).to_string(),
            )
            .create_async()
            .await;

        let model =
            OpenAiChatModel::new("test-key".into(), "gpt-4o".into(), &server.url()).unwrap();
        let response = model
            .complete("system", &[Message::user("hi")], &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response, ModelResponse::text("Hello"));
    }

    #[tokio::test]
    async fn test_scripted_model_records_and_exhausts() {
        let model = ScriptedModel::new(vec![ModelResponse::text("done")]);
        let first = model.complete("sys", &[Message::user("q")], &[]).await.unwrap();
        assert_eq!(first.content, "done");
        assert!(model.complete("sys", &[], &[]).await.is_err());
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.remaining(), 0);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        assert!(matches!(
            OpenAiChatModel::new(" ".into(), "gpt-4o".into(), "http://localhost"),
            Err(AgentError::Config(_))
        ));
    }
}
