//! OpenAI-compatible LLM provider.
//!
//! Speaks the chat-completions wire format used by OpenRouter, OpenAI, vLLM,
//! Ollama, and similar endpoints, including function tools and `json_schema`
//! structured replies.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, OutputSchema, Role,
    StructuredResponse, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<usize>,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// The API key comes from `config.api_key` or the variable named by `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .resolve_api_key()
            .map_err(|_| LlmError::AuthFailed {
                provider: format!("{}: env var '{}' not set", config.base_url, config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Convert internal messages to OpenAI JSON format.
    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match &msg.content {
                Content::Text { text } => json!({
                    "role": msg.role.to_string(),
                    "content": text,
                }),
                Content::ToolCall { .. } | Content::MultiPart { .. } if !msg.tool_calls().is_empty() => {
                    let tool_calls: Vec<Value> = msg
                        .tool_calls()
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": match call.arguments {
                                        Value::String(raw) => raw.clone(),
                                        other => other.to_string(),
                                    },
                                }
                            })
                        })
                        .collect();
                    let text = msg.text();
                    json!({
                        "role": "assistant",
                        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                        "tool_calls": tool_calls,
                    })
                }
                Content::ToolResult {
                    call_id, output, ..
                } => json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": output,
                }),
                _ => json!({
                    "role": msg.role.to_string(),
                    "content": msg.text(),
                }),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI format.
    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature.unwrap_or(self.temperature),
        });
        if let Some(max_tokens) = request.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(tools) = &request.tools
            && !tools.is_empty()
        {
            body["tools"] = json!(Self::tools_to_json(tools));
        }
        body
    }

    fn parse_usage(body: &Value) -> Option<TokenUsage> {
        let usage = body.get("usage").filter(|u| u.is_object())?;
        let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
        let completion = usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let total = usage
            .get("total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(prompt + completion);
        Some(TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        })
    }

    /// Parse an OpenAI-format response body into a CompletionResponse.
    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("");

        let mut calls: Vec<Content> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|tool_calls| {
                tool_calls
                    .iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        // Unparseable arguments stay as the raw string so the
                        // tool error and the call log show what was sent.
                        let arguments = match func.get("arguments") {
                            Some(Value::String(raw)) => serde_json::from_str(raw)
                                .unwrap_or_else(|_| Value::String(raw.clone())),
                            Some(obj @ Value::Object(_)) => obj.clone(),
                            _ => json!({}),
                        };
                        Some(Content::ToolCall {
                            id,
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content = match calls.len() {
            0 => Content::text(text),
            1 if text.is_empty() => calls.remove(0),
            _ => {
                let mut parts = Vec::with_capacity(calls.len() + 1);
                if !text.is_empty() {
                    parts.push(Content::text(text));
                }
                parts.extend(calls);
                Content::MultiPart { parts }
            }
        };

        let resp_model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, content),
            usage: Self::parse_usage(body),
            model: resp_model,
            finish_reason,
        })
    }

    /// Decode the JSON object carried in a structured reply's text.
    fn parse_structured(text: &str, schema: &OutputSchema) -> Result<Value, LlmError> {
        let trimmed = text.trim();
        let unfenced = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();

        let value: Value =
            serde_json::from_str(unfenced).map_err(|e| LlmError::StructuredOutput {
                schema: schema.name.clone(),
                message: format!("reply is not valid JSON: {e}"),
            })?;

        if let Some(required) = schema.schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if value.get(field).is_none() {
                    return Err(LlmError::StructuredOutput {
                        schema: schema.name.clone(),
                        message: format!("missing field '{field}'"),
                    });
                }
            }
        }
        Ok(value)
    }

    /// Map an HTTP status code to the appropriate LlmError.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 => {
                debug!(body = %body, "Authentication failed (401)");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => {
                // "Rate limit reached ... try again in 20s"
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim().trim_end_matches('.').trim_end_matches('s').parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            status if status >= 500 => LlmError::ApiRequest {
                message: format!("Server error ({status}): {body}"),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            LlmError::Connection {
                message: e.to_string(),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request failed: {e}"),
            }
        }
    }

    async fn post(&self, body: &Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "greprag")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON: {e}"),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.request_body(&request);
        let json = self.post(&body).await?;
        Self::parse_response(&json, &self.model)
    }

    async fn complete_structured(
        &self,
        request: CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<StructuredResponse, LlmError> {
        let mut body = self.request_body(&CompletionRequest {
            tools: None,
            ..request
        });
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "strict": true,
                "schema": schema.schema,
            }
        });

        let json = self.post(&body).await?;
        let response = Self::parse_response(&json, &self.model)?;
        let value = Self::parse_structured(&response.message.text(), schema)?;
        Ok(StructuredResponse {
            value,
            usage: response.usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
