//! LLM provider abstraction and a scripted provider for tests.
//!
//! Defines the `LlmProvider` trait the orchestrator talks to, and a queue-driven
//! mock used by tests and offline runs.

use crate::error::LlmError;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, OutputSchema, Role,
    StructuredResponse, TokenUsage,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Trait for LLM providers: plain tool-calling completions and schema-constrained replies.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a completion, possibly returning tool calls.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Perform a completion whose reply must be a JSON value matching `schema`.
    async fn complete_structured(
        &self,
        request: CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<StructuredResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// A scripted provider. Each call pops the next queued reply.
///
/// With an empty queue, `complete` answers with plain text (ending the loop) and
/// `complete_structured` echoes the first user message as the question.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    structured: Mutex<VecDeque<Result<StructuredResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that keeps requesting the same tool call.
    ///
    /// Queues enough copies to outlast any reasonable iteration budget.
    pub fn always_calling(tool_name: &str, arguments: serde_json::Value) -> Self {
        let provider = Self::new();
        for _ in 0..64 {
            provider.queue_response(Self::tool_call_response(tool_name, arguments.clone()));
        }
        provider
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    /// Queue a failure for the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// Queue the value returned by the next `complete_structured` call.
    pub fn queue_structured(&self, value: serde_json::Value) {
        lock(&self.structured).push_back(Ok(StructuredResponse {
            value,
            usage: Some(TokenUsage::new(200, 40)),
        }));
    }

    /// Queue a failure for the next `complete_structured` call.
    pub fn queue_structured_error(&self, error: LlmError) {
        lock(&self.structured).push_back(Err(error));
    }

    /// Requests received so far, both plain and structured, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: Some(TokenUsage::new(100, 50)),
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Create a tool call response for testing.
    pub fn tool_call_response(tool_name: &str, arguments: serde_json::Value) -> CompletionResponse {
        let call_id = format!("call_{}", uuid::Uuid::new_v4());
        CompletionResponse {
            message: Message::new(
                Role::Assistant,
                Content::tool_call(&call_id, tool_name, arguments),
            ),
            usage: Some(TokenUsage::new(100, 30)),
            model: "mock-model".to_string(),
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    /// Create a response requesting several tool calls in one turn.
    pub fn multi_tool_call_response(calls: Vec<(&str, serde_json::Value)>) -> CompletionResponse {
        let parts = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| Content::tool_call(format!("call_{i}"), name, arguments))
            .collect();
        CompletionResponse {
            message: Message::new(Role::Assistant, Content::MultiPart { parts }),
            usage: Some(TokenUsage::new(100, 40)),
            model: "mock-model".to_string(),
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request);
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Ok(Self::text_response("I'm a mock LLM. No queued responses available.")))
    }

    async fn complete_structured(
        &self,
        request: CompletionRequest,
        _schema: &OutputSchema,
    ) -> Result<StructuredResponse, LlmError> {
        let question = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(Message::text)
            .next()
            .unwrap_or_default();
        lock(&self.requests).push(request);
        lock(&self.structured).pop_front().unwrap_or_else(|| {
            Ok(StructuredResponse {
                value: serde_json::json!({ "question": question, "answer": "mock answer" }),
                usage: Some(TokenUsage::new(200, 40)),
            })
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
