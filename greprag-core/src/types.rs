//! Core type definitions for greprag.
//!
//! Defines the fundamental data structures used throughout the system:
//! messages, tool calls, completion requests, citations, and run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::usage::UsageStats;

/// Output returned by the search capability when the pattern matched nothing.
///
/// The orchestrator never feeds this sentinel to the citation parser.
pub const NO_MATCHES: &str = "No matches found";

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Content within a message: text, a tool call, a tool result, or several of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        output: String,
        is_error: bool,
    },
    MultiPart {
        parts: Vec<Content>,
    },
}

impl Content {
    /// Create a simple text content.
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Create a tool call content.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Content::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool result content.
    pub fn tool_result(
        call_id: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Content::ToolResult {
            call_id: call_id.into(),
            output: output.into(),
            is_error,
        }
    }

    /// Returns the text representation of this content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A tool invocation requested by the model, borrowed from a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolCallRef<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub arguments: &'a serde_json::Value,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with auto-generated ID and current timestamp.
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, Content::text(text))
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, Content::text(text))
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Content::text(text))
    }

    /// Create a tool result message.
    pub fn tool_result(
        call_id: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(Role::Tool, Content::tool_result(call_id, output, is_error))
    }

    /// Tool calls carried by this message, in the order the model listed them.
    pub fn tool_calls(&self) -> Vec<ToolCallRef<'_>> {
        fn collect<'a>(content: &'a Content, out: &mut Vec<ToolCallRef<'a>>) {
            match content {
                Content::ToolCall {
                    id,
                    name,
                    arguments,
                } => out.push(ToolCallRef {
                    id,
                    name,
                    arguments,
                }),
                Content::MultiPart { parts } => {
                    for part in parts {
                        collect(part, out);
                    }
                }
                _ => {}
            }
        }

        let mut calls = Vec::new();
        collect(&self.content, &mut calls);
        calls
    }

    /// Concatenated text parts of this message.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text { text } => text.clone(),
            Content::MultiPart { parts } => parts
                .iter()
                .filter_map(Content::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

/// A definition describing a tool for the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// What produced a tool output; decides whether citations are extracted from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Raw, line-oriented output of the search capability.
    SearchMatches,
    /// Anything else (listings, line ranges, notices).
    Text,
}

/// Output produced by a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub kind: OutputKind,
}

impl ToolOutput {
    /// Create a simple text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: OutputKind::Text,
        }
    }

    /// Create an output holding raw search matches.
    pub fn search_matches(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: OutputKind::SearchMatches,
        }
    }

    /// Whether this is search output that carries actual matches.
    pub fn has_matches(&self) -> bool {
        self.kind == OutputKind::SearchMatches && self.content != NO_MATCHES
    }
}

/// Token usage reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A request to the LLM for completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    /// `None` leaves the provider's configured temperature in effect.
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub model: Option<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            tools: None,
            temperature: None,
            max_tokens: None,
            model: None,
        }
    }
}

/// The result of an LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    /// `None` when the provider did not report usage for this call.
    pub usage: Option<TokenUsage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// JSON schema the structured completion must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl OutputSchema {
    /// Schema of the final `{question, answer}` reply.
    pub fn final_answer() -> Self {
        Self {
            name: "final_answer".to_string(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string" },
                    "answer": { "type": "string" }
                },
                "required": ["question", "answer"],
                "additionalProperties": false
            }),
        }
    }
}

/// The parsed result of a structured completion.
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    pub value: serde_json::Value,
    pub usage: Option<TokenUsage>,
}

/// A reference to a source file and a merged excerpt of its matched lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    /// Bare file name, never a full path.
    pub location: String,
    pub text: String,
}

impl Citation {
    pub fn new(location: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            text: text.into(),
        }
    }
}

/// The `{question, answer}` pair the model returns in the final structured call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub question: String,
    pub answer: String,
}

/// The final response of a run: the model's answer plus extracted citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl std::fmt::Display for AgentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Question\n{}\n\nAnswer\n{}",
            self.question, self.answer
        )?;
        if !self.citations.is_empty() {
            write!(f, "\n\nSources")?;
            for citation in &self.citations {
                write!(f, "\n- {}: {}", citation.location, citation.text)?;
            }
        }
        Ok(())
    }
}

/// A tool invocation as logged by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub response: AgentResponse,
    pub usage: UsageStats,
    pub tool_calls: Vec<ToolCallRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.as_text(), Some("hello"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_tool_calls_single() {
        let msg = Message::new(
            Role::Assistant,
            Content::tool_call("call_1", "rg_search", serde_json::json!({"pattern": "x"})),
        );
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "rg_search");
    }

    #[test]
    fn test_tool_calls_multipart_keeps_order() {
        let msg = Message::new(
            Role::Assistant,
            Content::MultiPart {
                parts: vec![
                    Content::text("looking"),
                    Content::tool_call("a", "rg_search", serde_json::json!({})),
                    Content::tool_call("b", "read_lines", serde_json::json!({})),
                ],
            },
        );
        let ids: Vec<&str> = msg.tool_calls().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(msg.text(), "looking");
    }

    #[test]
    fn test_text_message_has_no_tool_calls() {
        assert!(Message::assistant("done").tool_calls().is_empty());
    }

    #[test]
    fn test_tool_output_matches() {
        assert!(ToolOutput::search_matches("docs/a.md:1:x").has_matches());
        assert!(!ToolOutput::search_matches(NO_MATCHES).has_matches());
        assert!(!ToolOutput::text("docs/a.md:1:x").has_matches());
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_final_answer_schema_requires_both_fields() {
        let schema = OutputSchema::final_answer();
        assert_eq!(schema.name, "final_answer");
        assert_eq!(
            schema.schema["required"],
            serde_json::json!(["question", "answer"])
        );
    }

    #[test]
    fn test_agent_response_display() {
        let response = AgentResponse {
            question: "What is X?".into(),
            answer: "X is Y.".into(),
            citations: vec![Citation::new("a.pdf", "X is Y")],
        };
        let rendered = response.to_string();
        assert!(rendered.starts_with("Question\nWhat is X?"));
        assert!(rendered.contains("Answer\nX is Y."));
        assert!(rendered.contains("- a.pdf: X is Y"));
    }

    #[test]
    fn test_agent_response_display_without_citations() {
        let response = AgentResponse {
            question: "q".into(),
            answer: "a".into(),
            citations: Vec::new(),
        };
        assert!(!response.to_string().contains("Sources"));
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let msg = Message::tool_result("call_9", "output", false);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
