//! # greprag Core
//!
//! Core library for greprag, a question-answering agent that searches a document
//! folder with grep-style tools and cites the lines it found.
//! Provides the LLM interface, the tool-calling loop, citation extraction,
//! configuration, and the batch evaluation harness.

pub mod agent;
pub mod brain;
pub mod citation;
pub mod config;
pub mod error;
pub mod eval;
pub mod prompts;
pub mod providers;
pub mod types;
pub mod usage;

// Re-export commonly used types at the crate root.
pub use agent::{SearchAgent, ToolExecutor};
pub use brain::{LlmProvider, MockLlmProvider};
pub use citation::{CitationParser, CitationSet};
pub use config::{AgentConfig, AppConfig, EvalConfig, LlmConfig, SearchBackendKind, SearchConfig};
pub use error::{ConfigError, EvalError, GrepragError, LlmError, Result, ToolError};
pub use providers::create_provider;
pub use types::{
    AgentResponse, AgentResult, Citation, CompletionRequest, CompletionResponse, Content,
    Message, NO_MATCHES, OutputKind, Role, TokenUsage, ToolCallRecord, ToolDefinition, ToolOutput,
};
pub use usage::UsageStats;
