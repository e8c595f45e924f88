//! Error types for the greprag core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the model boundary, tool execution, configuration, and evaluation.

use std::path::PathBuf;

/// Top-level error type for the greprag core library.
#[derive(Debug, thiserror::Error)]
pub enum GrepragError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the model call itself.
///
/// These are never retried inside a run; the caller decides on backoff.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Structured output did not match schema '{schema}': {message}")]
    StructuredOutput { schema: String, message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Whether the failure is transient and a caller may retry the run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Timeout { .. } | LlmError::Connection { .. }
        )
    }
}

/// Errors from tool argument decoding and execution.
///
/// The orchestrator turns these into textual tool results; they never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Tool '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Permission denied for tool '{name}': {reason}")]
    PermissionDenied { name: String, reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the batch evaluator.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid dataset: {message}")]
    Dataset { message: String },

    #[error("Unknown split '{split}', available: {available}")]
    UnknownSplit { split: String, available: String },

    #[error("Corpus preparation failed at {path}: {message}")]
    Corpus { path: PathBuf, message: String },
}

/// A type alias for results using the top-level `GrepragError`.
pub type Result<T> = std::result::Result<T, GrepragError>;
