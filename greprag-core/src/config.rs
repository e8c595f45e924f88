//! Configuration system for greprag.
//!
//! Uses `figment` for layered configuration: defaults -> config files -> environment.
//! Configuration is loaded from `~/.config/greprag/config.toml`, `.greprag/config.toml`
//! in the working directory, and an optional explicit file. Command-line flags are
//! applied by the caller on the extracted value.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::citation::{DEFAULT_EXCLUDED_PREFIXES, DEFAULT_EXTENSIONS};
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier as understood by the endpoint (e.g., "x-ai/grok-4.1-fast").
    pub model: String,
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub base_url: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Maximum tokens to generate in a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// HTTP request timeout.
    pub timeout_secs: u64,
    /// Cost per 1M input tokens (USD).
    pub input_price_per_million: f64,
    /// Cost per 1M output tokens (USD).
    pub output_price_per_million: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "x-ai/grok-4.1-fast".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 120,
            input_price_per_million: 0.2,
            output_price_per_million: 0.5,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the inline value or the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingField {
                field: format!("llm.api_key (or environment variable {})", self.api_key_env),
            }),
        }
    }
}

/// Which external utility answers pattern searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    /// `ug` with `pdftotext` filtering for PDFs.
    #[default]
    Ugrep,
    /// `rg`; PDFs are not text-extracted.
    Ripgrep,
    /// In-process regex search over text files.
    Native,
}

impl std::fmt::Display for SearchBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBackendKind::Ugrep => write!(f, "ugrep"),
            SearchBackendKind::Ripgrep => write!(f, "ripgrep"),
            SearchBackendKind::Native => write!(f, "native"),
        }
    }
}

/// Search and document-root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Document root all tools are confined to.
    pub root: PathBuf,
    pub backend: SearchBackendKind,
    /// Tool output is cut to this many characters, keeping the head.
    pub max_output_chars: usize,
    /// Context lines around each match.
    pub context_lines: usize,
    /// File extensions searched and recognized in search output.
    pub extensions: Vec<String>,
    /// Lines starting with these are left out of citations.
    pub excluded_prefixes: Vec<String>,
    pub enable_list_folder: bool,
    pub enable_read_lines: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("docs/"),
            backend: SearchBackendKind::default(),
            max_output_chars: 30_000,
            context_lines: 2,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            enable_list_folder: true,
            enable_read_lines: true,
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model turns allowed before the final answer is forced.
    pub max_iterations: usize,
    /// Citations attached to the final response at most.
    pub max_citations: usize,
    /// Execute the tool calls of one turn concurrently.
    pub parallel_tool_calls: bool,
    /// Embed a directory tree of the document root in the system prompt.
    pub include_tree_snapshot: bool,
    pub tree_depth: usize,
    pub tree_max_entries: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_citations: 50,
            parallel_tool_calls: false,
            include_tree_snapshot: false,
            tree_depth: 2,
            tree_max_entries: 200,
        }
    }
}

/// Batch evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Runs in flight at once.
    pub concurrency: usize,
    /// Cut-off for recall@k.
    pub top_k: usize,
    /// Retries of a run after a transient model failure.
    pub max_retries: u32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            top_k: 10,
            max_retries: 0,
        }
    }
}

impl AppConfig {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.agent.max_iterations == 0 {
            return invalid("agent.max_iterations must be at least 1");
        }
        if self.search.max_output_chars == 0 {
            return invalid("search.max_output_chars must be at least 1");
        }
        if self.eval.concurrency == 0 {
            return invalid("eval.concurrency must be at least 1");
        }
        if self.search.extensions.iter().all(|e| e.trim().is_empty()) {
            return invalid("search.extensions must name at least one extension");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("llm.temperature must be within 0.0..=2.0");
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "llm.model".to_string(),
            });
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }
}

/// User-level config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "greprag", "greprag")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `GREPRAG_`, sections split on `__`)
/// 2. Explicit config file
/// 3. Workspace-local config (`.greprag/config.toml`)
/// 4. User config (`~/.config/greprag/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".greprag").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // GREPRAG_LLM__MODEL, GREPRAG_SEARCH__ROOT, GREPRAG_EVAL__CONCURRENCY, ...
    figment = figment.merge(Env::prefixed("GREPRAG_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.model, "x-ai/grok-4.1-fast");
        assert_eq!(config.llm.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.search.root, PathBuf::from("docs/"));
        assert_eq!(config.search.backend, SearchBackendKind::Ugrep);
        assert_eq!(config.search.max_output_chars, 30_000);
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.max_citations, 50);
        assert_eq!(config.eval.concurrency, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_prices() {
        let config = LlmConfig::default();
        assert!((config.input_price_per_million - 0.2).abs() < f64::EPSILON);
        assert!((config.output_price_per_million - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.model, config.llm.model);
        assert_eq!(deserialized.search.extensions, config.search.extensions);
        assert_eq!(deserialized.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str("[agent]\nmax_iterations = 3\n").unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.max_citations, 50);
        assert_eq!(config.search.context_lines, 2);
    }

    #[test]
    fn test_backend_kind_serde() {
        let config: AppConfig = toml::from_str("[search]\nbackend = \"native\"\n").unwrap();
        assert_eq!(config.search.backend, SearchBackendKind::Native);
        assert_eq!(SearchBackendKind::Ripgrep.to_string(), "ripgrep");
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_output_bound() {
        let mut config = AppConfig::default();
        config.search.max_output_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.eval.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let mut config = AppConfig::default();
        config.search.extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".greprag");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[llm]
model = "openai/gpt-4o-mini"

[search]
root = "corpus"
backend = "ripgrep"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.search.root, PathBuf::from("corpus"));
        assert_eq!(config.search.backend, SearchBackendKind::Ripgrep);
        assert_eq!(config.agent.max_iterations, 15);
    }

    #[test]
    fn test_explicit_file_overrides_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".greprag");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "[agent]\nmax_iterations = 4\n").unwrap();
        let explicit = dir.path().join("run.toml");
        std::fs::write(&explicit, "[agent]\nmax_iterations = 9\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.agent.max_iterations, 9);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_resolve_api_key_inline() {
        let config = LlmConfig {
            api_key: Some("sk-inline".into()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().unwrap(), "sk-inline");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let config = LlmConfig {
            api_key: None,
            api_key_env: "GREPRAG_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        let err = config.resolve_api_key().unwrap_err();
        assert!(err.to_string().contains("GREPRAG_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
