//! The tool executor handed to the search agent.

use async_trait::async_trait;
use greprag_core::agent::ToolExecutor;
use greprag_core::config::{SearchBackendKind, SearchConfig};
use greprag_core::error::ToolError;
use greprag_core::types::{NO_MATCHES, ToolDefinition, ToolOutput};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::folder::list_folder;
use crate::invocation::{
    LIST_FOLDER_TOOL, READ_LINES_TOOL, ReadLinesArgs, SEARCH_TOOL, SearchArgs, ToolInvocation,
};
use crate::paths::resolve_in_root;
use crate::read::read_lines;
use crate::search::{NativeSearch, RipgrepSearch, SearchBackend, SearchRequest, UgrepSearch};

/// Keep at most `max_chars` characters from the start of `text`.
pub fn truncate_head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Runs document tools confined to one root directory.
///
/// Each batch run builds its own executor bound to its own root.
pub struct DocumentToolExecutor {
    root: PathBuf,
    backend: Arc<dyn SearchBackend>,
    max_output_chars: usize,
    context_lines: usize,
    list_folder_enabled: bool,
    read_lines_enabled: bool,
}

impl DocumentToolExecutor {
    /// Executor with every tool enabled and the default bounds.
    pub fn new(root: impl Into<PathBuf>, backend: Arc<dyn SearchBackend>) -> Self {
        let defaults = SearchConfig::default();
        Self {
            root: root.into(),
            backend,
            max_output_chars: defaults.max_output_chars,
            context_lines: defaults.context_lines,
            list_folder_enabled: true,
            read_lines_enabled: true,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let backend: Arc<dyn SearchBackend> = match config.backend {
            SearchBackendKind::Ugrep => Arc::new(UgrepSearch::new()),
            SearchBackendKind::Ripgrep => Arc::new(RipgrepSearch),
            SearchBackendKind::Native => Arc::new(NativeSearch::new(
                &config.extensions,
                config.max_output_chars,
            )),
        };
        Self {
            root: config.root.clone(),
            backend,
            max_output_chars: config.max_output_chars,
            context_lines: config.context_lines,
            list_folder_enabled: config.enable_list_folder,
            read_lines_enabled: config.enable_read_lines,
        }
    }

    /// Rebind to another document root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_max_output_chars(mut self, max_chars: usize) -> Self {
        self.max_output_chars = max_chars;
        self
    }

    pub fn with_list_folder(mut self, enabled: bool) -> Self {
        self.list_folder_enabled = enabled;
        self
    }

    pub fn with_read_lines(mut self, enabled: bool) -> Self {
        self.read_lines_enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the tool called `name` is offered. Checked before decoding.
    fn enabled(&self, name: &str) -> bool {
        match name {
            LIST_FOLDER_TOOL => self.list_folder_enabled,
            READ_LINES_TOOL => self.read_lines_enabled,
            _ => true,
        }
    }

    async fn search(&self, args: SearchArgs) -> Result<ToolOutput, ToolError> {
        let target = match args.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => resolve_in_root(&self.root, path, SEARCH_TOOL)?,
            None => self.root.clone(),
        };
        let request = SearchRequest {
            pattern: args.pattern,
            target,
            ignore_case: args.ignore_case,
            fixed_string: args.fixed_string,
            context_lines: args.context_lines.unwrap_or(self.context_lines),
        };
        debug!(
            backend = self.backend.name(),
            pattern = %request.pattern,
            target = %request.target.display(),
            "Searching documents"
        );

        let raw = self.backend.search(&request).await?;
        if raw.trim().is_empty() {
            return Ok(ToolOutput::search_matches(NO_MATCHES));
        }
        Ok(ToolOutput::search_matches(self.bounded(&raw)))
    }

    async fn read(&self, args: ReadLinesArgs) -> Result<ToolOutput, ToolError> {
        let path = resolve_in_root(&self.root, &args.file_path, READ_LINES_TOOL)?;
        let text = read_lines(&path, args.start_line, args.end_line).await?;
        Ok(ToolOutput::text(self.bounded(&text)))
    }

    fn bounded<'a>(&self, text: &'a str) -> &'a str {
        let kept = truncate_head(text, self.max_output_chars);
        if kept.len() < text.len() {
            info!(limit = self.max_output_chars, "Tool output truncated");
        }
        kept
    }
}

#[async_trait]
impl ToolExecutor for DocumentToolExecutor {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = vec![ToolDefinition {
            name: SEARCH_TOOL.to_string(),
            description: format!(
                "Search the documents under {} for a pattern (PDF text included). Returns matching lines as path:line:content with surrounding context lines.",
                self.root.display()
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regex pattern to search for"
                    },
                    "ignore_case": {
                        "type": "boolean",
                        "description": "Case insensitive search. Default: true."
                    },
                    "context_lines": {
                        "type": "integer",
                        "description": format!("Context lines around each match. Default: {}.", self.context_lines)
                    },
                    "fixed_string": {
                        "type": "boolean",
                        "description": "Treat the pattern as a literal string. Default: false."
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Specific file or folder to search. Defaults to the whole document root."
                    }
                },
                "required": ["pattern"]
            }),
        }];

        if self.list_folder_enabled {
            tools.push(ToolDefinition {
                name: LIST_FOLDER_TOOL.to_string(),
                description: "List the files of a topic folder as full paths usable with rg_search.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "folder": {
                            "type": "string",
                            "description": "Folder name relative to the document root"
                        }
                    },
                    "required": ["folder"]
                }),
            });
        }

        if self.read_lines_enabled {
            tools.push(ToolDefinition {
                name: READ_LINES_TOOL.to_string(),
                description: "Read a range of lines from one file to see more context around a match.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "start_line": { "type": "integer", "description": "First line, 1-based" },
                        "end_line": { "type": "integer", "description": "Last line, inclusive" },
                        "file_path": { "type": "string", "description": "File to read" }
                    },
                    "required": ["start_line", "end_line", "file_path"]
                }),
            });
        }

        tools
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        if !self.enabled(name) {
            return Ok(ToolOutput::text(format!("Unknown tool: {name}")));
        }

        match ToolInvocation::decode(name, arguments)? {
            ToolInvocation::Search(args) => self.search(args).await,
            ToolInvocation::ListFolder(args) => {
                let listing = list_folder(&self.root, &args.folder).await?;
                Ok(ToolOutput::text(self.bounded(&listing)))
            }
            ToolInvocation::ReadLines(args) => self.read(args).await,
            ToolInvocation::Unknown(name) => Ok(ToolOutput::text(format!("Unknown tool: {name}"))),
        }
    }
}
