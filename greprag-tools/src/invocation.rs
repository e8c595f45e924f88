//! Decoding of model tool calls into a closed set of invocations.

use greprag_core::error::ToolError;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const SEARCH_TOOL: &str = "rg_search";
pub const SEARCH_TOOL_ALIAS: &str = "search";
pub const LIST_FOLDER_TOOL: &str = "list_folder";
pub const READ_LINES_TOOL: &str = "read_lines";

fn default_true() -> bool {
    true
}

/// Arguments of the search capability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArgs {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
    /// Falls back to the configured context when absent.
    #[serde(default)]
    pub context_lines: Option<usize>,
    #[serde(default)]
    pub fixed_string: bool,
    /// File or folder to search instead of the whole root.
    #[serde(default, alias = "file_path")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListFolderArgs {
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadLinesArgs {
    pub start_line: usize,
    pub end_line: usize,
    #[serde(alias = "path")]
    pub file_path: String,
}

/// A tool call the executor knows how to run.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Search(SearchArgs),
    ListFolder(ListFolderArgs),
    ReadLines(ReadLinesArgs),
    /// Name not in the capability set; answered with a notice, never an error.
    Unknown(String),
}

impl ToolInvocation {
    /// Decode a named call. Malformed arguments for a known tool are an error.
    pub fn decode(name: &str, arguments: &serde_json::Value) -> Result<Self, ToolError> {
        match name {
            SEARCH_TOOL | SEARCH_TOOL_ALIAS => args(name, arguments).map(Self::Search),
            LIST_FOLDER_TOOL => args(name, arguments).map(Self::ListFolder),
            READ_LINES_TOOL => args(name, arguments).map(Self::ReadLines),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Search(_) => SEARCH_TOOL,
            Self::ListFolder(_) => LIST_FOLDER_TOOL,
            Self::ReadLines(_) => READ_LINES_TOOL,
            Self::Unknown(name) => name,
        }
    }
}

fn args<T: DeserializeOwned>(name: &str, arguments: &serde_json::Value) -> Result<T, ToolError> {
    T::deserialize(arguments).map_err(|e| ToolError::InvalidArguments {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
