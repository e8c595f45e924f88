//! Search backends: the boundary to the pattern matcher.
//!
//! Every backend returns line-oriented text naming the source file, the line
//! number, and the line content, with context lines around each match. External
//! backends shell out to `ug` or `rg`; [`NativeSearch`] does the same work in
//! process and emits the flat `path:line:content` / `path-line-content` dialect.

use async_trait::async_trait;
use greprag_core::error::ToolError;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, warn};

use crate::invocation::SEARCH_TOOL;

/// One search to run.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub pattern: String,
    /// File or directory to search.
    pub target: PathBuf,
    pub ignore_case: bool,
    pub fixed_string: bool,
    pub context_lines: usize,
}

/// A pattern matcher over files.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Raw output of the search. Empty when nothing matched.
    async fn search(&self, request: &SearchRequest) -> Result<String, ToolError>;
}

fn failed(message: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        name: SEARCH_TOOL.to_string(),
        message: message.into(),
    }
}

/// Run an external matcher. Exit status 1 means no matches; 2 with no output is a failure.
async fn run_command(program: &str, args: &[String]) -> Result<String, ToolError> {
    debug!(program, ?args, "Running search command");
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| failed(format!("Failed to run {program}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.code() == Some(2) && stdout.trim().is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{program} failed: {}", stderr.trim())));
    }
    if !output.status.success() && output.status.code() != Some(1) {
        warn!(program, status = ?output.status.code(), "Search command exited abnormally");
    }
    Ok(stdout)
}

/// `ugrep` with PDF text extraction through `pdftotext`.
#[derive(Debug, Clone, Default)]
pub struct UgrepSearch;

impl UgrepSearch {
    pub fn new() -> Self {
        Self
    }

    pub fn args(&self, request: &SearchRequest) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            "-n".to_string(),
            "--with-filename".to_string(),
            format!("--context={}", request.context_lines),
            "--filter=pdf:pdftotext % -".to_string(),
        ];
        if request.ignore_case {
            args.push("--ignore-case".to_string());
        }
        if request.fixed_string {
            args.push("--fixed-strings".to_string());
        }
        args.push("-e".to_string());
        args.push(request.pattern.clone());
        args.push(request.target.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl SearchBackend for UgrepSearch {
    fn name(&self) -> &'static str {
        "ugrep"
    }

    async fn search(&self, request: &SearchRequest) -> Result<String, ToolError> {
        run_command("ug", &self.args(request)).await
    }
}

/// `ripgrep`. No PDF extraction.
#[derive(Debug, Clone, Default)]
pub struct RipgrepSearch;

impl RipgrepSearch {
    pub fn args(&self, request: &SearchRequest) -> Vec<String> {
        let mut args = vec![
            "--line-number".to_string(),
            "--with-filename".to_string(),
            "--no-ignore".to_string(),
            format!("--context={}", request.context_lines),
        ];
        if request.ignore_case {
            args.push("--ignore-case".to_string());
        }
        if request.fixed_string {
            args.push("--fixed-strings".to_string());
        }
        args.push("-e".to_string());
        args.push(request.pattern.clone());
        args.push(request.target.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl SearchBackend for RipgrepSearch {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    async fn search(&self, request: &SearchRequest) -> Result<String, ToolError> {
        run_command("rg", &self.args(request)).await
    }
}

/// In-process regex search over a directory walk.
///
/// Only files with one of the configured extensions are read; files that are
/// not valid UTF-8 or contain NUL bytes are skipped. Output stops growing once
/// it passes `max_output_chars`.
#[derive(Debug, Clone)]
pub struct NativeSearch {
    extensions: Vec<String>,
    max_output_chars: usize,
}

impl NativeSearch {
    pub fn new(extensions: &[String], max_output_chars: usize) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            max_output_chars,
        }
    }

    fn wants(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|known| *known == ext))
    }

    fn matcher(request: &SearchRequest) -> Result<Regex, ToolError> {
        let pattern = if request.fixed_string {
            regex::escape(&request.pattern)
        } else {
            request.pattern.clone()
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(request.ignore_case)
            .build()
            .map_err(|e| ToolError::InvalidArguments {
                name: SEARCH_TOOL.to_string(),
                reason: format!("invalid pattern: {e}"),
            })
    }

    fn run(&self, request: &SearchRequest, matcher: &Regex) -> String {
        let mut out = String::new();
        let walker = ignore::WalkBuilder::new(&request.target)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Error walking document root");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !self.wants(path) {
                continue;
            }
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            if bytes.contains(&0) {
                continue;
            }
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };
            render_file(&mut out, &path.display().to_string(), &text, matcher, request.context_lines);
            if out.len() > self.max_output_chars {
                debug!(chars = out.len(), "Native search output limit reached");
                break;
            }
        }
        out
    }
}

/// Append the match groups of one file, separating groups with `--`.
fn render_file(out: &mut String, path: &str, text: &str, matcher: &Regex, context: usize) {
    let lines: Vec<&str> = text.lines().collect();
    let hits: Vec<bool> = lines.iter().map(|line| matcher.is_match(line)).collect();

    let mut groups: Vec<(usize, usize)> = Vec::new();
    for (index, _) in hits.iter().enumerate().filter(|(_, hit)| **hit) {
        let start = index.saturating_sub(context);
        let end = (index + context).min(lines.len() - 1);
        match groups.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => groups.push((start, end)),
        }
    }

    for (start, end) in groups {
        if !out.is_empty() {
            out.push_str("--\n");
        }
        for index in start..=end {
            let sep = if hits[index] { ':' } else { '-' };
            out.push_str(&format!("{path}{sep}{}{sep}{}\n", index + 1, lines[index]));
        }
    }
}

#[async_trait]
impl SearchBackend for NativeSearch {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn search(&self, request: &SearchRequest) -> Result<String, ToolError> {
        let matcher = Self::matcher(request)?;
        let search = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || search.run(&request, &matcher))
            .await
            .map_err(|e| failed(format!("search task failed: {e}")))
    }
}
