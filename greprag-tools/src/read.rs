//! `read_lines`: a literal line range from one file.

use greprag_core::error::ToolError;
use std::path::Path;

use crate::invocation::READ_LINES_TOOL;

/// Lines `start..=end` (1-based) of `path`, each newline-terminated.
///
/// A range past the end of the file yields the lines that exist, possibly none.
pub async fn read_lines(path: &Path, start: usize, end: usize) -> Result<String, ToolError> {
    if start == 0 || end < start {
        return Err(ToolError::InvalidArguments {
            name: READ_LINES_TOOL.to_string(),
            reason: format!("invalid line range {start}..{end} (lines are 1-based, end >= start)"),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            name: READ_LINES_TOOL.to_string(),
            message: format!("Failed to read '{}': {e}", path.display()),
        })?;
    let text = String::from_utf8_lossy(&bytes);

    let mut out = String::new();
    for line in text.lines().skip(start - 1).take(end - start + 1) {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}
