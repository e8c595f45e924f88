//! Confining tool paths to the document root.

use greprag_core::error::ToolError;
use std::path::{Path, PathBuf};

/// Resolve `path` for `tool`, requiring the result to lie inside `root`.
///
/// Relative paths are tried against the root first, then as given (search
/// output names files relative to the working directory, e.g. `docs/a.txt`).
pub fn resolve_in_root(root: &Path, path: &str, tool: &str) -> Result<PathBuf, ToolError> {
    let given = Path::new(path);
    let candidates = if given.is_absolute() {
        vec![given.to_path_buf()]
    } else {
        vec![root.join(given), given.to_path_buf()]
    };

    let resolved = candidates
        .iter()
        .find(|candidate| candidate.exists())
        .ok_or_else(|| ToolError::ExecutionFailed {
            name: tool.to_string(),
            message: format!("Path '{path}' does not exist"),
        })?;

    let canonical = resolved
        .canonicalize()
        .map_err(|e| ToolError::ExecutionFailed {
            name: tool.to_string(),
            message: format!("Path resolution failed: {e}"),
        })?;
    let root_canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    if !canonical.starts_with(&root_canonical) {
        return Err(ToolError::PermissionDenied {
            name: tool.to_string(),
            reason: format!("Path '{path}' is outside the document root"),
        });
    }
    Ok(canonical)
}
