//! `list_folder`: the files of a topic folder, as full paths.

use greprag_core::error::ToolError;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::invocation::LIST_FOLDER_TOOL;

/// List the files (not subdirectories) of `folder`, resolved against `root`.
///
/// When no such directory exists, files directly under the root whose names
/// start with the folder's basename are listed instead. Paths are sorted by name.
pub async fn list_folder(root: &Path, folder: &str) -> Result<String, ToolError> {
    let trimmed = folder.trim().trim_end_matches(['/', '\\']);
    let relative = strip_root_name(root, trimmed);

    let directory = root.join(relative);
    let files = if !relative.is_empty() && directory.is_dir() && is_inside(root, &directory) {
        debug!(folder, dir = %directory.display(), "Listing directory");
        files_in(&directory, |_| true).await?
    } else {
        let prefix = relative.rsplit(['/', '\\']).next().unwrap_or(relative);
        if prefix.is_empty() {
            return Ok(format!("No files found for '{folder}'"));
        }
        debug!(folder, prefix, "Listing files by name prefix");
        files_in(root, |name| name.starts_with(prefix)).await?
    };

    if files.is_empty() {
        return Ok(format!("No files found for '{folder}'"));
    }

    let mut out = format!("Files in '{folder}' ({}):\n", files.len());
    for path in files {
        out.push_str(&path.display().to_string());
        out.push('\n');
    }
    Ok(out)
}

/// `docs/biology` under a root named `docs` becomes `biology`.
fn strip_root_name<'a>(root: &Path, folder: &'a str) -> &'a str {
    let Some(root_name) = root.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return folder;
    };
    folder
        .strip_prefix(root_name.as_str())
        .and_then(|rest| rest.strip_prefix(['/', '\\']))
        .unwrap_or(folder)
}

fn is_inside(root: &Path, path: &Path) -> bool {
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

async fn files_in(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, ToolError> {
    let read_error = |e: std::io::Error| ToolError::ExecutionFailed {
        name: LIST_FOLDER_TOOL.to_string(),
        message: format!("Failed to read directory '{}': {e}", dir.display()),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && keep(&name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
