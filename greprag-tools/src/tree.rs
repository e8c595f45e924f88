//! Indented snapshot of the document tree for the system prompt.

use std::path::Path;
use walkdir::WalkDir;

/// Render `root` down to `max_depth` levels, at most `max_entries` entries.
///
/// Directories end in `/`. Unreadable entries are skipped.
pub fn document_tree(root: &Path, max_depth: usize, max_entries: usize) -> String {
    let mut out = format!("{}\n", root.display());
    let mut shown = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok());

    for entry in walker {
        if shown == max_entries {
            out.push_str("  ...\n");
            break;
        }
        let indent = "  ".repeat(entry.depth());
        let name = entry.file_name().to_string_lossy();
        let slash = if entry.file_type().is_dir() { "/" } else { "" };
        out.push_str(&format!("{indent}{name}{slash}\n"));
        shown += 1;
    }
    out
}
