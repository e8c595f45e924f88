//! Citation extraction from raw search output.
//!
//! [`CitationParser`] turns the line-oriented output of a pattern search into
//! ordered [`Citation`] records. Two output dialects are understood:
//!
//! - flat: `path:12:matched line` and `path-13-context line`, one per line,
//!   with `--` between non-adjacent groups;
//! - grouped: a bare `path` header followed by `12:matched` / `13-context`
//!   lines, usually indented.
//!
//! Parsing is a small state machine over lines. A block collects the content
//! lines of one file until a separator, a header, a different file, or the end
//! of input closes it; each non-empty block becomes one citation whose text is
//! its lines joined by single spaces. The parser keeps no state between calls
//! and never fails: lines it cannot interpret are skipped.
//!
//! [`CitationSet`] accumulates citations across calls of one run, dropping
//! repeated `(location, text)` pairs while keeping first-seen order.

use std::collections::HashSet;

use crate::types::Citation;

/// Token emitted by search utilities between non-adjacent match groups.
pub const BLOCK_SEPARATOR: &str = "--";

/// Extensions recognized in path lines when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".md"];

/// Content prefixes that mark document metadata rather than prose.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["url:", "title:", "---"];

/// Stateless parser for search-tool output.
#[derive(Debug, Clone)]
pub struct CitationParser {
    root_prefix: Option<String>,
    root_marker: Option<String>,
    extensions: Vec<String>,
    excluded_prefixes: Vec<String>,
}

/// How a single input line was interpreted.
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Blank,
    Separator,
    /// `path<sep>digits<sep>content` in either dialect.
    Match { path: &'a str, content: &'a str },
    /// Bare path opening a grouped block.
    Header { path: &'a str },
    /// Content belonging to the currently open block.
    Continuation { content: &'a str },
    Other,
}

/// Block currently being accumulated.
#[derive(Debug)]
struct OpenBlock {
    location: String,
    lines: Vec<String>,
}

impl OpenBlock {
    fn new(location: String) -> Self {
        Self {
            location,
            lines: Vec::new(),
        }
    }
}

impl Default for CitationParser {
    fn default() -> Self {
        Self::new("docs/")
    }
}

impl CitationParser {
    /// Create a parser recognizing paths under `root` and the default extensions.
    pub fn new(root: &str) -> Self {
        let root_prefix = normalize_root(root);
        let root_marker = root_prefix.as_ref().map(|prefix| {
            if prefix.starts_with('/') {
                prefix.clone()
            } else {
                format!("/{prefix}")
            }
        });
        Self {
            root_prefix,
            root_marker,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the recognized file extensions. A missing leading dot is added.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim().to_ascii_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .filter(|ext| ext.len() > 1)
            .collect();
        self
    }

    /// Replace the metadata prefixes whose lines are left out of citations.
    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Parse raw search output into citations, in encounter order.
    pub fn parse(&self, raw: &str) -> Vec<Citation> {
        let mut citations = Vec::new();
        let mut block: Option<OpenBlock> = None;

        for raw_line in raw.lines() {
            match self.classify(raw_line, block.is_some()) {
                Line::Blank | Line::Other => {}
                Line::Separator => flush(&mut block, &mut citations),
                Line::Match { path, content } => {
                    let location = file_name(path);
                    if block.as_ref().is_some_and(|b| b.location != location) {
                        flush(&mut block, &mut citations);
                    }
                    let open = block.get_or_insert_with(|| OpenBlock::new(location.to_string()));
                    self.push_content(open, content);
                }
                Line::Header { path } => {
                    flush(&mut block, &mut citations);
                    block = Some(OpenBlock::new(file_name(path).to_string()));
                }
                Line::Continuation { content } => {
                    if let Some(open) = block.as_mut() {
                        self.push_content(open, content);
                    }
                }
            }
        }

        flush(&mut block, &mut citations);
        citations
    }

    fn classify<'a>(&self, raw_line: &'a str, in_block: bool) -> Line<'a> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Line::Blank;
        }
        if trimmed == BLOCK_SEPARATOR {
            return Line::Separator;
        }

        let numbered = strip_line_number(trimmed);
        let indented = raw_line.starts_with(char::is_whitespace);
        let split = self.split_at_extension(trimmed);
        let candidate = trimmed.strip_suffix(':').unwrap_or(trimmed);

        // An unindented file name may itself start with `<digits><sep>`, as in
        // `2023-05-report.pdf`.
        let names_file = !indented
            && match split {
                Some((path, _)) => !path.contains(char::is_whitespace),
                None => {
                    !candidate.contains(char::is_whitespace) && self.has_known_extension(candidate)
                }
            };

        if in_block
            && !names_file
            && let Some(content) = numbered
        {
            return Line::Continuation { content };
        }

        if let Some((path, content)) = split {
            return Line::Match { path, content };
        }

        let may_be_header = !indented && (numbered.is_none() || names_file);
        if may_be_header && self.has_known_extension(candidate) {
            return Line::Header { path: candidate };
        }

        if let Some((path, content)) = self.split_under_root(trimmed) {
            return Line::Match { path, content };
        }
        if may_be_header && self.is_under_root(candidate) {
            return Line::Header { path: candidate };
        }

        if in_block {
            Line::Continuation { content: trimmed }
        } else {
            Line::Other
        }
    }

    /// Split at the earliest known extension directly followed by `<sep>digits`.
    fn split_at_extension<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let lower = line.to_ascii_lowercase();
        let bytes = line.as_bytes();
        let mut best: Option<(usize, usize)> = None;

        for ext in &self.extensions {
            for (start, _) in lower.match_indices(ext.as_str()) {
                let path_end = start + ext.len();
                if best.is_some_and(|(end, _)| end <= path_end) {
                    break;
                }
                if let Some(number_end) = numbered_separator(bytes, path_end) {
                    best = Some((path_end, number_end));
                    break;
                }
            }
        }

        best.map(|(path_end, number_end)| (&line[..path_end], content_after(line, number_end)))
    }

    /// Split a line under the document root whose extension is not configured.
    ///
    /// The first `<sep>digits<sep>` whose path part ends in a file name with an
    /// extension wins, so digits inside dated names stay in the path. Failing
    /// that, the rightmost candidate before the first whitespace is taken.
    fn split_under_root<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let start = self.root_position(line)?;
        let bytes = line.as_bytes();
        let candidates: Vec<(usize, usize)> = (start..bytes.len())
            .filter_map(|at| numbered_separator(bytes, at).map(|number_end| (at, number_end)))
            .collect();

        let path_end = line.find(char::is_whitespace).unwrap_or(line.len());
        let (at, number_end) = candidates
            .iter()
            .copied()
            .find(|&(at, _)| has_extension(file_name(&line[..at])))
            .or_else(|| candidates.iter().copied().filter(|&(at, _)| at < path_end).last())
            .or_else(|| candidates.first().copied())?;
        Some((&line[..at], content_after(line, number_end)))
    }

    fn root_position(&self, line: &str) -> Option<usize> {
        let prefix = self.root_prefix.as_deref()?;
        if line.starts_with(prefix) {
            return Some(prefix.len());
        }
        let marker = self.root_marker.as_deref()?;
        line.find(marker).map(|pos| pos + marker.len())
    }

    fn is_under_root(&self, line: &str) -> bool {
        self.root_position(line).is_some()
    }

    fn has_known_extension(&self, candidate: &str) -> bool {
        let lower = candidate.to_ascii_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    fn is_excluded(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        self.excluded_prefixes
            .iter()
            .any(|prefix| lower.starts_with(prefix.as_str()))
    }

    fn push_content(&self, block: &mut OpenBlock, content: &str) {
        let content = content.trim();
        if content.is_empty() || self.is_excluded(content) {
            return;
        }
        block.lines.push(content.to_string());
    }
}

fn flush(block: &mut Option<OpenBlock>, citations: &mut Vec<Citation>) {
    if let Some(open) = block.take()
        && !open.lines.is_empty()
    {
        citations.push(Citation::new(open.location, open.lines.join(" ")));
    }
}

/// `docs`, `./docs`, `docs/` all become `docs/`. A root of `.` or `/` disables root matching.
fn normalize_root(root: &str) -> Option<String> {
    let mut root = root.trim().replace('\\', "/");
    while let Some(rest) = root.strip_prefix("./") {
        root = rest.to_string();
    }
    let root = root.trim_end_matches('/');
    if root.is_empty() || root == "." {
        return None;
    }
    Some(format!("{root}/"))
}

/// If `bytes[at]` starts `<sep>digits` ending at a separator or end of line,
/// return the index just past the digits.
fn numbered_separator(bytes: &[u8], at: usize) -> Option<usize> {
    if !matches!(bytes.get(at), Some(b':' | b'-')) {
        return None;
    }
    let digits_start = at + 1;
    let mut end = digits_start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    match bytes.get(end) {
        None | Some(b':' | b'-') => Some(end),
        _ => None,
    }
}

fn content_after(line: &str, number_end: usize) -> &str {
    line.get(number_end + 1..).unwrap_or("")
}

/// Strip a leading `<digits><sep>` token.
fn strip_line_number(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    match line.as_bytes().get(digits) {
        Some(b':' | b'-') => Some(&line[digits + 1..]),
        _ => None,
    }
}

/// Whether a file name ends in `.<alphanumerics>` after a non-empty stem.
fn has_extension(name: &str) -> bool {
    if name.contains(':') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Last segment of a `/` or `\` separated path.
fn file_name(path: &str) -> &str {
    let path = path.trim_end_matches(['/', '\\']);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Citations gathered over one run, unique by `(location, text)`, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CitationSet {
    citations: Vec<Citation>,
    seen: HashSet<(String, String)>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a citation unless an identical one is already present.
    pub fn insert(&mut self, citation: Citation) -> bool {
        let key = (citation.location.clone(), citation.text.clone());
        if self.seen.insert(key) {
            self.citations.push(citation);
            true
        } else {
            false
        }
    }

    /// Merge citations in order, returning how many were new.
    pub fn merge<I>(&mut self, citations: I) -> usize
    where
        I: IntoIterator<Item = Citation>,
    {
        let mut added = 0;
        for citation in citations {
            if self.insert(citation) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn as_slice(&self) -> &[Citation] {
        &self.citations
    }

    /// Consume the set, keeping at most `cap` citations.
    pub fn into_capped(mut self, cap: usize) -> Vec<Citation> {
        self.citations.truncate(cap);
        self.citations
    }
}
