//! Writing evaluation documents to disk and mapping citations back to document ids.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::EvalError;
use crate::types::Citation;

/// Prepares a document root from in-memory documents.
pub struct Corpus;

impl Corpus {
    /// File name a document id is stored under: path separators become `_`, `.txt` is appended.
    pub fn file_name_for(id: &str) -> String {
        let name = id.replace(['/', '\\'], "_");
        if name.ends_with(".txt") {
            name
        } else {
            format!("{name}.txt")
        }
    }

    /// Write every document to `dir` and return the file-name index.
    pub fn materialize(
        documents: &BTreeMap<String, String>,
        dir: &Path,
    ) -> Result<CorpusIndex, EvalError> {
        let corpus_error = |path: &Path, e: std::io::Error| EvalError::Corpus {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        std::fs::create_dir_all(dir).map_err(|e| corpus_error(dir, e))?;

        let mut file_to_doc = BTreeMap::new();
        for (id, content) in documents {
            let name = Self::file_name_for(id);
            let path = dir.join(&name);
            std::fs::write(&path, content).map_err(|e| corpus_error(&path, e))?;
            if let Some(previous) = file_to_doc.insert(name.clone(), id.clone()) {
                warn!(file = %name, previous = %previous, id = %id, "Document ids collide on file name");
            }
        }

        info!(dir = %dir.display(), documents = documents.len(), "Wrote corpus");
        Ok(CorpusIndex {
            root: dir.to_path_buf(),
            file_to_doc,
        })
    }
}

/// Maps corpus file names back to document ids.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    root: PathBuf,
    file_to_doc: BTreeMap<String, String>,
}

impl CorpusIndex {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.file_to_doc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_to_doc.is_empty()
    }

    /// Resolve one citation location: exact file name, then bare name, then containment.
    pub fn resolve_location(&self, location: &str) -> Option<&str> {
        if let Some(id) = self.file_to_doc.get(location) {
            return Some(id);
        }
        let bare = Path::new(location)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.to_string());
        if let Some(id) = self.file_to_doc.get(&bare) {
            return Some(id);
        }
        if bare.is_empty() {
            return None;
        }
        self.file_to_doc
            .iter()
            .find(|(known, _)| known.contains(&bare) || bare.contains(known.as_str()))
            .map(|(_, id)| id.as_str())
    }

    /// Unique document ids for `citations`, in citation order.
    pub fn resolve(&self, citations: &[Citation]) -> Vec<String> {
        let mut seen = HashSet::new();
        citations
            .iter()
            .filter_map(|citation| self.resolve_location(&citation.location))
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect()
    }
}
