//! Evaluation datasets: queries with gold document ids plus the documents themselves.
//!
//! A dataset is a JSON file:
//!
//! ```json
//! {
//!   "split": "biology",
//!   "queries": [{ "id": "q1", "query": "...", "gold_ids": ["doc/a", "doc/b"] }],
//!   "documents": { "doc/a": "text...", "doc/b": "text..." }
//! }
//! ```
//!
//! `gold_ids` may also be a JSON-encoded string holding the array. A directory of
//! such files is addressed by split name (`<dir>/<split>.json`).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::EvalError;

/// One evaluation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQuery {
    #[serde(alias = "query_id")]
    pub id: String,
    pub query: String,
    #[serde(default, deserialize_with = "gold_ids", alias = "gold_ids_long")]
    pub gold_ids: Vec<String>,
}

/// Queries and documents of one split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub split: Option<String>,
    pub queries: Vec<EvalQuery>,
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
}

fn gold_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Encoded(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(ids) => Ok(ids),
        Raw::Encoded(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
    }
}

impl Dataset {
    /// Load a dataset file. The split name defaults to the file stem.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let text = std::fs::read_to_string(path).map_err(|e| EvalError::Dataset {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut dataset: Dataset = serde_json::from_str(&text).map_err(|e| EvalError::Dataset {
            message: format!("{}: {e}", path.display()),
        })?;
        if dataset.split.is_none() {
            dataset.split = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        dataset.validate()?;
        info!(
            path = %path.display(),
            queries = dataset.queries.len(),
            documents = dataset.documents.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Load `<dir>/<split>.json`.
    pub fn load_split(dir: &Path, split: &str) -> Result<Self, EvalError> {
        let path = dir.join(format!("{split}.json"));
        if !path.is_file() {
            return Err(EvalError::UnknownSplit {
                split: split.to_string(),
                available: available_splits(dir).join(", "),
            });
        }
        let mut dataset = Self::load(&path)?;
        dataset.split = Some(split.to_string());
        Ok(dataset)
    }

    /// Keep only the first `limit` queries.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.queries.truncate(limit);
        }
        self
    }

    pub fn split_name(&self) -> &str {
        self.split.as_deref().unwrap_or("default")
    }

    fn validate(&self) -> Result<(), EvalError> {
        if let Some(query) = self.queries.iter().find(|q| q.query.trim().is_empty()) {
            return Err(EvalError::Dataset {
                message: format!("query '{}' has empty text", query.id),
            });
        }
        Ok(())
    }
}

/// Split names available as `*.json` files in `dir`, sorted.
pub fn available_splits(dir: &Path) -> Vec<String> {
    let mut splits: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                })
                .collect()
        })
        .unwrap_or_default();
    splits.sort();
    splits
}
