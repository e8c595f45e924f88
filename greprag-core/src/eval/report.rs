//! Evaluation results and their JSON form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::GrepragError;
use crate::usage::UsageStats;

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: String,
    pub query: String,
    pub gold_ids: Vec<String>,
    pub retrieved_ids: Vec<String>,
    pub recall: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub split: String,
    pub method: String,
    pub mean_recall: f64,
    pub top_k: usize,
    pub evaluated_queries: usize,
    pub total_queries: usize,
    pub failed_queries: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub usage: UsageStats,
    pub queries: Vec<QueryRecord>,
}

impl EvalReport {
    /// Write the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), GrepragError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Results saved");
        Ok(())
    }

    /// Human-readable summary with one status line per query.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = format!(
            "{rule}\nBenchmark Results: {} ({})\n{rule}\nMean Recall@{}: {:.4}\nEvaluated queries: {} / {} ({} failed)\nUsage: {}\n{rule}\n",
            self.split,
            self.method,
            self.top_k,
            self.mean_recall,
            self.evaluated_queries,
            self.total_queries,
            self.failed_queries,
            self.usage,
        );
        for record in &self.queries {
            let status = match &record.error {
                Some(_) => "ERROR".to_string(),
                None => format!("R@{}={:.3}", self.top_k, record.recall),
            };
            out.push_str(&format!("  [{}] {status}\n", record.query_id));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> EvalReport {
        EvalReport {
            split: "biology".into(),
            method: "greprag_agent".into(),
            mean_recall: 0.5,
            top_k: 10,
            evaluated_queries: 2,
            total_queries: 2,
            failed_queries: 1,
            timestamp: Utc::now(),
            usage: UsageStats::default(),
            queries: vec![
                QueryRecord {
                    query_id: "q1".into(),
                    query: "Why?".into(),
                    gold_ids: vec!["a".into()],
                    retrieved_ids: vec!["a".into()],
                    recall: 1.0,
                    error: None,
                },
                QueryRecord {
                    query_id: "q2".into(),
                    query: "How?".into(),
                    gold_ids: vec!["b".into()],
                    retrieved_ids: vec![],
                    recall: 0.0,
                    error: Some("LLM error: timeout".into()),
                },
            ],
        }
    }

    #[test]
    fn test_save_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("bio.json");
        report().save(&path).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["split"], "biology");
        assert_eq!(saved["mean_recall"], 0.5);
        assert_eq!(saved["queries"][1]["error"], "LLM error: timeout");
        assert!(saved["queries"][0].get("error").is_none());
    }

    #[test]
    fn test_summary() {
        let summary = report().summary();
        assert!(summary.contains("Mean Recall@10: 0.5000"));
        assert!(summary.contains("[q1] R@10=1.000"));
        assert!(summary.contains("[q2] ERROR"));
    }
}
