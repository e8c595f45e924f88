//! Concurrent batch evaluation of the search agent.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::agent::SearchAgent;
use crate::config::EvalConfig;
use crate::error::Result;
use crate::eval::corpus::CorpusIndex;
use crate::eval::dataset::EvalQuery;
use crate::eval::metrics::{mean_recall_at_k, recall_at_k};
use crate::eval::report::{EvalReport, QueryRecord};
use crate::providers::with_retry;
use crate::usage::UsageStats;

/// Builds a fresh agent whose tools are bound to the given document root.
pub type AgentFactory = Arc<dyn Fn(&Path) -> Result<SearchAgent> + Send + Sync>;

/// Runs many queries with a bounded number in flight.
#[derive(Clone)]
pub struct BatchEvaluator {
    config: EvalConfig,
    factory: AgentFactory,
    method: String,
}

impl QueryRecord {
    fn failed(query: &EvalQuery, message: String) -> Self {
        Self {
            query_id: query.id.clone(),
            query: query.query.clone(),
            gold_ids: query.gold_ids.clone(),
            retrieved_ids: Vec::new(),
            recall: 0.0,
            error: Some(message),
        }
    }
}

impl BatchEvaluator {
    pub fn new(config: EvalConfig, factory: AgentFactory) -> Self {
        Self {
            config,
            factory,
            method: "greprag_agent".to_string(),
        }
    }

    /// Name recorded in the report's `method` field.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Evaluate `queries` against the corpus described by `index`.
    ///
    /// Each run gets its own agent; a failing query is recorded with its error and
    /// never stops the batch. Records keep the order of `queries`.
    pub async fn evaluate(
        &self,
        split: &str,
        queries: Vec<EvalQuery>,
        index: Arc<CorpusIndex>,
    ) -> EvalReport {
        info!(
            split,
            queries = queries.len(),
            concurrency = self.config.concurrency,
            top_k = self.config.top_k,
            "Starting evaluation"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(queries.len());

        for query in queries.iter().cloned() {
            let evaluator = self.clone();
            let index = index.clone();
            let sem = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                evaluator.evaluate_one(&query, &index).await
            }));
        }

        let mut records = Vec::with_capacity(queries.len());
        let mut usage = UsageStats::new();
        for (handle, query) in handles.into_iter().zip(&queries) {
            match handle.await {
                Ok((record, run_usage)) => {
                    usage.merge(&run_usage);
                    records.push(record);
                }
                Err(e) => {
                    error!(query_id = %query.id, error = %e, "Evaluation task failed");
                    records.push(QueryRecord::failed(query, format!("task failed: {e}")));
                }
            }
        }

        let mean_recall = mean_recall_at_k(
            records
                .iter()
                .map(|r| (r.retrieved_ids.as_slice(), r.gold_ids.as_slice())),
            self.config.top_k,
        );
        let failed_queries = records.iter().filter(|r| r.error.is_some()).count();
        info!(
            split,
            mean_recall,
            evaluated = records.len() - failed_queries,
            failed = failed_queries,
            "Evaluation complete"
        );

        EvalReport {
            split: split.to_string(),
            method: self.method.clone(),
            mean_recall,
            top_k: self.config.top_k,
            evaluated_queries: records.len() - failed_queries,
            total_queries: queries.len(),
            failed_queries,
            timestamp: chrono::Utc::now(),
            usage,
            queries: records,
        }
    }

    async fn evaluate_one(&self, query: &EvalQuery, index: &CorpusIndex) -> (QueryRecord, UsageStats) {
        let preview: String = query.query.chars().take(100).collect();
        info!(query_id = %query.id, query = %preview, "Evaluating query");

        let factory = &self.factory;
        let root = index.root();
        let text = query.query.as_str();
        let outcome = with_retry(self.config.max_retries, || async move {
            let agent = factory(root)?;
            agent.ask(text).await
        })
        .await;

        match outcome {
            Ok(result) => {
                let retrieved = index.resolve(&result.response.citations);
                let recall = recall_at_k(&retrieved, &query.gold_ids, self.config.top_k);
                debug!(query_id = %query.id, gold = ?query.gold_ids, retrieved = ?retrieved, "Resolved citations");
                info!(
                    query_id = %query.id,
                    retrieved = retrieved.len(),
                    gold = query.gold_ids.len(),
                    recall,
                    "Query evaluated"
                );
                let record = QueryRecord {
                    query_id: query.id.clone(),
                    query: query.query.clone(),
                    gold_ids: query.gold_ids.clone(),
                    retrieved_ids: retrieved,
                    recall,
                    error: None,
                };
                (record, result.usage)
            }
            Err(e) => {
                error!(query_id = %query.id, error = %e, "Error evaluating query");
                (QueryRecord::failed(query, e.to_string()), UsageStats::new())
            }
        }
    }
}
