//! Batch evaluation: datasets, corpus preparation, recall metrics, and reports.

pub mod corpus;
pub mod dataset;
pub mod metrics;
pub mod report;
pub mod runner;

pub use corpus::{Corpus, CorpusIndex};
pub use dataset::{Dataset, EvalQuery, available_splits};
pub use metrics::{mean_recall_at_k, recall_at_k};
pub use report::{EvalReport, QueryRecord};
pub use runner::{AgentFactory, BatchEvaluator};
