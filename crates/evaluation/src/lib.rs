//! Offline ranking-quality evaluation: precision, recall and discounted
//! cumulative gain at a cutoff, averaged over a random sample of users.

pub mod metrics;
pub mod offline;

pub use metrics::{ideal_dcg_at_k, ndcg_at_k, precision_at_k, recall_at_k};
pub use offline::{EvaluationResult, Evaluator, GroundTruth};
