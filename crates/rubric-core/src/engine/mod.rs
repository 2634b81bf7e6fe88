use async_trait::async_trait;

use crate::model::{QueryResult, QuerySelection, RunResults};
use crate::planner::CriteriaPlan;

pub mod runner;

pub use runner::Runner;

/// The evaluation surface: one query across models, or a whole selection.
#[async_trait]
pub trait Evaluator {
    /// Evaluate one query for the given models. A caller that already
    /// planned criteria for this query (e.g. the batch path) passes the plan
    /// in to avoid regenerating it per model.
    async fn evaluate_query(
        &self,
        query_id: u64,
        model_names: &[String],
        plan: Option<CriteriaPlan>,
    ) -> anyhow::Result<QueryResult>;

    /// Evaluate a selection of queries for the given models and summarize
    /// per-model statistics.
    async fn evaluate_all_queries(
        &self,
        model_names: &[String],
        selection: &QuerySelection,
    ) -> anyhow::Result<RunResults>;
}
