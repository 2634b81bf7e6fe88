use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A research task to evaluate reports against. Loaded once, immutable for
/// the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: u64,
    pub prompt: String,
}

/// A named quality axis a report is scored on. The four fixed dimensions are
/// always present; 1-3 additional ones are generated per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(rename = "meta_dimension_name")]
    pub name: String,
    pub definition: String,
}

/// A weighted sub-check within one dimension. Weights within a dimension are
/// renormalized to sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub criterion: String,
    pub explanation: String,
    #[serde(default)]
    pub weight: f64,
}

/// One scored criterion for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub analysis: String,
    #[serde(rename = "report_score_0_to_10")]
    pub score: f64,
}

/// Dimension-name -> weight, summing to 1.0 (within 1e-3; renormalized when
/// read back from cache if drifted).
pub type DimensionWeights = BTreeMap<String, f64>;

/// Raw + aggregated scores for one (query, model) report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub raw_scores: BTreeMap<String, Vec<CriterionScore>>,
    pub final_scores: BTreeMap<String, f64>,
    pub report_text: String,
}

/// Everything produced for one query: the generated evaluation frame plus
/// per-model results. Models whose scoring failed are absent from
/// `model_results` and retryable on the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: u64,
    pub query_prompt: String,
    pub dimensions: BTreeMap<String, String>,
    pub additional_dimensions: Vec<Dimension>,
    pub dimension_weights: DimensionWeights,
    pub criteria: BTreeMap<String, Vec<Criterion>>,
    pub model_results: BTreeMap<String, EvaluationResult>,
    /// Collaborator spend incurred while producing this result (0.0 when
    /// served entirely from cache).
    #[serde(default)]
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub generated_at: String,
    pub model_names: Vec<String>,
    pub query_results: BTreeMap<u64, QueryResult>,
    pub summary: RunSummary,
    pub selected_query_count: usize,
    pub total_query_count: usize,
    pub selected_query_ids: Vec<u64>,
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub models: BTreeMap<String, ModelSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Mean total score over queries that produced a nonzero result for this
    /// model. Queries without a successful result are excluded, not counted
    /// as zero.
    pub average_total_score: f64,
    pub scored_queries: usize,
    pub dimension_averages: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    First,
    Random,
}

/// Which queries to evaluate. Explicit ids win over `max_queries`; neither
/// set means all queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySelection {
    #[serde(default)]
    pub query_ids: Option<Vec<u64>>,
    #[serde(default)]
    pub max_queries: Option<usize>,
    #[serde(default)]
    pub method: SelectionMethod,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for QuerySelection {
    fn default() -> Self {
        Self {
            query_ids: None,
            max_queries: None,
            method: SelectionMethod::First,
            seed: default_seed(),
        }
    }
}

fn default_seed() -> u64 {
    42
}
