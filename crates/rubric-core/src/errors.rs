use thiserror::Error;

/// Invalid or unloadable settings. Fatal at startup, never mid-run.
#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);

/// A collaborator operation that did not produce a usable value within its
/// attempt budget.
#[derive(Debug, Clone, Error)]
#[error("{op} failed after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    pub op: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Failures while scoring one dimension of one report. A `DimensionFailed`
/// marks the enclosing report-scoring call unsuccessful; nothing is cached
/// and the (query, model) pair stays retryable.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("dimension '{dimension}' scoring failed after {attempts} attempts: {reason}")]
    DimensionFailed {
        dimension: String,
        attempts: u32,
        reason: String,
    },
    #[error("criterion '{0}' missing from scoring response")]
    MissingCriterion(String),
    #[error("scoring response is not the expected JSON shape: {0}")]
    MalformedResponse(String),
}
