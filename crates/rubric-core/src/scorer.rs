//! Scores one report against every dimension's criteria concurrently.
//!
//! Fan-out is bounded by a semaphore sized `min(dimension_workers, dims)`;
//! fan-in collects results in completion order, which is safe because
//! aggregation is keyed by dimension name. A dimension that exhausts its
//! attempts fails the whole call closed: nothing is cached, so a future run
//! retries instead of trusting a partial result.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cache::key;
use crate::cache::CacheStore;
use crate::errors::ScoringError;
use crate::extract;
use crate::model::{Criterion, CriterionScore, Query};
use crate::prompts;
use crate::providers::llm::{generate, ChatClient, ChatMessage};

pub const DEFAULT_DIMENSION_WORKERS: usize = 4;

/// Raw per-criterion scores for one report. `complete` is false when any
/// dimension failed; incomplete outcomes are never cached.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub raw_scores: BTreeMap<String, Vec<CriterionScore>>,
    pub complete: bool,
    pub cost_usd: f64,
}

pub struct ParallelScorer {
    client: Arc<dyn ChatClient>,
    cache: CacheStore,
    dimension_workers: usize,
    max_attempts: u32,
}

impl ParallelScorer {
    pub fn new(
        client: Arc<dyn ChatClient>,
        cache: CacheStore,
        dimension_workers: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            cache,
            dimension_workers,
            max_attempts,
        }
    }

    pub async fn score_report(
        &self,
        query: &Query,
        report: &str,
        criteria: &BTreeMap<String, Vec<Criterion>>,
    ) -> ScoreOutcome {
        let cache_key = key::scores_key(query.id, report);
        if let Some(cached) = self
            .cache
            .get_as::<BTreeMap<String, Vec<CriterionScore>>>(key::NS_SCORES, &cache_key)
        {
            return ScoreOutcome {
                raw_scores: cached,
                complete: true,
                cost_usd: 0.0,
            };
        }

        info!(
            query_id = query.id,
            dimensions = criteria.len(),
            "scoring report across dimensions"
        );

        let workers = self.dimension_workers.min(criteria.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let task_prompt = Arc::new(query.prompt.clone());
        let report_text = Arc::new(report.to_string());

        let mut tasks = JoinSet::new();
        for (dimension, criteria_list) in criteria {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let task_prompt = task_prompt.clone();
            let report_text = report_text.clone();
            let dimension = dimension.clone();
            let criteria_list = criteria_list.clone();
            let max_attempts = self.max_attempts;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                score_dimension(
                    client,
                    task_prompt,
                    report_text,
                    dimension,
                    criteria_list,
                    max_attempts,
                )
                .await
            });
        }

        let mut raw_scores = BTreeMap::new();
        let mut complete = true;
        let mut cost_usd = 0.0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((dimension, result, cost)) => {
                    cost_usd += cost;
                    match result {
                        Ok(scores) => {
                            raw_scores.insert(dimension, scores);
                        }
                        Err(e) => {
                            error!(query_id = query.id, "{}", e);
                            // Empty list keeps the dimension addressable
                            // downstream; the outcome is still incomplete.
                            raw_scores.insert(dimension, Vec::new());
                            complete = false;
                        }
                    }
                }
                Err(e) => {
                    error!(query_id = query.id, "scoring task aborted: {}", e);
                    complete = false;
                }
            }
        }

        if complete {
            self.cache.set(key::NS_SCORES, &cache_key, &raw_scores);
            info!(query_id = query.id, "cached complete scores");
        } else {
            warn!(
                query_id = query.id,
                "incomplete scoring not cached, eligible for retry"
            );
        }

        ScoreOutcome {
            raw_scores,
            complete,
            cost_usd,
        }
    }
}

async fn score_dimension(
    client: Arc<dyn ChatClient>,
    task_prompt: Arc<String>,
    report: Arc<String>,
    dimension: String,
    criteria: Vec<Criterion>,
    max_attempts: u32,
) -> (String, Result<Vec<CriterionScore>, ScoringError>, f64) {
    // The scoring request carries only this dimension's criteria, without
    // weights.
    let criteria_json: Vec<serde_json::Value> = criteria
        .iter()
        .map(|c| {
            serde_json::json!({
                "criterion": c.criterion,
                "explanation": c.explanation,
            })
        })
        .collect();
    let criteria_json =
        serde_json::to_string_pretty(&criteria_json).unwrap_or_else(|_| "[]".to_string());
    let messages = [ChatMessage::user(prompts::scoring(
        &task_prompt,
        &report,
        &criteria_json,
    ))];

    let mut cost_usd = 0.0;
    let mut last_reason = String::new();
    for attempt in 1..=max_attempts {
        let reply = match generate(client.as_ref(), &messages, max_attempts).await {
            Ok(reply) => reply,
            Err(e) => {
                last_reason = e.to_string();
                warn!(
                    %dimension,
                    attempt, max_attempts, "collaborator call failed: {}", last_reason
                );
                continue;
            }
        };
        cost_usd += reply.cost_usd;

        match parse_dimension_scores(&reply.text, &criteria) {
            Ok(scores) => {
                info!(%dimension, criteria = scores.len(), "scored dimension");
                return (dimension, Ok(scores), cost_usd);
            }
            Err(e) => {
                last_reason = e.to_string();
                warn!(
                    %dimension,
                    attempt, max_attempts, "scoring attempt failed: {}", last_reason
                );
            }
        }
    }

    let failure = ScoringError::DimensionFailed {
        dimension: dimension.clone(),
        attempts: max_attempts,
        reason: last_reason,
    };
    (dimension, Err(failure), cost_usd)
}

/// Parse and validate one dimension's scoring response. Every criterion
/// defined for the dimension must appear in the response, matched by exact
/// name; anything missing or malformed is a retryable failure, never a
/// silently zero-filled result.
fn parse_dimension_scores(
    text: &str,
    criteria: &[Criterion],
) -> Result<Vec<CriterionScore>, ScoringError> {
    let json = extract::json_from_tagged(text)
        .ok_or_else(|| ScoringError::MalformedResponse("no JSON payload found".to_string()))?;
    let parsed: Vec<CriterionScore> =
        serde_json::from_str(&json).map_err(|e| ScoringError::MalformedResponse(e.to_string()))?;

    let by_name: BTreeMap<&str, &CriterionScore> = parsed
        .iter()
        .map(|s| (s.criterion.as_str(), s))
        .collect();

    let mut scores = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        let entry = by_name
            .get(criterion.criterion.as_str())
            .ok_or_else(|| ScoringError::MissingCriterion(criterion.criterion.clone()))?;
        scores.push((*entry).clone());
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(names: &[&str]) -> Vec<Criterion> {
        names
            .iter()
            .map(|n| Criterion {
                criterion: n.to_string(),
                explanation: String::new(),
                weight: 1.0,
            })
            .collect()
    }

    #[test]
    fn parses_scores_in_criteria_order() {
        let text = r#"<json_output>
        [
          {"criterion": "c2", "analysis": "ok", "report_score_0_to_10": 6.5},
          {"criterion": "c1", "analysis": "fine", "report_score_0_to_10": 8.0}
        ]
        </json_output>"#;
        let scores = parse_dimension_scores(text, &criteria(&["c1", "c2"])).unwrap();
        assert_eq!(scores[0].criterion, "c1");
        assert_eq!(scores[0].score, 8.0);
        assert_eq!(scores[1].criterion, "c2");
        assert_eq!(scores[1].score, 6.5);
    }

    #[test]
    fn missing_criterion_is_an_error_not_a_zero() {
        let text = r#"<json_output>
        [{"criterion": "c1", "analysis": "fine", "report_score_0_to_10": 8.0}]
        </json_output>"#;
        let err = parse_dimension_scores(text, &criteria(&["c1", "c2"])).unwrap_err();
        assert!(matches!(err, ScoringError::MissingCriterion(name) if name == "c2"));
    }

    #[test]
    fn prose_response_is_malformed() {
        let err = parse_dimension_scores("I refuse to answer in JSON.", &criteria(&["c1"]))
            .unwrap_err();
        assert!(matches!(err, ScoringError::MalformedResponse(_)));
    }
}
