//! Drives the full pipeline: plan criteria per query, score each model's
//! report, aggregate, cache, and summarize.
//!
//! Two bounded pools, both sized by `query_workers` but never overlapping
//! in time: the planning pass drains completely before the scoring pass
//! starts, so the two stages never contend for related cache keys. Within
//! one report the scorer runs its own dimension pool; the product of the
//! two pool sizes is validated against the concurrency ceiling at config
//! load.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::aggregate;
use crate::cache::key;
use crate::cache::CacheStore;
use crate::engine::Evaluator;
use crate::model::{
    EvaluationResult, ModelSummary, Query, QueryResult, QuerySelection, RunResults, RunSummary,
    SelectionMethod,
};
use crate::planner::{CriteriaPlan, DimensionPlanner};
use crate::scorer::ParallelScorer;

#[derive(Clone)]
pub struct Runner {
    queries: Arc<BTreeMap<u64, Query>>,
    model_results: Arc<BTreeMap<String, BTreeMap<u64, String>>>,
    planner: Arc<DimensionPlanner>,
    scorer: Arc<ParallelScorer>,
    cache: CacheStore,
    query_workers: usize,
}

impl Runner {
    pub fn new(
        queries: BTreeMap<u64, Query>,
        model_results: BTreeMap<String, BTreeMap<u64, String>>,
        planner: DimensionPlanner,
        scorer: ParallelScorer,
        cache: CacheStore,
        query_workers: usize,
    ) -> Self {
        Self {
            queries: Arc::new(queries),
            model_results: Arc::new(model_results),
            planner: Arc::new(planner),
            scorer: Arc::new(scorer),
            cache,
            query_workers: query_workers.max(1),
        }
    }

    pub fn model_names(&self) -> Vec<String> {
        self.model_results.keys().cloned().collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Per-namespace cache sizes.
    pub fn cache_statistics(&self) -> BTreeMap<String, usize> {
        key::ALL_NAMESPACES
            .iter()
            .map(|ns| (ns.to_string(), self.cache.size(ns)))
            .collect()
    }

    pub fn clear_caches(&self) {
        for ns in key::ALL_NAMESPACES {
            self.cache.clear(ns);
        }
        info!("all caches cleared");
    }

    /// Pick the queries to evaluate: explicit ids, a capped prefix, a seeded
    /// random sample, or everything.
    pub fn select_queries(&self, selection: &QuerySelection) -> BTreeMap<u64, Query> {
        if let Some(ids) = &selection.query_ids {
            let mut selected = BTreeMap::new();
            for id in ids {
                match self.queries.get(id) {
                    Some(query) => {
                        selected.insert(*id, query.clone());
                    }
                    None => warn!(query_id = id, "selected query id not loaded"),
                }
            }
            info!(count = selected.len(), "selected explicit query ids");
            return selected;
        }

        let Some(max_queries) = selection.max_queries else {
            return self.queries.as_ref().clone();
        };
        if max_queries == 0 || max_queries >= self.queries.len() {
            return self.queries.as_ref().clone();
        }

        let all_ids: Vec<u64> = self.queries.keys().copied().collect();
        let mut selected_ids = match selection.method {
            SelectionMethod::First => all_ids[..max_queries].to_vec(),
            SelectionMethod::Random => {
                let mut rng = StdRng::seed_from_u64(selection.seed);
                all_ids
                    .choose_multiple(&mut rng, max_queries)
                    .copied()
                    .collect()
            }
        };
        selected_ids.sort_unstable();
        info!(?selected_ids, "selected queries");

        selected_ids
            .into_iter()
            .filter_map(|id| self.queries.get(&id).map(|q| (id, q.clone())))
            .collect()
    }
}

#[async_trait]
impl Evaluator for Runner {
    async fn evaluate_query(
        &self,
        query_id: u64,
        model_names: &[String],
        plan: Option<CriteriaPlan>,
    ) -> anyhow::Result<QueryResult> {
        let query = self
            .queries
            .get(&query_id)
            .ok_or_else(|| anyhow::anyhow!("unknown query id {}", query_id))?;

        let plan = match plan {
            Some(plan) => plan,
            None => self.planner.plan(query).await,
        };
        let mut cost_usd = plan.cost_usd;

        let mut model_results = BTreeMap::new();
        for model in model_names {
            let Some(report) = self
                .model_results
                .get(model)
                .and_then(|reports| reports.get(&query_id))
            else {
                continue;
            };

            let result_key = key::result_key(query_id, model, report);
            if let Some(cached) = self
                .cache
                .get_as::<EvaluationResult>(key::NS_MODEL_RESULTS, &result_key)
            {
                let total = cached
                    .final_scores
                    .get("total_weighted_score")
                    .copied()
                    .unwrap_or(0.0);
                info!(query_id, %model, total, "using cached result");
                model_results.insert(model.clone(), cached);
                continue;
            }

            let outcome = self.scorer.score_report(query, report, &plan.criteria).await;
            cost_usd += outcome.cost_usd;

            if !outcome.complete {
                // Nothing cached and nothing reported: the pair stays
                // retryable on the next invocation.
                warn!(query_id, %model, "scoring incomplete, result omitted");
                continue;
            }

            let final_scores =
                aggregate::hierarchical_scores(&outcome.raw_scores, &plan.criteria, &plan.weights);
            let total = final_scores
                .get("total_weighted_score")
                .copied()
                .unwrap_or(0.0);
            info!(query_id, %model, total, "scored report");

            let result = EvaluationResult {
                raw_scores: outcome.raw_scores,
                final_scores,
                report_text: report.clone(),
            };
            self.cache
                .set(key::NS_MODEL_RESULTS, &result_key, &result);
            model_results.insert(model.clone(), result);
        }

        Ok(QueryResult {
            query_id,
            query_prompt: query.prompt.clone(),
            dimensions: plan.dimensions,
            additional_dimensions: plan.additional_dimensions,
            dimension_weights: plan.weights,
            criteria: plan.criteria,
            model_results,
            cost_usd,
        })
    }

    async fn evaluate_all_queries(
        &self,
        model_names: &[String],
        selection: &QuerySelection,
    ) -> anyhow::Result<RunResults> {
        let model_names: Vec<String> = if model_names.is_empty() {
            self.model_names()
        } else {
            model_names.to_vec()
        };

        let selected = self.select_queries(selection);
        info!(
            selected = selected.len(),
            total = self.queries.len(),
            models = model_names.len(),
            "starting evaluation"
        );

        // Planning pass. Runs to completion before any scoring starts so the
        // two stages never interleave writes to related cache keys.
        let semaphore = Arc::new(Semaphore::new(self.query_workers));
        let mut planning = JoinSet::new();
        for query in selected.values() {
            let semaphore = semaphore.clone();
            let planner = self.planner.clone();
            let query = query.clone();
            planning.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let plan = planner.plan(&query).await;
                (query.id, plan)
            });
        }

        let mut plans: BTreeMap<u64, CriteriaPlan> = BTreeMap::new();
        while let Some(joined) = planning.join_next().await {
            match joined {
                Ok((query_id, plan)) => {
                    info!(query_id, "criteria ready");
                    plans.insert(query_id, plan);
                }
                Err(e) => error!("criteria planning task aborted: {}", e),
            }
        }

        // Scoring pass, its own pool.
        let semaphore = Arc::new(Semaphore::new(self.query_workers));
        let mut scoring = JoinSet::new();
        for (query_id, plan) in plans {
            let semaphore = semaphore.clone();
            let runner = self.clone();
            let model_names = model_names.clone();
            scoring.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = runner
                    .evaluate_query(query_id, &model_names, Some(plan))
                    .await;
                (query_id, result)
            });
        }

        let mut query_results: BTreeMap<u64, QueryResult> = BTreeMap::new();
        let mut total_cost_usd = 0.0;
        while let Some(joined) = scoring.join_next().await {
            match joined {
                Ok((query_id, Ok(result))) => {
                    total_cost_usd += result.cost_usd;
                    query_results.insert(query_id, result);
                }
                Ok((query_id, Err(e))) => error!(query_id, "query evaluation failed: {}", e),
                Err(e) => error!("query evaluation task aborted: {}", e),
            }
        }

        let summary = summary_statistics(&query_results, &model_names);

        Ok(RunResults {
            generated_at: chrono::Utc::now().to_rfc3339(),
            model_names,
            selected_query_count: selected.len(),
            total_query_count: self.queries.len(),
            selected_query_ids: selected.keys().copied().collect(),
            query_results,
            summary,
            total_cost_usd,
        })
    }
}

/// Per-model means over queries that produced a nonzero total. Queries with
/// no successful result for a model are excluded from its averages, not
/// counted as zero.
pub fn summary_statistics(
    query_results: &BTreeMap<u64, QueryResult>,
    model_names: &[String],
) -> RunSummary {
    let mut summary = RunSummary::default();

    for model in model_names {
        let mut totals = Vec::new();
        let mut dimension_scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for query_result in query_results.values() {
            let Some(result) = query_result.model_results.get(model) else {
                continue;
            };
            let total = result
                .final_scores
                .get("total_weighted_score")
                .copied()
                .unwrap_or(0.0);
            if total <= 0.0 {
                continue;
            }
            totals.push(total);
            for (name, value) in &result.final_scores {
                if name.ends_with("_score") && name != "total_weighted_score" {
                    dimension_scores.entry(name.clone()).or_default().push(*value);
                }
            }
        }

        summary.models.insert(
            model.clone(),
            ModelSummary {
                average_total_score: mean(&totals),
                scored_queries: totals.len(),
                dimension_averages: dimension_scores
                    .into_iter()
                    .map(|(name, values)| {
                        let avg = mean(&values);
                        (name, avg)
                    })
                    .collect(),
            },
        );
    }

    summary
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_total(total: f64) -> EvaluationResult {
        EvaluationResult {
            raw_scores: BTreeMap::new(),
            final_scores: BTreeMap::from([
                ("coverage_score".to_string(), total),
                ("total_weighted_score".to_string(), total),
            ]),
            report_text: String::new(),
        }
    }

    fn query_result(id: u64, model: &str, total: f64) -> QueryResult {
        QueryResult {
            query_id: id,
            query_prompt: String::new(),
            dimensions: BTreeMap::new(),
            additional_dimensions: Vec::new(),
            dimension_weights: BTreeMap::new(),
            criteria: BTreeMap::new(),
            model_results: BTreeMap::from([(model.to_string(), result_with_total(total))]),
            cost_usd: 0.0,
        }
    }

    #[test]
    fn summary_excludes_queries_without_a_result() {
        let results = BTreeMap::from([
            (1, query_result(1, "m", 8.0)),
            (2, query_result(2, "m", 6.0)),
            // query 3 has no result for "m": excluded, not a zero
            (3, query_result(3, "other", 5.0)),
        ]);
        let summary = summary_statistics(&results, &["m".to_string()]);
        let m = &summary.models["m"];
        assert_eq!(m.scored_queries, 2);
        assert!((m.average_total_score - 7.0).abs() < 1e-9);
        assert!((m.dimension_averages["coverage_score"] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn summary_excludes_zero_totals() {
        let results = BTreeMap::from([
            (1, query_result(1, "m", 9.0)),
            (2, query_result(2, "m", 0.0)),
        ]);
        let summary = summary_statistics(&results, &["m".to_string()]);
        let m = &summary.models["m"];
        assert_eq!(m.scored_queries, 1);
        assert_eq!(m.average_total_score, 9.0);
    }

    #[test]
    fn model_without_any_results_averages_zero() {
        let results = BTreeMap::new();
        let summary = summary_statistics(&results, &["m".to_string()]);
        let m = &summary.models["m"];
        assert_eq!(m.scored_queries, 0);
        assert_eq!(m.average_total_score, 0.0);
    }
}
