//! Derives the evaluation frame for a query: additional dimensions,
//! hierarchical dimension weights, and per-dimension criteria. Every stage
//! is cache-gated and degrades to a safe default instead of failing the
//! query.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::key;
use crate::cache::CacheStore;
use crate::extract;
use crate::model::{Criterion, Dimension, DimensionWeights, Query};
use crate::prompts;
use crate::providers::llm::{generate, ChatClient, ChatMessage};

/// The four dimensions every query is scored on, in canonical form.
pub const FIXED_DIMENSIONS: [(&str, &str); 4] = [
    ("coverage", "Breadth, depth, and relevance of coverage"),
    ("insight", "Depth, originality, logic, and value of analysis"),
    ("instruction_following", "Accuracy in meeting all requirements"),
    ("clarity", "Readability, fluency, structure, and ease of understanding"),
];

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Canonical map key for a dimension name. Upstream generation is free text
/// and varies in casing and punctuation.
pub fn canonical_name(raw: &str) -> String {
    raw.to_lowercase().replace(' ', "_").replace('-', "_")
}

/// Everything the scorer and aggregator need for one query's reports.
#[derive(Debug, Clone)]
pub struct CriteriaPlan {
    pub query_id: u64,
    pub dimensions: BTreeMap<String, String>,
    pub additional_dimensions: Vec<Dimension>,
    pub weights: DimensionWeights,
    pub criteria: BTreeMap<String, Vec<Criterion>>,
    /// Live-generation spend for this call; 0.0 when served from cache.
    pub cost_usd: f64,
}

pub struct DimensionPlanner {
    client: Arc<dyn ChatClient>,
    cache: CacheStore,
    max_attempts: u32,
}

impl DimensionPlanner {
    pub fn new(client: Arc<dyn ChatClient>, cache: CacheStore, max_attempts: u32) -> Self {
        Self {
            client,
            cache,
            max_attempts,
        }
    }

    /// Run all three stages and assemble the plan. Stages already cached are
    /// served without a collaborator call.
    pub async fn plan(&self, query: &Query) -> CriteriaPlan {
        let mut cost_usd = 0.0;

        let (additional, cost) = self.additional_dimensions(query).await;
        cost_usd += cost;

        let (weights, cost) = self.dimension_weights(query, &additional).await;
        cost_usd += cost;

        let dimensions = all_dimensions(&additional);

        let mut criteria = BTreeMap::new();
        for name in dimensions.keys() {
            let (list, cost) = self.dimension_criteria(query, name, &dimensions).await;
            cost_usd += cost;
            criteria.insert(name.clone(), list);
        }

        CriteriaPlan {
            query_id: query.id,
            dimensions,
            additional_dimensions: additional,
            weights,
            criteria,
            cost_usd,
        }
    }

    /// Stage 1: 1-3 query-specific dimensions beyond the fixed four. Parse
    /// failure degrades to an empty list (the fixed dimensions alone), which
    /// is cached like any other outcome.
    pub async fn additional_dimensions(&self, query: &Query) -> (Vec<Dimension>, f64) {
        let cache_key = key::dimensions_key(query.id);
        if let Some(cached) = self.cache.get_as::<Vec<Dimension>>(key::NS_DIMENSIONS, &cache_key) {
            info!(query_id = query.id, "using cached dimensions");
            return (cached, 0.0);
        }

        info!(query_id = query.id, "generating query-specific dimensions");
        let messages = [ChatMessage::user(prompts::dimension_generation(&query.prompt))];

        let mut cost_usd = 0.0;
        let dimensions = match generate(self.client.as_ref(), &messages, self.max_attempts).await {
            Ok(reply) => {
                cost_usd = reply.cost_usd;
                match parse_dimensions(&reply.text) {
                    Some(dims) => {
                        info!(query_id = query.id, count = dims.len(), "generated dimensions");
                        dims
                    }
                    None => {
                        warn!(query_id = query.id, "no dimension list in response, using fixed dimensions only");
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                warn!(query_id = query.id, "dimension generation failed: {}", e);
                Vec::new()
            }
        };

        self.cache.set(key::NS_DIMENSIONS, &cache_key, &dimensions);
        (dimensions, cost_usd)
    }

    /// Stage 2: one weight per dimension (fixed + additional), normalized to
    /// sum to 1.0. Parse failure degrades to equal weights. Cached weights
    /// are renormalized on load if their sum drifted.
    pub async fn dimension_weights(
        &self,
        query: &Query,
        additional: &[Dimension],
    ) -> (DimensionWeights, f64) {
        let cache_key = key::weights_key(query.id, additional.len());
        if let Some(cached) = self.cache.get_as::<DimensionWeights>(key::NS_WEIGHTS, &cache_key) {
            info!(query_id = query.id, "using cached weights");
            return (renormalized_on_load(cached), 0.0);
        }

        info!(query_id = query.id, "generating hierarchical weights");
        let additional_json =
            serde_json::to_string_pretty(additional).unwrap_or_else(|_| "[]".to_string());
        let messages = [ChatMessage::user(prompts::weight_generation(
            &query.prompt,
            &additional_json,
        ))];

        let mut cost_usd = 0.0;
        let weights = match generate(self.client.as_ref(), &messages, self.max_attempts).await {
            Ok(reply) => {
                cost_usd = reply.cost_usd;
                match parse_weights(&reply.text) {
                    Some(weights) => weights,
                    None => {
                        warn!(query_id = query.id, "no weight map in response, using equal weights");
                        default_weights(additional)
                    }
                }
            }
            Err(e) => {
                warn!(query_id = query.id, "weight generation failed: {}", e);
                default_weights(additional)
            }
        };

        self.cache.set(key::NS_WEIGHTS, &cache_key, &weights);
        (weights, cost_usd)
    }

    /// Stage 3: criteria for one dimension, in-dimension weights normalized
    /// to sum to 1.0. Failure degrades to a single full-weight default
    /// criterion, so a dimension is never left with zero criteria.
    pub async fn dimension_criteria(
        &self,
        query: &Query,
        dimension: &str,
        dimensions: &BTreeMap<String, String>,
    ) -> (Vec<Criterion>, f64) {
        let cache_key = key::criteria_key(query.id, dimension);
        if let Some(cached) = self.cache.get_as::<Vec<Criterion>>(key::NS_CRITERIA, &cache_key) {
            return (cached, 0.0);
        }

        info!(query_id = query.id, dimension, "generating criteria");
        let meta_dimensions = dimensions
            .iter()
            .map(|(name, definition)| format!("- **{}**: {}", name, definition))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [ChatMessage::user(prompts::criteria_generation(
            &query.prompt,
            dimensions.len(),
            &meta_dimensions,
            dimension,
        ))];

        let mut cost_usd = 0.0;
        let criteria = match generate(self.client.as_ref(), &messages, self.max_attempts).await {
            Ok(reply) => {
                cost_usd = reply.cost_usd;
                match parse_criteria(&reply.text) {
                    Some(list) => {
                        info!(query_id = query.id, dimension, count = list.len(), "generated criteria");
                        list
                    }
                    None => {
                        warn!(query_id = query.id, dimension, "no criteria list in response, using default");
                        default_criteria(dimension)
                    }
                }
            }
            Err(e) => {
                warn!(query_id = query.id, dimension, "criteria generation failed: {}", e);
                default_criteria(dimension)
            }
        };

        self.cache.set(key::NS_CRITERIA, &cache_key, &criteria);
        (criteria, cost_usd)
    }
}

/// Fixed dimensions plus canonicalized additional ones, with definitions.
pub fn all_dimensions(additional: &[Dimension]) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = FIXED_DIMENSIONS
        .iter()
        .map(|(name, definition)| (name.to_string(), definition.to_string()))
        .collect();
    for dim in additional {
        map.insert(canonical_name(&dim.name), dim.definition.clone());
    }
    map
}

fn parse_dimensions(text: &str) -> Option<Vec<Dimension>> {
    let json = extract::json_from_text(text)?;
    serde_json::from_str(&json).ok()
}

fn parse_weights(text: &str) -> Option<DimensionWeights> {
    let json = extract::json_from_tagged(text)?;
    let raw: BTreeMap<String, f64> = serde_json::from_str(&json).ok()?;
    Some(normalized_weights(raw))
}

fn parse_criteria(text: &str) -> Option<Vec<Criterion>> {
    let json = extract::json_from_tagged(text)?;
    let list: Vec<Criterion> = serde_json::from_str(&json).ok()?;
    if list.is_empty() {
        return None;
    }
    Some(normalized_criteria(list))
}

/// Canonicalize keys and scale so the weights sum to exactly 1.0 (when the
/// raw sum is positive).
pub fn normalized_weights(raw: BTreeMap<String, f64>) -> DimensionWeights {
    let total: f64 = raw.values().sum();
    let mut out = DimensionWeights::new();
    for (name, weight) in raw {
        let weight = if total > 0.0 { weight / total } else { weight };
        out.insert(canonical_name(&name), weight);
    }
    out
}

/// Scale in-dimension criterion weights to sum to 1.0.
pub fn normalized_criteria(mut list: Vec<Criterion>) -> Vec<Criterion> {
    let total: f64 = list.iter().map(|c| c.weight).sum();
    if total > 0.0 {
        for c in &mut list {
            c.weight /= total;
        }
    }
    list
}

/// Equal weights across the fixed four plus any additional dimensions.
pub fn default_weights(additional: &[Dimension]) -> DimensionWeights {
    let count = FIXED_DIMENSIONS.len() + additional.len();
    let equal = 1.0 / count as f64;
    let mut weights = DimensionWeights::new();
    for (name, _) in FIXED_DIMENSIONS {
        weights.insert(name.to_string(), equal);
    }
    for dim in additional {
        weights.insert(canonical_name(&dim.name), equal);
    }
    weights
}

pub fn default_criteria(dimension: &str) -> Vec<Criterion> {
    vec![Criterion {
        criterion: format!("General {} assessment", dimension),
        explanation: format!("Overall assessment of {} quality", dimension),
        weight: 1.0,
    }]
}

fn renormalized_on_load(weights: DimensionWeights) -> DimensionWeights {
    let total: f64 = weights.values().sum();
    if total > 0.0 && (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        warn!("cached weights sum to {:.4}, renormalizing", total);
        return weights.into_iter().map(|(k, v)| (k, v / total)).collect();
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_lowercases_and_underscores() {
        assert_eq!(canonical_name("Data Recency"), "data_recency");
        assert_eq!(canonical_name("cost-benefit rigor"), "cost_benefit_rigor");
        assert_eq!(canonical_name("clarity"), "clarity");
    }

    #[test]
    fn weights_renormalize_to_unit_sum() {
        let raw = BTreeMap::from([
            ("coverage".to_string(), 2.0),
            ("insight".to_string(), 1.0),
            ("instruction_following".to_string(), 1.0),
            ("clarity".to_string(), 0.0),
        ]);
        let weights = normalized_weights(raw);
        assert_eq!(weights["coverage"], 0.5);
        assert_eq!(weights["insight"], 0.25);
        assert_eq!(weights["instruction_following"], 0.25);
        assert_eq!(weights["clarity"], 0.0);
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn weight_keys_are_canonicalized() {
        let raw = BTreeMap::from([
            ("Instruction Following".to_string(), 1.0),
            ("Data-Recency".to_string(), 1.0),
        ]);
        let weights = normalized_weights(raw);
        assert!(weights.contains_key("instruction_following"));
        assert!(weights.contains_key("data_recency"));
    }

    #[test]
    fn criterion_weights_renormalize_to_unit_sum() {
        let list = vec![
            Criterion {
                criterion: "c1".into(),
                explanation: "".into(),
                weight: 3.0,
            },
            Criterion {
                criterion: "c2".into(),
                explanation: "".into(),
                weight: 1.0,
            },
        ];
        let out = normalized_criteria(list);
        assert_eq!(out[0].weight, 0.75);
        assert_eq!(out[1].weight, 0.25);
        let sum: f64 = out.iter().map(|c| c.weight).sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn default_weights_split_equally_across_all_dimensions() {
        let additional = vec![Dimension {
            name: "Data Recency".into(),
            definition: "freshness of sources".into(),
        }];
        let weights = default_weights(&additional);
        assert_eq!(weights.len(), 5);
        for w in weights.values() {
            assert!((w - 0.2).abs() < 1e-12);
        }
        assert!(weights.contains_key("data_recency"));
    }

    #[test]
    fn default_criteria_is_a_single_full_weight_item() {
        let list = default_criteria("clarity");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].criterion, "General clarity assessment");
        assert_eq!(list[0].weight, 1.0);
    }

    #[test]
    fn drifted_cached_weights_are_renormalized() {
        let weights = BTreeMap::from([
            ("coverage".to_string(), 0.6),
            ("insight".to_string(), 0.6),
        ]);
        let out = renormalized_on_load(weights);
        let sum: f64 = out.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);

        let in_tolerance = BTreeMap::from([
            ("coverage".to_string(), 0.5004),
            ("insight".to_string(), 0.5),
        ]);
        let kept = renormalized_on_load(in_tolerance.clone());
        assert_eq!(kept, in_tolerance);
    }
}
