//! Pure weighted aggregation of raw criterion scores. Deterministic, no
//! I/O, recomputed on every call rather than cached.

use std::collections::BTreeMap;

use crate::model::{Criterion, CriterionScore, DimensionWeights};

/// Collapse raw per-criterion scores into one score per dimension plus a
/// single weighted total.
///
/// Per dimension: weighted mean over *matched* criteria — present both in
/// the dimension's criteria definition and in the returned scores, matched
/// by exact name. Unmatched criteria are excluded from numerator and
/// denominator alike, never treated as score 0. No matches at all yields
/// 0.0 for the dimension.
///
/// Total: sum of `dimension_score x dimension_weight` over dimensions
/// present in both the scores map and the weights map. A dimension missing
/// from scores is excluded from the sum; the remaining weights are not
/// renormalized to compensate.
pub fn hierarchical_scores(
    raw_scores: &BTreeMap<String, Vec<CriterionScore>>,
    criteria: &BTreeMap<String, Vec<Criterion>>,
    weights: &DimensionWeights,
) -> BTreeMap<String, f64> {
    let mut final_scores = BTreeMap::new();
    let mut total_weighted_score = 0.0;

    for (dimension, criteria_list) in criteria {
        let Some(dim_scores) = raw_scores.get(dimension) else {
            continue;
        };

        let by_name: BTreeMap<&str, f64> = dim_scores
            .iter()
            .map(|s| (s.criterion.as_str(), s.score))
            .collect();

        let mut weighted_sum = 0.0;
        let mut matched_weight = 0.0;
        for criterion in criteria_list {
            if let Some(score) = by_name.get(criterion.criterion.as_str()) {
                weighted_sum += score * criterion.weight;
                matched_weight += criterion.weight;
            }
        }

        let dimension_score = if matched_weight > 0.0 {
            weighted_sum / matched_weight
        } else {
            0.0
        };
        final_scores.insert(format!("{}_score", dimension), dimension_score);

        if let Some(weight) = weights.get(dimension) {
            total_weighted_score += dimension_score * weight;
        }
    }

    final_scores.insert("total_weighted_score".to_string(), total_weighted_score);
    final_scores
}
