use crate::model::RunResults;

const FIXED_SCORE_KEYS: [&str; 4] = [
    "coverage_score",
    "insight_score",
    "instruction_following_score",
    "clarity_score",
];

/// Ranked per-model leaderboard: average total, the four fixed dimension
/// averages, the mean of the query-specific dimension averages, and how many
/// queries actually produced a score.
pub fn print_results(results: &RunResults) {
    println!();
    println!("{}", "=".repeat(94));
    println!("Pointwise Evaluation Results");
    println!("{}", "=".repeat(94));

    if results.summary.models.is_empty() {
        println!("No results to display.");
        return;
    }

    let mut ranked: Vec<_> = results.summary.models.iter().collect();
    ranked.sort_by(|a, b| {
        b.1.average_total_score
            .partial_cmp(&a.1.average_total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!(
        "{:<4} {:<25} {:<10} {:<6} {:<7} {:<6} {:<6} {:<6} {:<8}",
        "Rank", "Model", "Avg Score", "Cove", "Insight", "InstrF", "Clar", "Meta", "Queries"
    );
    println!("{}", "-".repeat(94));

    for (rank, (model, stats)) in ranked.iter().enumerate() {
        let fixed: Vec<f64> = FIXED_SCORE_KEYS
            .iter()
            .map(|k| stats.dimension_averages.get(*k).copied().unwrap_or(0.0))
            .collect();

        let meta_scores: Vec<f64> = stats
            .dimension_averages
            .iter()
            .filter(|(name, _)| !FIXED_SCORE_KEYS.contains(&name.as_str()))
            .map(|(_, v)| *v)
            .collect();
        let meta_avg = if meta_scores.is_empty() {
            0.0
        } else {
            meta_scores.iter().sum::<f64>() / meta_scores.len() as f64
        };

        println!(
            "{:<4} {:<25} {:<10.3} {:<6.1} {:<7.1} {:<6.1} {:<6.1} {:<6.1} {:<8}",
            rank + 1,
            model,
            stats.average_total_score,
            fixed[0],
            fixed[1],
            fixed[2],
            fixed[3],
            meta_avg,
            stats.scored_queries
        );
    }

    println!("{}", "=".repeat(94));
    println!(
        "Queries: {} of {}  |  Run cost: ${:.4}",
        results.selected_query_count, results.total_query_count, results.total_cost_usd
    );
    println!("{}", "=".repeat(94));
}
