use sha2::{Digest, Sha256};

pub const NS_DIMENSIONS: &str = "dimensions";
pub const NS_WEIGHTS: &str = "weights";
pub const NS_CRITERIA: &str = "criteria";
pub const NS_SCORES: &str = "scores";
pub const NS_MODEL_RESULTS: &str = "model_results";

pub const ALL_NAMESPACES: [&str; 5] = [
    NS_DIMENSIONS,
    NS_WEIGHTS,
    NS_CRITERIA,
    NS_SCORES,
    NS_MODEL_RESULTS,
];

/// Stable content hash of a report's text. A changed report hashes to a new
/// key, so stale scores are simply never looked up again.
pub fn report_hash(report: &str) -> String {
    let mut h = Sha256::new();
    h.update(report.as_bytes());
    format!("{:x}", h.finalize())
}

pub fn dimensions_key(query_id: u64) -> String {
    format!("dimensions_{}", query_id)
}

pub fn weights_key(query_id: u64, additional_count: usize) -> String {
    format!("weights_{}_{}", query_id, additional_count)
}

pub fn criteria_key(query_id: u64, dimension: &str) -> String {
    format!("criteria_{}_{}", query_id, dimension)
}

pub fn scores_key(query_id: u64, report: &str) -> String {
    format!("scores_{}_{}", query_id, report_hash(report))
}

pub fn result_key(query_id: u64, model: &str, report: &str) -> String {
    format!("result_{}_{}_{}", query_id, model, report_hash(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_hash_is_stable_and_content_addressed() {
        let a = report_hash("the report");
        let b = report_hash("the report");
        let c = report_hash("the report, revised");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn result_keys_differ_per_model_and_content() {
        let k1 = result_key(7, "model-a", "text");
        let k2 = result_key(7, "model-b", "text");
        let k3 = result_key(7, "model-a", "other text");
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }
}
