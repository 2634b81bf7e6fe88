use std::path::Path;

use tracing::info;

use crate::model::RunResults;

pub fn write_results(results: &RunResults, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(results)?;
    std::fs::write(path, body)?;
    info!("results saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunSummary;
    use std::collections::BTreeMap;

    #[test]
    fn writes_into_a_fresh_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("results.json");
        let results = RunResults {
            generated_at: "2026-01-01T00:00:00Z".into(),
            model_names: vec!["m".into()],
            query_results: BTreeMap::new(),
            summary: RunSummary::default(),
            selected_query_count: 0,
            total_query_count: 0,
            selected_query_ids: Vec::new(),
            total_cost_usd: 0.0,
        };
        write_results(&results, &path)?;

        let raw = std::fs::read_to_string(&path)?;
        let back: RunResults = serde_json::from_str(&raw)?;
        assert_eq!(back.model_names, vec!["m".to_string()]);
        Ok(())
    }
}
