//! Loads the evaluation inputs: queries from a JSONL file and per-model
//! report files from the results directory. Malformed entries are warned
//! about and skipped; both maps are read-only for the rest of the run.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use regex::Regex;
use tracing::{info, warn};

use crate::model::Query;

/// `<data_dir>/input_queries/query.jsonl`, one `{id, prompt}` per line.
pub fn load_queries(data_dir: &Path) -> anyhow::Result<BTreeMap<u64, Query>> {
    let path = data_dir.join("input_queries").join("query.jsonl");
    let file = std::fs::File::open(&path)
        .map_err(|e| anyhow::anyhow!("failed to open query file {}: {}", path.display(), e))?;
    let reader = std::io::BufReader::new(file);

    let mut queries = BTreeMap::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Query>(&line) {
            Ok(query) => {
                queries.insert(query.id, query);
            }
            Err(e) => {
                warn!("query line {} skipped: {}", i + 1, e);
            }
        }
    }
    info!(count = queries.len(), "loaded queries");
    Ok(queries)
}

/// `<data_dir>/method_results/<model>/*.json`, each holding the report text
/// at `entries[0].response`. Returns model -> query id -> report text.
pub fn load_model_results(
    data_dir: &Path,
) -> anyhow::Result<BTreeMap<String, BTreeMap<u64, String>>> {
    let results_dir = data_dir.join("method_results");
    if !results_dir.is_dir() {
        warn!("model results directory not found: {}", results_dir.display());
        return Ok(BTreeMap::new());
    }

    let mut all = BTreeMap::new();
    for entry in std::fs::read_dir(&results_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let model = entry.file_name().to_string_lossy().to_string();
        let reports = load_reports(&entry.path());
        info!(%model, count = reports.len(), "loaded model results");
        all.insert(model, reports);
    }
    Ok(all)
}

fn load_reports(model_dir: &Path) -> BTreeMap<u64, String> {
    let mut reports = BTreeMap::new();
    let entries = match std::fs::read_dir(model_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to read {}: {}", model_dir.display(), e);
            return reports;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".json") {
            continue;
        }
        let Some(query_id) = extract_query_id(&name) else {
            continue;
        };
        match read_report(&path) {
            Some(report) => {
                reports.insert(query_id, report);
            }
            None => {
                warn!("report file {} skipped: no response text", path.display());
            }
        }
    }
    reports
}

/// Report filenames come in two shapes: `deep_research_<id>_<ts>.json` and
/// `<id>.json`.
fn extract_query_id(filename: &str) -> Option<u64> {
    let patterns = [r"deep_research_(\d+)_", r"^(\d+)\.json$"];
    for pattern in patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(caps) = re.captures(filename) {
            if let Ok(id) = caps[1].parse() {
                return Some(id);
            }
        }
    }
    None
}

fn read_report(path: &Path) -> Option<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("failed to parse {}: {}", path.display(), e);
            return None;
        }
    };
    value
        .pointer("/entries/0/response")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_from_both_filename_shapes() {
        assert_eq!(extract_query_id("deep_research_12_20250101.json"), Some(12));
        assert_eq!(extract_query_id("7.json"), Some(7));
        assert_eq!(extract_query_id("notes.json"), None);
        assert_eq!(extract_query_id("deep_research_x_1.json"), None);
    }
}
