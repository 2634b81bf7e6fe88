use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::model::QuerySelection;

/// Run settings, loaded from YAML with defaults for everything but the data
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub target_models: Vec<String>,
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub query_selection: QuerySelection,
    #[serde(default)]
    pub output: OutputSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError(format!("failed to read settings {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
        settings.evaluation.validate()?;
        Ok(settings)
    }
}

/// The grading model and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default = "default_judge_model")]
    pub model: String,
    /// openai | openrouter | replay
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            model: default_judge_model(),
            provider: default_provider(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Outer pool: concurrent queries. Sequential by default.
    #[serde(default = "default_query_workers")]
    pub query_workers: usize,
    /// Inner pool: concurrent dimensions within one report-scoring call.
    #[serde(default = "default_dimension_workers")]
    pub dimension_workers: usize,
    /// Cap on concurrent collaborator calls: the two pool sizes multiply,
    /// and their product must stay under this.
    #[serde(default = "default_concurrency_ceiling")]
    pub concurrency_ceiling: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl EvaluationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_workers == 0 || self.dimension_workers == 0 {
            return Err(ConfigError("worker pool sizes must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError("max_attempts must be at least 1".into()));
        }
        let product = self.query_workers * self.dimension_workers;
        if product > self.concurrency_ceiling {
            return Err(ConfigError(format!(
                "query_workers x dimension_workers = {} exceeds the concurrency ceiling {}",
                product, self.concurrency_ceiling
            )));
        }
        Ok(())
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            query_workers: default_query_workers(),
            dimension_workers: default_dimension_workers(),
            concurrency_ceiling: default_concurrency_ceiling(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    #[serde(default = "default_print_results")]
    pub print_results: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            results_file: default_results_file(),
            print_results: default_print_results(),
        }
    }
}

fn default_judge_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("outputs/cache")
}

fn default_query_workers() -> usize {
    1
}

fn default_dimension_workers() -> usize {
    4
}

fn default_concurrency_ceiling() -> usize {
    16
}

fn default_max_attempts() -> u32 {
    3
}

fn default_results_file() -> PathBuf {
    PathBuf::from("outputs/pointwise_results.json")
}

fn default_print_results() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_gets_defaults() {
        let settings: Settings = serde_yaml::from_str("data_dir: data/arena").unwrap();
        assert_eq!(settings.evaluation.query_workers, 1);
        assert_eq!(settings.evaluation.dimension_workers, 4);
        assert_eq!(settings.judge.model, "gpt-5-mini");
        assert_eq!(settings.judge.max_tokens, 8192);
        assert!(settings.output.print_results);
        settings.evaluation.validate().unwrap();
    }

    #[test]
    fn pool_product_over_ceiling_is_rejected() {
        let mut eval = EvaluationSettings::default();
        eval.query_workers = 5;
        eval.dimension_workers = 4;
        eval.concurrency_ceiling = 16;
        assert!(eval.validate().is_err());

        eval.concurrency_ceiling = 20;
        assert!(eval.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut eval = EvaluationSettings::default();
        eval.dimension_workers = 0;
        assert!(eval.validate().is_err());
    }
}
