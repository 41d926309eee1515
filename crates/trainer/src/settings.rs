//! Run configuration
//!
//! Loaded in layers: built-in defaults, an optional TOML file, then
//! `PROPENSITY_*` environment variables (`__` separates nested keys, e.g.
//! `PROPENSITY_TRAINING__SEED=7`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use propensity_gbdt::{GbdtConfig, ImportanceType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SchemaConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Which segments get a chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportPolicy {
    /// Only the first segment in the results table
    #[default]
    First,
    All,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input: PathBuf,
    pub results_dir: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub training: TrainingConfig,
    pub schema: SchemaConfig,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/demo_training_dataset.csv"),
            results_dir: PathBuf::from("results"),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            training: TrainingConfig::default(),
            schema: SchemaConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROPENSITY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.training.validate()?;
        self.report.validate()
    }
}

/// Split, booster and ranking parameters shared by every segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub top_k: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    pub max_bins: usize,
    pub bagging_fraction: f64,
    pub cat_smooth: f64,
    pub max_cat_threshold: usize,
    pub importance_type: ImportanceType,
    pub segment_timeout_secs: Option<u64>,
    /// Worker threads for segment processing; 0 lets rayon decide
    pub threads: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let booster = GbdtConfig::default();
        Self {
            test_fraction: 0.2,
            seed: 42,
            top_k: 10,
            n_estimators: booster.n_estimators,
            learning_rate: booster.learning_rate,
            max_depth: booster.max_depth,
            min_data_in_leaf: booster.min_data_in_leaf,
            min_sum_hessian_in_leaf: booster.min_sum_hessian_in_leaf,
            lambda_l2: booster.lambda_l2,
            max_bins: booster.max_bins,
            bagging_fraction: booster.bagging_fraction,
            cat_smooth: booster.cat_smooth,
            max_cat_threshold: booster.max_cat_threshold,
            importance_type: ImportanceType::Split,
            segment_timeout_secs: None,
            threads: 0,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "training.test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("training.top_k must be at least 1".into()));
        }
        self.gbdt_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("training: {e}")))
    }

    pub fn gbdt_config(&self) -> GbdtConfig {
        GbdtConfig {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            min_data_in_leaf: self.min_data_in_leaf,
            min_sum_hessian_in_leaf: self.min_sum_hessian_in_leaf,
            lambda_l2: self.lambda_l2,
            max_bins: self.max_bins,
            bagging_fraction: self.bagging_fraction,
            cat_smooth: self.cat_smooth,
            max_cat_threshold: self.max_cat_threshold,
            seed: self.seed,
        }
    }

    pub fn segment_timeout(&self) -> Option<Duration> {
        self.segment_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub policy: ReportPolicy,
    pub width: u32,
    pub height: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        // 8x6 inches at 150 dpi
        Self {
            policy: ReportPolicy::First,
            width: 1200,
            height: 900,
        }
    }
}

impl ReportConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 200 || self.height < 150 {
            return Err(ConfigError::Invalid(format!(
                "report size {}x{} is too small",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.training.n_estimators, 200);
        assert_eq!(config.training.learning_rate, 0.05);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.top_k, 10);
        assert_eq!(config.report.policy, ReportPolicy::First);
        assert_eq!(config.schema.label, "purchase");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "results_dir = \"out\"").unwrap();
        writeln!(file, "[training]").unwrap();
        writeln!(file, "n_estimators = 25").unwrap();
        writeln!(file, "importance_type = \"gain\"").unwrap();
        writeln!(file, "[report]").unwrap();
        writeln!(file, "policy = \"all\"").unwrap();
        file.flush().unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.training.n_estimators, 25);
        assert_eq!(config.training.importance_type, ImportanceType::Gain);
        assert_eq!(config.training.learning_rate, 0.05);
        assert_eq!(config.report.policy, ReportPolicy::All);
        assert_eq!(config.schema, SchemaConfig::default());
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/propensity.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.training.test_fraction = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.training.learning_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.training.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gbdt_config_carries_training_values() {
        let training = TrainingConfig {
            n_estimators: 7,
            seed: 9,
            ..TrainingConfig::default()
        };
        let booster = training.gbdt_config();
        assert_eq!(booster.n_estimators, 7);
        assert_eq!(booster.seed, 9);
        assert_eq!(booster.max_bins, 255);
    }
}
