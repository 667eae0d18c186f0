//! Model configuration loaded from a JSON file.
//!
//! The config file defines the feature schema (an ordered list of feature
//! names, which fixes the row width everywhere else) and the boosting
//! hyperparameters. A missing or malformed config is fatal to the run.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading or validating a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Training configuration.
///
/// ```json
/// {
///   "features": ["clicks", "impressions", "position"],
///   "num_trees": 100,
///   "max_depth": 6,
///   "learning_rate": 0.1
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Ordered feature names; defines the fixed feature width of every row.
    features: Vec<String>,

    /// Number of boosting rounds (trees grown beyond the base score).
    #[serde(default = "default_num_trees")]
    pub num_trees: usize,

    /// Maximum tree depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Shrinkage applied to each grown tree's leaf values.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Minimum examples on each side of a split.
    #[serde(default = "default_min_node_examples")]
    pub min_node_examples: usize,
}

fn default_num_trees() -> usize {
    100
}

fn default_max_depth() -> usize {
    6
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_min_node_examples() -> usize {
    1
}

impl Config {
    /// Load and validate a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.features.is_empty() {
            return Err(ConfigError::Invalid("feature list is empty".into()));
        }
        if self.num_trees == 0 {
            return Err(ConfigError::Invalid("num_trees must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if self.min_node_examples == 0 {
            return Err(ConfigError::Invalid(
                "min_node_examples must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fixed feature width of every data row.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Name of feature `idx`.
    pub fn feature_name(&self, idx: usize) -> &str {
        &self.features[idx]
    }

    /// Ordered feature names.
    pub fn feature_names(&self) -> &[String] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = Config::from_json(
            r#"{
                "features": ["a", "b", "c"],
                "num_trees": 50,
                "max_depth": 4,
                "learning_rate": 0.05,
                "min_node_examples": 10
            }"#,
        )
        .unwrap();
        assert_eq!(config.n_features(), 3);
        assert_eq!(config.feature_name(1), "b");
        assert_eq!(config.num_trees, 50);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.min_node_examples, 10);
    }

    #[test]
    fn defaults_apply_when_omitted() {
        let config = Config::from_json(r#"{"features": ["x"]}"#).unwrap();
        assert_eq!(config.num_trees, 100);
        assert_eq!(config.max_depth, 6);
        assert!((config.learning_rate - 0.1).abs() < 1e-12);
        assert_eq!(config.min_node_examples, 1);
    }

    #[test]
    fn rejects_empty_feature_list() {
        let err = Config::from_json(r#"{"features": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_trees() {
        let err = Config::from_json(r#"{"features": ["x"], "num_trees": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = Config::from_json(r#"{"features": ["x"], "tree_count": 5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/treeboost.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
