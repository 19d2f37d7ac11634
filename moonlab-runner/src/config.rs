//! Serializable local-test configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! model_directory = "resources"
//! force_first_train = true
//! train_frequency = 1
//! data_directory = "data"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use moonlab_core::WalkForwardConfig;

/// Project metadata directory created by `init`.
pub const DOT_CRUNCHDAO_DIRECTORY: &str = ".crunchdao";
/// File under [`DOT_CRUNCHDAO_DIRECTORY`] holding the project name.
pub const PROJECT_FILE: &str = "project";
/// File under [`DOT_CRUNCHDAO_DIRECTORY`] holding the push token.
pub const TOKEN_FILE: &str = "token";
/// Default local data directory.
pub const DOT_DATA_DIRECTORY: &str = "data";
/// Aggregated prediction file name inside the data directory.
pub const PREDICTION_FILE: &str = "prediction.csv";
/// Run manifest file name inside the data directory.
pub const RUN_MANIFEST_FILE: &str = "run.json";
/// Dataset description file name inside the data directory.
pub const DATASET_FILE: &str = "dataset.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one local test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Where the user's `train` writes its model and `infer` reads it.
    pub model_directory: PathBuf,
    pub force_first_train: bool,
    /// Retrain on moons divisible by this value; 0 disables periodic retraining.
    pub train_frequency: u64,
    /// Holds `dataset.toml`, and receives `prediction.csv` and `run.json`.
    pub data_directory: PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        let walk_forward = WalkForwardConfig::default();
        Self {
            model_directory: walk_forward.model_directory,
            force_first_train: walk_forward.force_first_train,
            train_frequency: walk_forward.train_frequency,
            data_directory: PathBuf::from(DOT_DATA_DIRECTORY),
        }
    }
}

impl TestConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Driver settings derived from this config.
    pub fn walk_forward(&self) -> WalkForwardConfig {
        WalkForwardConfig {
            model_directory: self.model_directory.clone(),
            force_first_train: self.force_first_train,
            train_frequency: self.train_frequency,
        }
    }

    pub fn prediction_path(&self) -> PathBuf {
        self.data_directory.join(PREDICTION_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_directory.join(RUN_MANIFEST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = TestConfig::from_toml("").unwrap();
        assert_eq!(config, TestConfig::default());
        assert_eq!(config.model_directory, PathBuf::from("resources"));
        assert!(config.force_first_train);
        assert_eq!(config.train_frequency, 1);
        assert_eq!(config.prediction_path(), PathBuf::from("data/prediction.csv"));
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = TestConfig::from_toml(
            r#"
            force_first_train = false
            train_frequency = 0
            "#,
        )
        .unwrap();
        assert!(!config.force_first_train);
        assert_eq!(config.train_frequency, 0);
        assert_eq!(config.data_directory, PathBuf::from("data"));
    }

    #[test]
    fn negative_frequency_is_rejected() {
        assert!(matches!(
            TestConfig::from_toml("train_frequency = -1").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn walk_forward_config_mirrors_fields() {
        let config = TestConfig {
            model_directory: PathBuf::from("models"),
            force_first_train: false,
            train_frequency: 4,
            data_directory: PathBuf::from("local"),
        };
        let wf = config.walk_forward();
        assert_eq!(wf.model_directory, PathBuf::from("models"));
        assert!(!wf.force_first_train);
        assert_eq!(wf.train_frequency, 4);
        assert_eq!(config.manifest_path(), PathBuf::from("local/run.json"));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = TestConfig::from_file(Path::new("/nonexistent/moonlab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn serialization_roundtrip() {
        let config = TestConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(TestConfig::from_toml(&text).unwrap(), config);
    }

    proptest::proptest! {
        #[test]
        fn schedule_fields_survive_toml(
            frequency in 0u64..=i64::MAX as u64,
            force in proptest::bool::ANY,
        ) {
            let text = format!("train_frequency = {frequency}\nforce_first_train = {force}\n");
            let config = TestConfig::from_toml(&text).unwrap();
            let schedule = config.walk_forward().schedule();
            proptest::prop_assert_eq!(config.train_frequency, frequency);
            proptest::prop_assert_eq!(schedule, moonlab_core::TrainSchedule::new(frequency, force));
        }
    }
}
