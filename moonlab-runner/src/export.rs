//! Persistence of the aggregated prediction CSV and the run manifest.
//!
//! Both artifacts are written atomically: write to `.tmp`, rename into
//! place. The manifest carries a `schema_version`; unknown versions are
//! rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use moonlab_core::{Moon, MoonStep, PredictionSink, SinkError, WalkForwardResult};

use crate::config::{TestConfig, PREDICTION_FILE};
use crate::data_loader::InputHashes;

/// Current run manifest schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ─── Atomic write ───────────────────────────────────────────────────

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, bytes).map_err(io_err(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        SinkError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Encode a frame as CSV with a header row and no index column.
pub fn frame_to_csv(frame: &DataFrame, path: &Path) -> Result<Vec<u8>, SinkError> {
    let mut buffer = Vec::new();
    let mut frame = frame.clone();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut frame)
        .map_err(|e| SinkError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(buffer)
}

/// Write a frame as CSV, creating the parent directory.
pub fn write_frame_csv(frame: &DataFrame, path: &Path) -> Result<(), SinkError> {
    let bytes = frame_to_csv(frame, path)?;
    write_atomic(path, &bytes)
}

/// Writes the aggregated prediction to a fixed CSV path.
#[derive(Debug, Clone)]
pub struct CsvPredictionSink {
    path: PathBuf,
}

impl CsvPredictionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<directory>/prediction.csv`
    pub fn in_directory(directory: &Path) -> Self {
        Self::new(directory.join(PREDICTION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionSink<DataFrame> for CsvPredictionSink {
    fn persist(&mut self, prediction: &DataFrame) -> Result<PathBuf, SinkError> {
        write_frame_csv(prediction, &self.path)?;
        Ok(self.path.clone())
    }
}

// ─── Run manifest ───────────────────────────────────────────────────

/// Record of a completed local test, written next to the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub module: String,
    pub moon_column: String,
    pub embargo: Moon,
    pub config: TestConfig,
    pub steps: Vec<MoonStep>,
    pub trained_moons: Vec<Moon>,
    pub prediction_rows: usize,
    pub prediction_path: PathBuf,
    pub inputs: InputHashes,
    pub completed_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn from_result<T>(
        module: &str,
        moon_column: &str,
        embargo: Moon,
        config: &TestConfig,
        result: &WalkForwardResult<T>,
        prediction_rows: usize,
        inputs: InputHashes,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            module: module.to_string(),
            moon_column: moon_column.to_string(),
            embargo,
            config: config.clone(),
            steps: result.steps.clone(),
            trained_moons: result.trained_moons(),
            prediction_rows,
            prediction_path: result.prediction_path.clone(),
            inputs,
            completed_at: Utc::now(),
        }
    }

    pub fn moons(&self) -> Vec<Moon> {
        self.steps.iter().map(|s| s.moon).collect()
    }
}

/// Write the manifest as pretty JSON.
pub fn write_manifest(manifest: &RunManifest, path: &Path) -> Result<(), SinkError> {
    let json = serde_json::to_vec_pretty(manifest).map_err(|e| SinkError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    write_atomic(path, &json)
}

/// Read a manifest back, rejecting newer schema versions.
pub fn read_manifest(path: &Path) -> anyhow::Result<RunManifest> {
    use anyhow::{bail, Context};

    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read run manifest {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&text).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction() -> DataFrame {
        df!(
            "id" => &["a", "b"],
            "date" => &[10i64, 20],
            "value" => &[0.5, 1.5],
        )
        .unwrap()
    }

    fn hashes() -> InputHashes {
        InputHashes {
            x_train: "aa".into(),
            y_train: "bb".into(),
            x_test: "cc".into(),
        }
    }

    fn result() -> WalkForwardResult<DataFrame> {
        WalkForwardResult {
            prediction: prediction(),
            steps: vec![
                MoonStep {
                    moon: 10,
                    trained: true,
                    train_rows: 5,
                    test_rows: 1,
                    prediction_rows: 1,
                },
                MoonStep {
                    moon: 20,
                    trained: false,
                    train_rows: 15,
                    test_rows: 1,
                    prediction_rows: 1,
                },
            ],
            prediction_path: PathBuf::from("data/prediction.csv"),
        }
    }

    #[test]
    fn csv_has_header_and_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/prediction.csv");
        write_frame_csv(&prediction(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,date,value"));
        assert_eq!(lines.next(), Some("a,10,0.5"));
        assert_eq!(lines.next(), Some("b,20,1.5"));
        assert!(!dir.path().join("nested/prediction.csv.tmp").exists());
    }

    #[test]
    fn sink_returns_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvPredictionSink::in_directory(dir.path());
        let path = sink.persist(&prediction()).unwrap();
        assert_eq!(path, dir.path().join("prediction.csv"));
        assert!(path.exists());
    }

    #[test]
    fn manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let manifest = RunManifest::from_result(
            "pipeline",
            "moon",
            2,
            &TestConfig::default(),
            &result(),
            2,
            hashes(),
        );
        assert_eq!(manifest.trained_moons, vec![10]);
        assert_eq!(manifest.moons(), vec![10, 20]);

        write_manifest(&manifest, &path).unwrap();
        let loaded = read_manifest(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn manifest_rejects_future_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut manifest = RunManifest::from_result(
            "pipeline",
            "moon",
            0,
            &TestConfig::default(),
            &result(),
            2,
            hashes(),
        );
        manifest.schema_version = SCHEMA_VERSION + 1;
        write_manifest(&manifest, &path).unwrap();

        let err = read_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }
}
