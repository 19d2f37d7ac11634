//! Dataset loading: where the three input tables come from and how they are read.
//!
//! A [`DataSource`] answers with a [`DatasetManifest`] (embargo, moon column,
//! three file paths). [`load_datasets`] reads the files through polars,
//! checks the moon column is present, and fingerprints each file.
//!
//! [`LocalDataSource`] reads the manifest from `dataset.toml`:
//!
//! ```toml
//! embargo = 4
//! moon_column = "moon"
//! x_train = "X_train.parquet"
//! y_train = "y_train.parquet"
//! x_test = "X_test.csv"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use moonlab_core::{Datasets, Moon};

use crate::config::DATASET_FILE;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset description {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported file format for {0} (expected .csv or .parquet)")]
    UnsupportedFormat(PathBuf),

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("{path} has no moon column '{column}'")]
    MissingMoonColumn { path: PathBuf, column: String },
}

/// Description of one dataset release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub embargo: Moon,
    pub moon_column: String,
    pub x_train: PathBuf,
    pub y_train: PathBuf,
    pub x_test: PathBuf,
}

/// Where datasets come from.
pub trait DataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Describe the dataset to test against. Paths must be readable locally.
    fn fetch(&self) -> Result<DatasetManifest, LoadError>;
}

/// A data directory holding `dataset.toml` and the files it names.
pub struct LocalDataSource {
    directory: PathBuf,
}

impl LocalDataSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl DataSource for LocalDataSource {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch(&self) -> Result<DatasetManifest, LoadError> {
        let path = self.directory.join(DATASET_FILE);
        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let mut manifest: DatasetManifest =
            toml::from_str(&text).map_err(|source| LoadError::Manifest { path, source })?;

        // Relative file paths are relative to the data directory.
        for file in [
            &mut manifest.x_train,
            &mut manifest.y_train,
            &mut manifest.x_test,
        ] {
            if file.is_relative() {
                *file = self.directory.join(&*file);
            }
        }

        Ok(manifest)
    }
}

/// blake3 fingerprints of the three input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputHashes {
    pub x_train: String,
    pub y_train: String,
    pub x_test: String,
}

/// Tables read from a manifest, plus their fingerprints.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub datasets: Datasets<DataFrame>,
    pub hashes: InputHashes,
}

/// Read a CSV or Parquet file, chosen by extension.
pub fn read_frame(path: &Path) -> Result<DataFrame, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let parse_err = |source: PolarsError| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    match extension.as_deref() {
        Some("csv") => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(parse_err),
        Some("parquet") => {
            let file = fs::File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            ParquetReader::new(file).finish().map_err(parse_err)
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Hex blake3 hash of a file's bytes.
pub fn hash_file(path: &Path) -> Result<String, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn read_with_moon(path: &Path, moon_column: &str) -> Result<DataFrame, LoadError> {
    let frame = read_frame(path)?;
    if frame.column(moon_column).is_err() {
        return Err(LoadError::MissingMoonColumn {
            path: path.to_path_buf(),
            column: moon_column.to_string(),
        });
    }
    debug!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        "read dataset"
    );
    Ok(frame)
}

/// Read the three tables a manifest names.
pub fn load_datasets(manifest: &DatasetManifest) -> Result<LoadedData, LoadError> {
    let column = manifest.moon_column.as_str();
    let datasets = Datasets {
        x_train: read_with_moon(&manifest.x_train, column)?,
        y_train: read_with_moon(&manifest.y_train, column)?,
        x_test: read_with_moon(&manifest.x_test, column)?,
        moon_column: manifest.moon_column.clone(),
        embargo: manifest.embargo,
    };
    let hashes = InputHashes {
        x_train: hash_file(&manifest.x_train)?,
        y_train: hash_file(&manifest.y_train)?,
        x_test: hash_file(&manifest.x_test)?,
    };

    info!(
        embargo = manifest.embargo,
        moon_column = %manifest.moon_column,
        "loaded datasets"
    );

    Ok(LoadedData { datasets, hashes })
}
