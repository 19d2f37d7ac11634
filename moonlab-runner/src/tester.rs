//! The local tester: one call from a user module to a persisted prediction.
//!
//! Order of operations:
//! 1. resolve the module's hooks (nothing else happens if one is missing)
//! 2. ask the data source for the dataset and read it
//! 3. run the walk-forward loop, persisting `prediction.csv`
//! 4. record `run.json` next to it
//!
//! A run leaves both files or neither: if `run.json` cannot be written the
//! prediction is removed again.

use std::fs;
use std::path::PathBuf;

use polars::prelude::DataFrame;
use thiserror::Error;
use tracing::{info, warn};

use moonlab_core::{
    resolve, run_walk_forward, EnsureError, Reporter, RunError, SinkError, UserModule,
    WalkForwardResult,
};

use crate::config::TestConfig;
use crate::data_loader::{load_datasets, DataSource, LoadError};
use crate::export::{write_manifest, CsvPredictionSink, RunManifest};

#[derive(Debug, Error)]
pub enum TestError {
    #[error(transparent)]
    Module(#[from] EnsureError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("cannot record run manifest: {0}")]
    Manifest(#[source] SinkError),
}

/// A completed local test.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub result: WalkForwardResult<DataFrame>,
    pub manifest: RunManifest,
    pub manifest_path: PathBuf,
}

/// Run `module` against the dataset `source` describes.
pub fn run_local_test(
    module: &dyn UserModule<DataFrame>,
    source: &dyn DataSource,
    config: &TestConfig,
    reporter: &dyn Reporter,
) -> Result<TestOutcome, TestError> {
    let hooks = resolve(module)?;
    info!(module = module.name(), source = source.name(), "starting local test");

    let manifest = source.fetch()?;
    let loaded = load_datasets(&manifest)?;

    let mut sink = CsvPredictionSink::new(config.prediction_path());
    let result = run_walk_forward(
        &hooks,
        &loaded.datasets,
        &config.walk_forward(),
        reporter,
        &mut sink,
    )?;

    let run_manifest = RunManifest::from_result(
        module.name(),
        &loaded.datasets.moon_column,
        loaded.datasets.embargo,
        config,
        &result,
        result.prediction.height(),
        loaded.hashes,
    );
    let manifest_path = config.manifest_path();
    if let Err(e) = write_manifest(&run_manifest, &manifest_path) {
        if let Err(remove) = fs::remove_file(&result.prediction_path) {
            warn!(
                path = %result.prediction_path.display(),
                error = %remove,
                "cannot remove prediction after manifest failure"
            );
        }
        return Err(TestError::Manifest(e));
    }

    info!(
        moons = result.steps.len(),
        trained = run_manifest.trained_moons.len(),
        manifest = %manifest_path.display(),
        "run recorded"
    );

    Ok(TestOutcome {
        result,
        manifest: run_manifest,
        manifest_path,
    })
}
