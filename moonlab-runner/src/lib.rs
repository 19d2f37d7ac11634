//! Moonlab Runner — everything around the walk-forward engine.
//!
//! - Run configuration (TOML)
//! - Dataset sources and polars-backed loading
//! - External-program user modules
//! - Prediction CSV and run manifest persistence
//! - Project bootstrap
//! - The local tester entry point

pub mod config;
pub mod data_loader;
pub mod export;
pub mod project;
pub mod script_module;
pub mod tester;

pub use config::{ConfigError, TestConfig};
pub use data_loader::{
    load_datasets, read_frame, DataSource, DatasetManifest, InputHashes, LoadError, LoadedData,
    LocalDataSource,
};
pub use export::{write_frame_csv, write_manifest, CsvPredictionSink, RunManifest};
pub use project::{init_project, ProjectError};
pub use script_module::{ScriptError, ScriptModule};
pub use tester::{run_local_test, TestError, TestOutcome};
