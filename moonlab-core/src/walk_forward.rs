//! Walk-forward driver: replays the test moons in order through the user hooks.
//!
//! For every moon, ascending:
//! 1. carve the embargoed training window and the single-moon test slice
//! 2. `data_process` the three slices
//! 3. `train` when the schedule says so
//! 4. `infer` against whatever the model directory holds
//!
//! Per-moon predictions are appended in moon order and persisted once, at
//! the end. Any failure aborts the run and nothing is persisted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ensure::{EnsureError, PREDICTION_COLUMNS};
use crate::frame::{FrameError, Moon, Tabular};
use crate::hooks::{Hooks, InvokeError};
use crate::reporter::{Phase, Reporter, StepEvent};
use crate::schedule::TrainSchedule;
use crate::window::{self, Datasets};

// ─── Configuration ───────────────────────────────────────────────────

/// Run-level settings for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Where `train` writes and `infer` reads the model. Created if absent.
    pub model_directory: PathBuf,
    /// Always train before the first moon.
    pub force_first_train: bool,
    /// Retrain on moons divisible by this value; 0 disables.
    pub train_frequency: u64,
}

impl WalkForwardConfig {
    pub fn schedule(&self) -> TrainSchedule {
        TrainSchedule::new(self.train_frequency, self.force_first_train)
    }
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            model_directory: PathBuf::from("resources"),
            force_first_train: true,
            train_frequency: 1,
        }
    }
}

// ─── Persistence ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot write prediction to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode prediction for {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Destination of the aggregated prediction.
pub trait PredictionSink<T> {
    /// Write the prediction, returning where it went.
    fn persist(&mut self, prediction: &T) -> Result<PathBuf, SinkError>;
}

// ─── Result types ────────────────────────────────────────────────────

/// What happened at a single moon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoonStep {
    pub moon: Moon,
    pub trained: bool,
    pub train_rows: usize,
    pub test_rows: usize,
    pub prediction_rows: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct WalkForwardResult<T> {
    /// All per-moon predictions, in moon order.
    pub prediction: T,
    pub steps: Vec<MoonStep>,
    pub prediction_path: PathBuf,
}

impl<T> WalkForwardResult<T> {
    pub fn moons(&self) -> Vec<Moon> {
        self.steps.iter().map(|s| s.moon).collect()
    }

    pub fn trained_moons(&self) -> Vec<Moon> {
        self.steps
            .iter()
            .filter(|s| s.trained)
            .map(|s| s.moon)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Invalid(#[from] EnsureError),

    #[error("moon {moon}: {source}")]
    Step {
        moon: Moon,
        #[source]
        source: InvokeError,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("cannot create model directory {path}: {source}")]
    ModelDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

// ─── Aggregation ─────────────────────────────────────────────────────

/// Append per-moon predictions in the order given.
///
/// No sorting happens here: the caller visits moons ascending, so the
/// input order already is moon order.
pub fn aggregate<T: Tabular>(predictions: Vec<T>) -> Result<T, FrameError> {
    if predictions.is_empty() {
        return T::empty_with_columns(&PREDICTION_COLUMNS);
    }
    T::concat(predictions)
}

/// Create the model directory if it does not exist yet.
pub fn ensure_model_directory(path: &Path) -> Result<(), RunError> {
    fs::create_dir_all(path).map_err(|source| RunError::ModelDirectory {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run the full walk-forward loop and persist the aggregated prediction.
pub fn run_walk_forward<T: Tabular>(
    hooks: &Hooks<'_, T>,
    data: &Datasets<T>,
    config: &WalkForwardConfig,
    reporter: &dyn Reporter,
    sink: &mut dyn PredictionSink<T>,
) -> Result<WalkForwardResult<T>, RunError> {
    let moons = window::moons(&data.x_test, &data.moon_column)?;
    ensure_model_directory(&config.model_directory)?;

    let schedule = config.schedule();
    let total = moons.len();
    reporter.on_start(&moons);

    let mut predictions = Vec::with_capacity(total);
    let mut steps = Vec::with_capacity(total);

    for (index, &moon) in moons.iter().enumerate() {
        let train = schedule.should_train(index, moon);
        let slices = window::slice(data, moon)?;
        let event = |phase: Phase, rows: usize| StepEvent {
            index,
            total,
            moon,
            train,
            phase,
            rows,
        };
        let step_err = |source: InvokeError| RunError::Step { moon, source };

        reporter.on_step(&event(Phase::DataProcess, slices.x_train.height()));
        let (x_train, y_train, x_test) = hooks
            .call_data_process(slices.x_train, slices.y_train, slices.x_test)
            .map_err(step_err)?;

        let train_rows = x_train.height();
        let test_rows = x_test.height();

        if train {
            reporter.on_step(&event(Phase::Train, train_rows));
            hooks
                .call_train(x_train, y_train, &config.model_directory)
                .map_err(step_err)?;
        }

        reporter.on_step(&event(Phase::Infer, test_rows));
        let prediction = hooks
            .call_infer(&config.model_directory, x_test)
            .map_err(step_err)?;

        steps.push(MoonStep {
            moon,
            trained: train,
            train_rows,
            test_rows,
            prediction_rows: prediction.height(),
        });
        predictions.push(prediction);
    }

    let prediction = aggregate(predictions)?;
    let prediction_path = sink.persist(&prediction)?;
    reporter.on_complete(&prediction_path, prediction.height());

    Ok(WalkForwardResult {
        prediction,
        steps,
        prediction_path,
    })
}
