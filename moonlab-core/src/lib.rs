//! Moonlab Core — walk-forward evaluation of a user-supplied model pipeline.
//!
//! This crate contains the engine of the local tester:
//! - Tabular contract over `polars` data frames
//! - Schema validation of hook capabilities and return values
//! - Moon enumeration and embargoed train/test windows
//! - Value-based retrain scheduling
//! - Hook resolution and invocation
//! - The walk-forward driver, aggregation, and the step reporter
//! - A step-by-step inline session

pub mod ensure;
pub mod frame;
pub mod hooks;
pub mod inline;
pub mod reporter;
pub mod schedule;
pub mod walk_forward;
pub mod window;

pub use ensure::{EnsureError, PREDICTION_COLUMNS};
pub use frame::{FrameError, Moon, Tabular};
pub use hooks::{
    resolve, DataProcessHook, FnModule, HookError, HookResult, Hooks, InferHook, InvokeError,
    Returned, TrainHook, UserModule,
};
pub use inline::{InlineError, InlineSession};
pub use reporter::{NullReporter, Phase, Reporter, StepEvent, TracingReporter};
pub use schedule::{should_train, TrainSchedule};
pub use walk_forward::{
    aggregate, run_walk_forward, MoonStep, PredictionSink, RunError, SinkError,
    WalkForwardConfig, WalkForwardResult,
};
pub use window::{Datasets, MoonSlices};
