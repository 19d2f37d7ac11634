//! Step events emitted by the walk-forward driver.
//!
//! The driver never writes logs itself; it reports each step to a
//! [`Reporter`] so callers decide how progress is shown.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::frame::Moon;

/// Which hook a step is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DataProcess,
    Train,
    Infer,
}

impl Phase {
    pub fn hook_name(self) -> &'static str {
        match self {
            Phase::DataProcess => "data_process",
            Phase::Train => "train",
            Phase::Infer => "infer",
        }
    }
}

/// A single step of the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    /// Zero-based position of the moon in the sequence.
    pub index: usize,
    pub total: usize,
    pub moon: Moon,
    pub train: bool,
    pub phase: Phase,
    /// Rows handed to the hook (training rows for data_process/train, test rows for infer).
    pub rows: usize,
}

/// Progress callbacks for a walk-forward run.
pub trait Reporter {
    /// Called once the moon sequence is known, before the first step.
    fn on_start(&self, _moons: &[Moon]) {}

    /// Called before each hook invocation.
    fn on_step(&self, event: &StepEvent);

    /// Called after the aggregated prediction has been persisted.
    fn on_complete(&self, _path: &Path, _rows: usize) {}
}

/// Discards every event.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_step(&self, _event: &StepEvent) {}
}

/// Renders events through `tracing`.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_start(&self, moons: &[Moon]) {
        info!(
            count = moons.len(),
            first = moons.first().copied(),
            last = moons.last().copied(),
            "walk-forward over test moons"
        );
    }

    fn on_step(&self, event: &StepEvent) {
        if event.phase == Phase::DataProcess {
            info!("---");
            info!(
                "loop: moon={} train={} ({}/{})",
                event.moon,
                event.train,
                event.index + 1,
                event.total
            );
        }
        info!(
            moon = event.moon,
            rows = event.rows,
            "handler: {}",
            event.phase.hook_name()
        );
    }

    fn on_complete(&self, path: &Path, rows: usize) {
        info!(rows, "prediction_path={}", path.display());
        info!("local test successfully run!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_match_hooks() {
        assert_eq!(Phase::DataProcess.hook_name(), "data_process");
        assert_eq!(Phase::Train.hook_name(), "train");
        assert_eq!(Phase::Infer.hook_name(), "infer");
    }

    #[test]
    fn null_reporter_accepts_everything() {
        let reporter = NullReporter;
        reporter.on_start(&[1, 2]);
        reporter.on_step(&StepEvent {
            index: 0,
            total: 2,
            moon: 1,
            train: true,
            phase: Phase::Train,
            rows: 0,
        });
        reporter.on_complete(Path::new("data/prediction.csv"), 0);
    }
}
