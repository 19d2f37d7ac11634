//! Retrain scheduling.
//!
//! The periodic branch tests the moon's *value*, not its position: with
//! `frequency = 10`, moons 10, 20, 30 retrain whatever their index. On
//! sparse or offset moon numbering this can skip or bunch retrains.

use serde::{Deserialize, Serialize};

use crate::frame::Moon;

/// Whether the model must be retrained before predicting `moon`.
///
/// True for the first moon when `force_first` is set, or whenever
/// `frequency` is non-zero and divides `moon`. A frequency of 0 disables
/// periodic retraining.
pub fn should_train(index: usize, moon: Moon, frequency: u64, force_first: bool) -> bool {
    (force_first && index == 0)
        || (frequency != 0 && i128::from(moon).rem_euclid(i128::from(frequency)) == 0)
}

/// Retrain policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainSchedule {
    pub frequency: u64,
    pub force_first: bool,
}

impl TrainSchedule {
    pub fn new(frequency: u64, force_first: bool) -> Self {
        Self {
            frequency,
            force_first,
        }
    }

    pub fn should_train(&self, index: usize, moon: Moon) -> bool {
        should_train(index, moon, self.frequency, self.force_first)
    }

    /// One flag per moon of an ordered sequence.
    pub fn plan(&self, moons: &[Moon]) -> Vec<bool> {
        moons
            .iter()
            .enumerate()
            .map(|(index, &moon)| self.should_train(index, moon))
            .collect()
    }
}

impl Default for TrainSchedule {
    fn default() -> Self {
        Self::new(1, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_first_overrides_frequency() {
        assert!(should_train(0, 7, 0, true));
        assert!(should_train(0, 7, 5, true));
        assert!(!should_train(1, 7, 0, true));
    }

    #[test]
    fn zero_frequency_never_retrains() {
        for moon in [0, 1, 10, 100] {
            assert!(!should_train(3, moon, 0, false));
        }
    }

    #[test]
    fn uses_moon_value_not_index() {
        assert!(should_train(5, 20, 10, false));
        assert!(!should_train(10, 21, 10, false));
    }

    #[test]
    fn negative_moons_follow_floor_modulo() {
        assert!(should_train(1, -10, 5, false));
        assert!(!should_train(1, -3, 5, false));
    }

    #[test]
    fn plan_matches_documented_scenario() {
        let schedule = TrainSchedule::new(10, true);
        assert_eq!(schedule.plan(&[10, 20, 30]), vec![true, true, true]);

        let schedule = TrainSchedule::new(10, false);
        assert_eq!(schedule.plan(&[5, 10, 15]), vec![false, true, false]);

        let schedule = TrainSchedule::new(0, false);
        assert_eq!(schedule.plan(&[10, 20, 30]), vec![false, false, false]);
    }
}
