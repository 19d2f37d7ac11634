//! Moon enumeration and embargo-respecting train/test slices.
//!
//! For a moon `m` and an embargo `e`:
//! - training rows are those with moon strictly below `m - e`
//! - test rows are those with moon exactly `m`
//!
//! Every slice comes back with the moon column first and fresh row
//! positions. An empty training slice is legitimate and left to the hooks.

use crate::frame::{FrameError, Moon, Tabular};

/// The three input tables of a run plus their shared time key.
#[derive(Debug, Clone)]
pub struct Datasets<T> {
    pub x_train: T,
    pub y_train: T,
    pub x_test: T,
    /// Name of the moon column, present in all three tables.
    pub moon_column: String,
    /// Minimum gap between a predicted moon and its latest training moon.
    pub embargo: Moon,
}

/// Slices for a single moon.
#[derive(Debug, Clone)]
pub struct MoonSlices<T> {
    pub x_train: T,
    pub y_train: T,
    pub x_test: T,
}

/// Distinct moons of the test set, ascending.
pub fn moons<T: Tabular>(x_test: &T, moon_column: &str) -> Result<Vec<Moon>, FrameError> {
    let mut moons = x_test.moon_values(moon_column)?;
    moons.sort_unstable();
    moons.dedup();
    Ok(moons)
}

/// Training rows must have a moon strictly below this value.
pub fn training_cutoff(moon: Moon, embargo: Moon) -> Moon {
    moon.saturating_sub(embargo)
}

/// Carve the training window and the test rows for `moon`.
///
/// The two training tables are filtered independently; keeping them row
/// aligned is up to whoever built them.
pub fn slice<T: Tabular>(data: &Datasets<T>, moon: Moon) -> Result<MoonSlices<T>, FrameError> {
    let cutoff = training_cutoff(moon, data.embargo);
    let before_cutoff = move |m: Moon| m < cutoff;
    let at_moon = move |m: Moon| m == moon;

    Ok(MoonSlices {
        x_train: data.x_train.filter_moons(&data.moon_column, &before_cutoff)?,
        y_train: data.y_train.filter_moons(&data.moon_column, &before_cutoff)?,
        x_test: data.x_test.filter_moons(&data.moon_column, &at_moon)?,
    })
}
