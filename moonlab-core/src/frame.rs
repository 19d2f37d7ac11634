//! Tabular contract consumed by the walk-forward engine.
//!
//! The engine only needs named, ordered columns, a moon column readable as
//! integers, filtering rows by moon, and ordered vertical concatenation.
//! `polars::prelude::DataFrame` is the implementation used throughout the
//! workspace.

use polars::prelude::*;
use thiserror::Error;

/// One evaluation instant, read from the moon column.
pub type Moon = i64;

/// Errors from table operations.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing moon column '{0}'")]
    MissingColumn(String),

    #[error("moon column '{column}' is not integer-valued: {reason}")]
    MoonType { column: String, reason: String },

    #[error("null moon in column '{column}' at row {row}")]
    NullMoon { column: String, row: usize },

    #[error("cannot concatenate tables: {0}")]
    Concat(String),

    #[error("table operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// A table with named, ordered columns.
pub trait Tabular: Clone + Sized {
    /// Column names in table order.
    fn column_names(&self) -> Vec<String>;

    /// Number of rows.
    fn height(&self) -> usize;

    /// Every value of the moon column, in row order.
    fn moon_values(&self, moon_column: &str) -> Result<Vec<Moon>, FrameError>;

    /// Rows whose moon satisfies `keep`, with the moon column placed first
    /// and row positions starting again from zero.
    fn filter_moons(
        &self,
        moon_column: &str,
        keep: &dyn Fn(Moon) -> bool,
    ) -> Result<Self, FrameError>;

    /// Stack `parts` vertically, in order. Columns whose types differ
    /// between parts are widened to a common type.
    fn concat(parts: Vec<Self>) -> Result<Self, FrameError>;

    /// A zero-row table with the given columns.
    fn empty_with_columns(names: &[&str]) -> Result<Self, FrameError>;
}

/// Casting a float to an integer truncates, so whole values are checked first.
fn reject_fractional(series: &Series, moon_column: &str) -> Result<(), FrameError> {
    let floats = series.cast(&DataType::Float64)?;
    let fractional = floats
        .f64()?
        .into_iter()
        .enumerate()
        .find_map(|(row, moon)| moon.filter(|m| m.fract() != 0.0).map(|m| (row, m)));

    match fractional {
        Some((row, moon)) => Err(FrameError::MoonType {
            column: moon_column.to_string(),
            reason: format!("row {row} holds {moon}"),
        }),
        None => Ok(()),
    }
}

impl Tabular for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn height(&self) -> usize {
        DataFrame::height(self)
    }

    fn moon_values(&self, moon_column: &str) -> Result<Vec<Moon>, FrameError> {
        let column = self
            .column(moon_column)
            .map_err(|_| FrameError::MissingColumn(moon_column.to_string()))?;

        let series = column.as_materialized_series();
        if series.dtype().is_float() {
            reject_fractional(series, moon_column)?;
        }

        let series = series
            .strict_cast(&DataType::Int64)
            .map_err(|e| FrameError::MoonType {
                column: moon_column.to_string(),
                reason: e.to_string(),
            })?;
        let values = series.i64().map_err(|e| FrameError::MoonType {
            column: moon_column.to_string(),
            reason: e.to_string(),
        })?;

        values
            .into_iter()
            .enumerate()
            .map(|(row, moon)| {
                moon.ok_or_else(|| FrameError::NullMoon {
                    column: moon_column.to_string(),
                    row,
                })
            })
            .collect()
    }

    fn filter_moons(
        &self,
        moon_column: &str,
        keep: &dyn Fn(Moon) -> bool,
    ) -> Result<Self, FrameError> {
        let moons = self.moon_values(moon_column)?;
        let mask: BooleanChunked = moons.iter().map(|&moon| Some(keep(moon))).collect();
        let filtered = self.filter(&mask)?;

        let mut order = vec![moon_column.to_string()];
        order.extend(
            filtered
                .get_column_names()
                .into_iter()
                .filter(|name| name.as_str() != moon_column)
                .map(|name| name.to_string()),
        );

        Ok(filtered.select(order)?)
    }

    fn concat(parts: Vec<Self>) -> Result<Self, FrameError> {
        let frames: Vec<LazyFrame> = parts.into_iter().map(IntoLazy::lazy).collect();
        let args = UnionArgs {
            to_supertypes: true,
            ..Default::default()
        };
        polars::prelude::concat(frames, args)
            .and_then(LazyFrame::collect)
            .map_err(|e| FrameError::Concat(e.to_string()))
    }

    fn empty_with_columns(names: &[&str]) -> Result<Self, FrameError> {
        let columns = names
            .iter()
            .map(|name| Column::from(Series::new_empty((*name).into(), &DataType::String)))
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}
