//! Schema validation of module capabilities and hook return values.

use thiserror::Error;

use crate::frame::Tabular;
use crate::hooks::Returned;

/// Exact column layout every prediction must have.
pub const PREDICTION_COLUMNS: [&str; 3] = ["id", "date", "value"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnsureError {
    #[error("no `{0}` function found")]
    MissingCapability(&'static str),

    #[error("`{name}` must be a dataframe, got {got}")]
    NotATable { name: String, got: String },

    #[error("`{name}` must return {expected} values, got {got}")]
    WrongArity {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("prediction expected columns: `{expected:?}` but got `{got:?}`")]
    PredictionColumns {
        expected: Vec<String>,
        got: Vec<String>,
    },
}

/// A capability that must be present.
pub fn capability<'a, H: ?Sized>(
    hook: Option<&'a H>,
    name: &'static str,
) -> Result<&'a H, EnsureError> {
    hook.ok_or(EnsureError::MissingCapability(name))
}

/// A value that must be a table.
pub fn table<T>(value: Returned<T>, name: &str) -> Result<T, EnsureError> {
    match value {
        Returned::Table(table) => Ok(table),
        other => Err(EnsureError::NotATable {
            name: name.to_string(),
            got: other.kind(),
        }),
    }
}

/// `data_process` output: exactly three tables.
pub fn data_process_output<T>(value: Returned<T>) -> Result<(T, T, T), EnsureError> {
    let items = match value {
        Returned::Tuple(items) => items,
        other => {
            return Err(EnsureError::WrongArity {
                name: "data_process",
                expected: 3,
                got: usize::from(!matches!(other, Returned::Nothing)),
            })
        }
    };

    let [x_train, y_train, x_test] =
        <[Returned<T>; 3]>::try_from(items).map_err(|items| EnsureError::WrongArity {
            name: "data_process",
            expected: 3,
            got: items.len(),
        })?;

    Ok((
        table(x_train, "x_train")?,
        table(y_train, "y_train")?,
        table(x_test, "x_test")?,
    ))
}

/// `train` output: nothing, or a table.
pub fn train_output<T>(value: Returned<T>) -> Result<Option<T>, EnsureError> {
    match value {
        Returned::Nothing => Ok(None),
        other => table(other, "model").map(Some),
    }
}

/// `infer` output: a table laid out exactly as [`PREDICTION_COLUMNS`].
pub fn prediction<T: Tabular>(value: Returned<T>) -> Result<T, EnsureError> {
    let prediction = table(value, "prediction")?;
    prediction_columns(&prediction.column_names())?;
    Ok(prediction)
}

/// Column names must equal `[id, date, value]`, same order, nothing extra.
pub fn prediction_columns(got: &[String]) -> Result<(), EnsureError> {
    if got.iter().map(String::as_str).eq(PREDICTION_COLUMNS) {
        return Ok(());
    }

    Err(EnsureError::PredictionColumns {
        expected: PREDICTION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        got: got.to_vec(),
    })
}
