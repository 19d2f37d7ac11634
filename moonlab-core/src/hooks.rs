//! User hooks: the three capabilities a pipeline module must expose.
//!
//! A module is anything implementing [`UserModule`]. Its capabilities are
//! looked up once with [`resolve`], before any data is read, so a module
//! missing `data_process`, `train` or `infer` fails before expensive work.
//! Every value a hook hands back goes through the validators in
//! [`crate::ensure`] before the engine uses it.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::ensure::{self, EnsureError};
use crate::frame::Tabular;

/// Error raised by a hook's own body.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// What a hook returns before validation.
pub type HookResult<T> = Result<Returned<T>, HookError>;

/// An unvalidated hook return value.
#[derive(Debug, Clone)]
pub enum Returned<T> {
    Table(T),
    Tuple(Vec<Returned<T>>),
    Nothing,
    /// Something that is not a table, described by its kind.
    Other(String),
}

impl<T> Returned<T> {
    /// Short description used in validation messages.
    pub fn kind(&self) -> String {
        match self {
            Returned::Table(_) => "dataframe".to_string(),
            Returned::Tuple(items) => format!("tuple of {}", items.len()),
            Returned::Nothing => "nothing".to_string(),
            Returned::Other(kind) => kind.clone(),
        }
    }
}

impl<T> From<(T, T, T)> for Returned<T> {
    fn from((a, b, c): (T, T, T)) -> Self {
        Returned::Tuple(vec![Returned::Table(a), Returned::Table(b), Returned::Table(c)])
    }
}

/// `data_process(x_train, y_train, x_test) -> (x_train', y_train', x_test')`
pub trait DataProcessHook<T> {
    fn data_process(&self, x_train: T, y_train: T, x_test: T) -> HookResult<T>;
}

/// `train(x_train', y_train', model_directory) -> artifact`
pub trait TrainHook<T> {
    fn train(&self, x_train: T, y_train: T, model_directory: &Path) -> HookResult<T>;
}

/// `infer(model_directory, x_test') -> prediction`
pub trait InferHook<T> {
    fn infer(&self, model_directory: &Path, x_test: T) -> HookResult<T>;
}

impl<T, F> DataProcessHook<T> for F
where
    F: Fn(T, T, T) -> HookResult<T>,
{
    fn data_process(&self, x_train: T, y_train: T, x_test: T) -> HookResult<T> {
        self(x_train, y_train, x_test)
    }
}

impl<T, F> TrainHook<T> for F
where
    F: Fn(T, T, &Path) -> HookResult<T>,
{
    fn train(&self, x_train: T, y_train: T, model_directory: &Path) -> HookResult<T> {
        self(x_train, y_train, model_directory)
    }
}

impl<T, F> InferHook<T> for F
where
    F: Fn(&Path, T) -> HookResult<T>,
{
    fn infer(&self, model_directory: &Path, x_test: T) -> HookResult<T> {
        self(model_directory, x_test)
    }
}

/// A user-supplied pipeline module. Any capability may be absent.
pub trait UserModule<T> {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    fn data_process(&self) -> Option<&dyn DataProcessHook<T>>;

    fn train(&self) -> Option<&dyn TrainHook<T>>;

    fn infer(&self) -> Option<&dyn InferHook<T>>;
}

/// The three capabilities of a module, all known to be present.
pub struct Hooks<'m, T> {
    module: &'m str,
    data_process: &'m dyn DataProcessHook<T>,
    train: &'m dyn TrainHook<T>,
    infer: &'m dyn InferHook<T>,
}

impl<T> fmt::Debug for Hooks<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("module", &self.module).finish()
    }
}

/// Look up every capability of `module`, failing on the first one missing.
pub fn resolve<T>(module: &dyn UserModule<T>) -> Result<Hooks<'_, T>, EnsureError> {
    Ok(Hooks {
        module: module.name(),
        data_process: ensure::capability(module.data_process(), "data_process")?,
        train: ensure::capability(module.train(), "train")?,
        infer: ensure::capability(module.infer(), "infer")?,
    })
}

/// Failure of a single hook invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("`{hook}` failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Invalid(#[from] EnsureError),
}

impl<T: Tabular> Hooks<'_, T> {
    pub fn module_name(&self) -> &str {
        self.module
    }

    /// Run `data_process` and check it returned three tables.
    pub fn call_data_process(
        &self,
        x_train: T,
        y_train: T,
        x_test: T,
    ) -> Result<(T, T, T), InvokeError> {
        let returned = self
            .data_process
            .data_process(x_train, y_train, x_test)
            .map_err(|source| InvokeError::Hook {
                hook: "data_process",
                source,
            })?;
        Ok(ensure::data_process_output(returned)?)
    }

    /// Run `train`. The model directory stays the source of truth; a
    /// returned table is handed back but the engine does not use it.
    pub fn call_train(
        &self,
        x_train: T,
        y_train: T,
        model_directory: &Path,
    ) -> Result<Option<T>, InvokeError> {
        let returned = self
            .train
            .train(x_train, y_train, model_directory)
            .map_err(|source| InvokeError::Hook {
                hook: "train",
                source,
            })?;
        Ok(ensure::train_output(returned)?)
    }

    /// Run `infer` and check the prediction columns.
    pub fn call_infer(&self, model_directory: &Path, x_test: T) -> Result<T, InvokeError> {
        let returned = self
            .infer
            .infer(model_directory, x_test)
            .map_err(|source| InvokeError::Hook {
                hook: "infer",
                source,
            })?;
        Ok(ensure::prediction(returned)?)
    }
}

type BoxedDataProcess<T> = Box<dyn DataProcessHook<T>>;
type BoxedTrain<T> = Box<dyn TrainHook<T>>;
type BoxedInfer<T> = Box<dyn InferHook<T>>;

/// A module assembled from closures.
pub struct FnModule<T> {
    name: String,
    data_process: Option<BoxedDataProcess<T>>,
    train: Option<BoxedTrain<T>>,
    infer: Option<BoxedInfer<T>>,
}

impl<T: 'static> FnModule<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_process: None,
            train: None,
            infer: None,
        }
    }

    pub fn with_data_process<F>(mut self, hook: F) -> Self
    where
        F: Fn(T, T, T) -> HookResult<T> + 'static,
    {
        self.data_process = Some(Box::new(hook));
        self
    }

    /// `data_process` that hands its inputs back unchanged.
    pub fn with_identity_data_process(self) -> Self {
        self.with_data_process(|x_train, y_train, x_test| Ok((x_train, y_train, x_test).into()))
    }

    pub fn with_train<F>(mut self, hook: F) -> Self
    where
        F: Fn(T, T, &Path) -> HookResult<T> + 'static,
    {
        self.train = Some(Box::new(hook));
        self
    }

    pub fn with_infer<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Path, T) -> HookResult<T> + 'static,
    {
        self.infer = Some(Box::new(hook));
        self
    }
}

impl<T> UserModule<T> for FnModule<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_process(&self) -> Option<&dyn DataProcessHook<T>> {
        self.data_process.as_deref()
    }

    fn train(&self) -> Option<&dyn TrainHook<T>> {
        self.train.as_deref()
    }

    fn infer(&self) -> Option<&dyn InferHook<T>> {
        self.infer.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn prediction() -> DataFrame {
        df!("id" => &["a"], "date" => &[1i64], "value" => &[0.5]).unwrap()
    }

    fn complete_module() -> FnModule<DataFrame> {
        FnModule::new("complete")
            .with_identity_data_process()
            .with_train(|_, _, _| Ok(Returned::Nothing))
            .with_infer(|_, _| Ok(Returned::Table(prediction())))
    }

    #[test]
    fn resolve_complete_module() {
        let module = complete_module();
        let hooks = resolve(&module).unwrap();
        assert_eq!(hooks.module_name(), "complete");
    }

    #[test]
    fn resolve_reports_first_missing_capability() {
        let module: FnModule<DataFrame> =
            FnModule::new("partial").with_infer(|_, _| Ok(Returned::Nothing));
        let err = resolve(&module).unwrap_err();
        assert_eq!(err, EnsureError::MissingCapability("data_process"));

        let module: FnModule<DataFrame> = FnModule::new("no-infer")
            .with_identity_data_process()
            .with_train(|_, _, _| Ok(Returned::Nothing));
        let err = resolve(&module).unwrap_err();
        assert_eq!(err, EnsureError::MissingCapability("infer"));
    }

    #[test]
    fn hook_failure_names_the_hook() {
        let module: FnModule<DataFrame> = FnModule::new("failing")
            .with_identity_data_process()
            .with_train(|_, _, _| Err("out of memory".into()))
            .with_infer(|_, _| Ok(Returned::Table(prediction())));
        let hooks = resolve(&module).unwrap();

        let x = prediction();
        let err = hooks
            .call_train(x.clone(), x, Path::new("unused"))
            .unwrap_err();
        assert!(matches!(err, InvokeError::Hook { hook: "train", .. }));
        assert_eq!(err.to_string(), "`train` failed: out of memory");
    }

    #[test]
    fn data_process_must_return_three_tables() {
        let module: FnModule<DataFrame> = FnModule::new("short")
            .with_data_process(|x, y, _| {
                Ok(Returned::Tuple(vec![Returned::Table(x), Returned::Table(y)]))
            })
            .with_train(|_, _, _| Ok(Returned::Nothing))
            .with_infer(|_, _| Ok(Returned::Table(prediction())));
        let hooks = resolve(&module).unwrap();

        let x = prediction();
        let err = hooks
            .call_data_process(x.clone(), x.clone(), x)
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Invalid(EnsureError::WrongArity { got: 2, .. })
        ));
    }

    #[test]
    fn returned_kind_descriptions() {
        assert_eq!(Returned::<DataFrame>::Nothing.kind(), "nothing");
        assert_eq!(Returned::<DataFrame>::Other("str".into()).kind(), "str");
        assert_eq!(Returned::Table(prediction()).kind(), "dataframe");
        assert_eq!(
            Returned::from((prediction(), prediction(), prediction())).kind(),
            "tuple of 3"
        );
    }
}
