//! Step-by-step session for interactive use.
//!
//! Runs the hooks once each over the full datasets, in the order a notebook
//! user would: `data_process`, then `train`, then `infer`. Out-of-order
//! calls are rejected with the step that has to come first.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::frame::Tabular;
use crate::hooks::{resolve, Hooks, InvokeError, UserModule};
use crate::walk_forward::{ensure_model_directory, RunError};

#[derive(Debug, Error)]
pub enum InlineError {
    #[error("call data_process() first")]
    DataProcessFirst,

    #[error("call train() first")]
    TrainFirst,

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Processed tables kept between calls.
struct Processed<T> {
    x_train: T,
    y_train: T,
    x_test: T,
}

pub struct InlineSession<'m, T> {
    hooks: Hooks<'m, T>,
    model_directory: PathBuf,
    processed: Option<Processed<T>>,
    trained: bool,
    prediction: Option<T>,
}

impl<'m, T: Tabular> InlineSession<'m, T> {
    /// Resolve the module's hooks and bind the model directory.
    pub fn new(
        module: &'m dyn UserModule<T>,
        model_directory: impl Into<PathBuf>,
    ) -> Result<Self, InlineError> {
        let hooks = resolve(module).map_err(RunError::from)?;
        Ok(Self {
            hooks,
            model_directory: model_directory.into(),
            processed: None,
            trained: false,
            prediction: None,
        })
    }

    pub fn model_directory(&self) -> &Path {
        &self.model_directory
    }

    /// Run `data_process` on the full datasets and keep its output.
    ///
    /// Re-processing invalidates any earlier training.
    pub fn call_data_process(
        &mut self,
        x_train: T,
        y_train: T,
        x_test: T,
    ) -> Result<(&T, &T, &T), InlineError> {
        let (x_train, y_train, x_test) = self.hooks.call_data_process(x_train, y_train, x_test)?;
        self.trained = false;
        self.prediction = None;

        let processed = self.processed.insert(Processed {
            x_train,
            y_train,
            x_test,
        });
        Ok((&processed.x_train, &processed.y_train, &processed.x_test))
    }

    /// Train on the processed training tables.
    pub fn call_train(&mut self) -> Result<Option<T>, InlineError> {
        let processed = self.processed.as_ref().ok_or(InlineError::DataProcessFirst)?;
        ensure_model_directory(&self.model_directory)?;

        let artifact = self.hooks.call_train(
            processed.x_train.clone(),
            processed.y_train.clone(),
            &self.model_directory,
        )?;
        self.trained = true;
        Ok(artifact)
    }

    /// Predict the processed test table with the trained model.
    pub fn call_infer(&mut self) -> Result<&T, InlineError> {
        let processed = self.processed.as_ref().ok_or(InlineError::DataProcessFirst)?;
        if !self.trained {
            return Err(InlineError::TrainFirst);
        }

        let prediction = self
            .hooks
            .call_infer(&self.model_directory, processed.x_test.clone())?;
        Ok(self.prediction.insert(prediction))
    }

    /// The last validated prediction, if any.
    pub fn prediction(&self) -> Option<&T> {
        self.prediction.as_ref()
    }
}
