//! User modules backed by external programs.
//!
//! A module directory holds up to three executables whose file stems are
//! `data_process`, `train` and `infer`. Each call writes its input tables
//! as CSV into a scratch directory, runs the program with the file paths
//! as arguments, and reads the output CSVs back:
//!
//! | hook           | arguments                                   | outputs (in `OUT`)                         |
//! |----------------|---------------------------------------------|--------------------------------------------|
//! | `data_process` | `X_TRAIN Y_TRAIN X_TEST OUT`                | `x_train.csv`, `y_train.csv`, `x_test.csv` |
//! | `train`        | `X_TRAIN Y_TRAIN MODEL_DIRECTORY OUT`       | optional `model.csv`                       |
//! | `infer`        | `MODEL_DIRECTORY X_TEST OUT`                | `prediction.csv`                           |
//!
//! A missing output file reads as [`Returned::Nothing`], an unparseable
//! one as [`Returned::Other`]; the validators decide whether that is
//! acceptable. A non-zero exit status fails the hook.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use polars::prelude::DataFrame;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use moonlab_core::{DataProcessHook, HookResult, InferHook, Returned, TrainHook, UserModule};

use crate::data_loader::read_frame;
use crate::export::write_frame_csv;

const HOOK_NAMES: [&str; 3] = ["data_process", "train", "infer"];

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("module directory {0} does not exist")]
    NotADirectory(PathBuf),

    #[error("both {first} and {second} provide `{hook}`")]
    Ambiguous {
        hook: &'static str,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("cannot start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}{stderr}")]
    Failed {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("cannot prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] moonlab_core::SinkError),
}

/// Interpreter for scripts that are not directly executable.
fn interpreter_for(program: &Path) -> Option<&'static str> {
    match program.extension().and_then(|e| e.to_str()) {
        Some("py") => Some("python3"),
        Some("sh") => Some("sh"),
        _ => None,
    }
}

/// One external program standing in for a hook.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    hook: &'static str,
    program: PathBuf,
    scratch: PathBuf,
}

impl ScriptHook {
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Fresh `in/` and `out/` directories for one call.
    fn prepare(&self) -> Result<(PathBuf, PathBuf), ScriptError> {
        let work = self.scratch.join(self.hook);
        if work.exists() {
            fs::remove_dir_all(&work).map_err(|source| ScriptError::Io {
                path: work.clone(),
                source,
            })?;
        }
        let input = work.join("in");
        let output = work.join("out");
        for dir in [&input, &output] {
            fs::create_dir_all(dir).map_err(|source| ScriptError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok((input, output))
    }

    fn write_input(dir: &Path, name: &str, frame: &DataFrame) -> Result<PathBuf, ScriptError> {
        let path = dir.join(name);
        write_frame_csv(frame, &path)?;
        Ok(path)
    }

    fn run(&self, args: &[&Path]) -> Result<(), ScriptError> {
        let mut command = match interpreter_for(&self.program) {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };
        command.args(args);

        debug!(hook = self.hook, program = %self.program.display(), "running script");
        let output = command.output().map_err(|source| ScriptError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(hook = self.hook, "{line}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ScriptError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {stderr}")
                },
            });
        }
        Ok(())
    }

    fn read_output(path: &Path) -> Returned<DataFrame> {
        if !path.exists() {
            return Returned::Nothing;
        }
        match read_frame(path) {
            Ok(frame) => Returned::Table(frame),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable script output");
                Returned::Other(format!("unreadable file {}", path.display()))
            }
        }
    }
}

impl DataProcessHook<DataFrame> for ScriptHook {
    fn data_process(
        &self,
        x_train: DataFrame,
        y_train: DataFrame,
        x_test: DataFrame,
    ) -> HookResult<DataFrame> {
        let (input, output) = self.prepare()?;
        let x_train = Self::write_input(&input, "x_train.csv", &x_train)?;
        let y_train = Self::write_input(&input, "y_train.csv", &y_train)?;
        let x_test = Self::write_input(&input, "x_test.csv", &x_test)?;
        self.run(&[
            x_train.as_path(),
            y_train.as_path(),
            x_test.as_path(),
            output.as_path(),
        ])?;

        let outputs = ["x_train.csv", "y_train.csv", "x_test.csv"].map(|name| output.join(name));
        if outputs.iter().all(|p| !p.exists()) {
            return Ok(Returned::Nothing);
        }
        Ok(Returned::Tuple(
            outputs.iter().map(|p| Self::read_output(p)).collect::<Vec<_>>(),
        ))
    }
}

impl TrainHook<DataFrame> for ScriptHook {
    fn train(
        &self,
        x_train: DataFrame,
        y_train: DataFrame,
        model_directory: &Path,
    ) -> HookResult<DataFrame> {
        let (input, output) = self.prepare()?;
        let x_train = Self::write_input(&input, "x_train.csv", &x_train)?;
        let y_train = Self::write_input(&input, "y_train.csv", &y_train)?;
        self.run(&[
            x_train.as_path(),
            y_train.as_path(),
            model_directory,
            output.as_path(),
        ])?;
        Ok(Self::read_output(&output.join("model.csv")))
    }
}

impl InferHook<DataFrame> for ScriptHook {
    fn infer(&self, model_directory: &Path, x_test: DataFrame) -> HookResult<DataFrame> {
        let (input, output) = self.prepare()?;
        let x_test = Self::write_input(&input, "x_test.csv", &x_test)?;
        self.run(&[model_directory, x_test.as_path(), output.as_path()])?;
        Ok(Self::read_output(&output.join("prediction.csv")))
    }
}

/// A module whose hooks are programs in a directory.
#[derive(Debug)]
pub struct ScriptModule {
    name: String,
    directory: PathBuf,
    scratch: PathBuf,
    /// Owned scratch space, removed on drop. `None` once the caller
    /// supplies its own directory.
    owned_scratch: Option<TempDir>,
    data_process: Option<ScriptHook>,
    train: Option<ScriptHook>,
    infer: Option<ScriptHook>,
}

impl ScriptModule {
    /// Scan `directory` for hook programs. Missing hooks are not an error
    /// here; they are reported when the module is resolved.
    pub fn discover(directory: &Path) -> Result<Self, ScriptError> {
        if !directory.is_dir() {
            return Err(ScriptError::NotADirectory(directory.to_path_buf()));
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(directory)
            .map_err(|source| ScriptError::Io {
                path: directory.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        let owned_scratch = tempfile::Builder::new()
            .prefix("moonlab-")
            .tempdir()
            .map_err(|source| ScriptError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let scratch = owned_scratch.path().to_path_buf();
        let mut found: [Option<ScriptHook>; 3] = [None, None, None];

        for path in entries {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(slot) = HOOK_NAMES.iter().position(|name| *name == stem) else {
                continue;
            };
            if let Some(existing) = &found[slot] {
                return Err(ScriptError::Ambiguous {
                    hook: HOOK_NAMES[slot],
                    first: existing.program.clone(),
                    second: path,
                });
            }
            found[slot] = Some(ScriptHook {
                hook: HOOK_NAMES[slot],
                program: path,
                scratch: scratch.clone(),
            });
        }

        let name = directory
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("script")
            .to_string();
        let [data_process, train, infer] = found;

        debug!(
            module = %name,
            data_process = data_process.is_some(),
            train = train.is_some(),
            infer = infer.is_some(),
            "discovered script module"
        );

        Ok(Self {
            name,
            directory: directory.to_path_buf(),
            scratch,
            owned_scratch: Some(owned_scratch),
            data_process,
            train,
            infer,
        })
    }

    /// Put per-call input and output files under `scratch` instead of the
    /// system temp directory. The caller keeps ownership of `scratch`.
    pub fn with_scratch_directory(mut self, scratch: impl Into<PathBuf>) -> Self {
        let scratch = scratch.into();
        self.owned_scratch = None;
        self.scratch = scratch.clone();
        for hook in [&mut self.data_process, &mut self.train, &mut self.infer]
            .into_iter()
            .flatten()
        {
            hook.scratch = scratch.clone();
        }
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where per-call input and output files go.
    pub fn scratch_directory(&self) -> &Path {
        &self.scratch
    }
}

impl UserModule<DataFrame> for ScriptModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_process(&self) -> Option<&dyn DataProcessHook<DataFrame>> {
        self.data_process
            .as_ref()
            .map(|h| h as &dyn DataProcessHook<DataFrame>)
    }

    fn train(&self) -> Option<&dyn TrainHook<DataFrame>> {
        self.train.as_ref().map(|h| h as &dyn TrainHook<DataFrame>)
    }

    fn infer(&self) -> Option<&dyn InferHook<DataFrame>> {
        self.infer.as_ref().map(|h| h as &dyn InferHook<DataFrame>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moonlab_core::{resolve, EnsureError};

    #[test]
    fn interpreter_by_extension() {
        assert_eq!(interpreter_for(Path::new("infer.py")), Some("python3"));
        assert_eq!(interpreter_for(Path::new("infer.sh")), Some("sh"));
        assert_eq!(interpreter_for(Path::new("infer")), None);
    }

    #[test]
    fn discover_finds_hooks_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data_process.sh"), "").unwrap();
        fs::write(dir.path().join("train.py"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let module = ScriptModule::discover(dir.path()).unwrap();
        assert!(module.data_process.is_some());
        assert!(module.train.is_some());
        assert!(module.infer.is_none());

        let err = resolve(&module).unwrap_err();
        assert_eq!(err, EnsureError::MissingCapability("infer"));
    }

    #[test]
    fn scratch_directory_is_removed_with_the_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("infer.sh"), "").unwrap();

        let module = ScriptModule::discover(dir.path()).unwrap();
        let scratch = module.scratch_directory().to_path_buf();
        assert!(scratch.is_dir());
        fs::write(scratch.join("x_test.csv"), "moon\n1\n").unwrap();

        drop(module);
        assert!(!scratch.exists());
    }

    #[test]
    fn caller_scratch_directory_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("infer.sh"), "").unwrap();

        let module = ScriptModule::discover(dir.path())
            .unwrap()
            .with_scratch_directory(scratch.path());
        assert_eq!(module.scratch_directory(), scratch.path());

        drop(module);
        assert!(scratch.path().is_dir());
    }

    #[test]
    fn discover_rejects_duplicate_hooks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("infer.py"), "").unwrap();
        fs::write(dir.path().join("infer.sh"), "").unwrap();

        let err = ScriptModule::discover(dir.path()).unwrap_err();
        assert!(matches!(err, ScriptError::Ambiguous { hook: "infer", .. }));
    }

    #[test]
    fn discover_requires_directory() {
        let err = ScriptModule::discover(Path::new("/nonexistent/module")).unwrap_err();
        assert!(matches!(err, ScriptError::NotADirectory(_)));
    }

    #[test]
    fn missing_output_reads_as_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let returned = ScriptHook::read_output(&dir.path().join("prediction.csv"));
        assert!(matches!(returned, Returned::Nothing));

        let bad = dir.path().join("prediction.txt");
        fs::write(&bad, "x").unwrap();
        assert!(matches!(ScriptHook::read_output(&bad), Returned::Other(_)));
    }
}
