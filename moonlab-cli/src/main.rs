//! Moonlab CLI — local walk-forward test and project bootstrap.
//!
//! Commands:
//! - `test`: replay the test moons through a module's hooks and write the prediction
//! - `init`: create a project directory with its `.crunchdao` metadata

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use moonlab_core::TracingReporter;
use moonlab_runner::project::PROJECT_NAME_PLACEHOLDER;
use moonlab_runner::{init_project, run_local_test, LocalDataSource, ScriptModule, TestConfig};

#[derive(Parser)]
#[command(
    name = "moonlab",
    about = "Moonlab CLI — walk-forward local tester for moon-indexed pipelines"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the walk-forward local test.
    Test {
        /// Directory holding the `data_process`, `train` and `infer` programs.
        #[arg(long, default_value = ".")]
        module: PathBuf,

        /// TOML config file. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory `train` writes to and `infer` reads from.
        #[arg(long)]
        model_directory: Option<PathBuf>,

        /// Do not train before the first moon.
        #[arg(long, default_value_t = false)]
        no_force_first_train: bool,

        /// Retrain on moons divisible by N; 0 disables periodic retraining.
        #[arg(long)]
        train_frequency: Option<u64>,

        /// Directory holding `dataset.toml`; receives `prediction.csv` and `run.json`.
        #[arg(long)]
        data_directory: Option<PathBuf>,
    },
    /// Create a new project directory.
    Init {
        /// Project name, substituted for `{projectName}` in the directory.
        project_name: String,

        /// Push token stored in `.crunchdao/token`.
        #[arg(long)]
        token: String,

        /// Target directory template.
        #[arg(long, default_value = PROJECT_NAME_PLACEHOLDER)]
        directory: String,
    },
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Test {
            module,
            config,
            model_directory,
            no_force_first_train,
            train_frequency,
            data_directory,
        } => {
            let mut test_config = load_config(config.as_deref())?;
            if let Some(dir) = model_directory {
                test_config.model_directory = dir;
            }
            if no_force_first_train {
                test_config.force_first_train = false;
            }
            if let Some(frequency) = train_frequency {
                test_config.train_frequency = frequency;
            }
            if let Some(dir) = data_directory {
                test_config.data_directory = dir;
            }
            run_test(&module, &test_config)
        }
        Commands::Init {
            project_name,
            token,
            directory,
        } => run_init(&project_name, &token, &directory),
    }
}

fn load_config(path: Option<&Path>) -> Result<TestConfig> {
    match path {
        Some(path) => TestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TestConfig::default()),
    }
}

fn run_test(module: &Path, config: &TestConfig) -> Result<()> {
    let module = ScriptModule::discover(module)
        .with_context(|| format!("failed to load module from {}", module.display()))?;
    let source = LocalDataSource::new(&config.data_directory);

    let outcome =
        run_local_test(&module, &source, config, &TracingReporter).context("aborted")?;

    info!(
        moons = outcome.result.steps.len(),
        trained = outcome.manifest.trained_moons.len(),
        "manifest_path={}",
        outcome.manifest_path.display()
    );
    Ok(())
}

fn run_init(project_name: &str, token: &str, directory: &str) -> Result<()> {
    let path = init_project(directory, project_name, token).context("aborted")?;
    println!("your project is available at: {}", path.display());
    println!(" - cd {}", path.display());
    println!(" - moonlab test");
    Ok(())
}
