//! Project bootstrap: lay down the `.crunchdao` metadata for a new project.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{DOT_CRUNCHDAO_DIRECTORY, PROJECT_FILE, TOKEN_FILE};

/// Placeholder replaced by the project name in directory templates.
pub const PROJECT_NAME_PLACEHOLDER: &str = "{projectName}";

#[derive(Debug, Error)]
pub enum ProjectError {
    /// The target directory is taken; nothing was written.
    #[error("{0}: already exists")]
    AlreadyExists(PathBuf),

    #[error("project name must not be empty")]
    EmptyName,

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Expand `{projectName}` in a directory template.
pub fn project_directory(template: &str, project_name: &str) -> PathBuf {
    PathBuf::from(template.replace(PROJECT_NAME_PLACEHOLDER, project_name))
}

fn write_file(path: &Path, content: &str) -> Result<(), ProjectError> {
    fs::write(path, content).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Create a project directory holding `.crunchdao/project` and `.crunchdao/token`.
///
/// Returns the created directory.
pub fn init_project(
    template: &str,
    project_name: &str,
    token: &str,
) -> Result<PathBuf, ProjectError> {
    if project_name.trim().is_empty() {
        return Err(ProjectError::EmptyName);
    }

    let directory = project_directory(template, project_name);
    if directory.exists() {
        return Err(ProjectError::AlreadyExists(directory));
    }

    let dot_crunchdao = directory.join(DOT_CRUNCHDAO_DIRECTORY);
    fs::create_dir_all(&dot_crunchdao).map_err(|source| ProjectError::Io {
        path: dot_crunchdao.clone(),
        source,
    })?;
    write_file(&dot_crunchdao.join(PROJECT_FILE), project_name)?;
    write_file(&dot_crunchdao.join(TOKEN_FILE), token)?;

    info!(project = project_name, "project available at: {}", directory.display());
    Ok(directory)
}
