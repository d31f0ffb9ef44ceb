//! Error types for SCM operations.
//!
//! Defines `ScmError` for every failure the backends can report. Callers
//! split them into two classes:
//! - `Configuration` → stop the whole run (bad executable, not a work tree)
//! - everything else → log, skip the file or operation, keep going

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScmError {
    #[error("{0}")]
    Configuration(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`git {command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    #[error("Malformed blame output: {0}")]
    BlameProtocol(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScmError {
    pub fn not_a_work_tree(path: &std::path::Path) -> Self {
        ScmError::Configuration(format!("Not inside a Git work tree: {}", path.display()))
    }

    /// True for errors that cannot be recovered from without fixing the setup.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScmError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, ScmError>;
