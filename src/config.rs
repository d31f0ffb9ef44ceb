//! Process configuration.
//!
//! Only one knob matters to the backends: an explicit Git executable. When it
//! is absent the backend is chosen by probing the default `git` on PATH.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the Git executable to use.
pub const GIT_EXECUTABLE_ENV: &str = "SCM_GIT_EXECUTABLE";

/// Program name probed when no executable is configured.
pub const GIT_EXECUTABLE_DEFAULT: &str = "git";

#[derive(Debug, Clone)]
pub struct ScmConfig {
    /// Explicit executable; forces the native backend.
    pub git_executable: Option<PathBuf>,
    /// Upper bound on the `git --version` probe during auto-detection.
    pub probe_timeout: Duration,
}

impl Default for ScmConfig {
    fn default() -> Self {
        Self {
            git_executable: None,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl ScmConfig {
    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            git_executable: Some(path.into()),
            ..Self::default()
        }
    }

    /// Reads `SCM_GIT_EXECUTABLE`; an empty value counts as unset.
    pub fn from_env() -> Self {
        let git_executable = std::env::var_os(GIT_EXECUTABLE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            git_executable,
            ..Self::default()
        }
    }
}
