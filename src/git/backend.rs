//! One-time choice between the native `git` executable and embedded libgit2.
//!
//! `GitContext::detect` runs once at startup and the resulting context is
//! handed to every component. Nothing re-evaluates the choice afterwards.
//!
//! - explicit executable configured → native, trusted without a probe
//! - otherwise `git --version` is probed with a bounded wait → native on
//!   success, embedded on anything else
//!
//! The native executable's runnability is verified lazily, once per context,
//! the first time a native operation needs it.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{GIT_EXECUTABLE_DEFAULT, GIT_EXECUTABLE_ENV, ScmConfig};
use crate::error::{Result, ScmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Native,
    Embedded,
}

/// A Git executable plus the memoized outcome of `git --version`.
#[derive(Debug)]
pub struct GitExecutable {
    program: PathBuf,
    runnable: OnceLock<bool>,
}

impl GitExecutable {
    fn unverified(program: PathBuf) -> Self {
        Self {
            program,
            runnable: OnceLock::new(),
        }
    }

    fn known_runnable(program: PathBuf) -> Self {
        Self {
            program,
            runnable: OnceLock::from(true),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the program once it has been seen to run. The check happens at
    /// most once; a failure is reported again on every later call.
    pub fn verified(&self) -> Result<&Path> {
        let runnable = *self.runnable.get_or_init(|| probe(&self.program, None));
        if runnable {
            Ok(&self.program)
        } else {
            Err(ScmError::Configuration(format!(
                "Native Git at '{}' seems not to be runnable, please configure a valid Git executable using {}.",
                self.program.display(),
                GIT_EXECUTABLE_ENV
            )))
        }
    }
}

#[derive(Debug)]
enum Backend {
    Native(GitExecutable),
    Embedded,
}

/// The backend decision, created once and shared by every component.
#[derive(Debug)]
pub struct GitContext {
    backend: Backend,
}

impl GitContext {
    pub fn detect(config: &ScmConfig) -> Result<Self> {
        if let Some(configured) = &config.git_executable {
            if looks_like_path(configured) && !configured.is_file() {
                warn!(
                    "Provided Git executable file does not exist. {} was set to '{}'",
                    GIT_EXECUTABLE_ENV,
                    configured.display()
                );
                return Err(ScmError::Configuration(
                    "Provided Git executable file does not exist.".to_string(),
                ));
            }
            info!("Using Git executable '{}' from configuration.", configured.display());
            return Ok(Self::native(configured.clone()));
        }

        let default = PathBuf::from(GIT_EXECUTABLE_DEFAULT);
        if probe(&default, Some(config.probe_timeout)) {
            debug!("Using default Git executable: '{}'.", GIT_EXECUTABLE_DEFAULT);
            Ok(Self {
                backend: Backend::Native(GitExecutable::known_runnable(default)),
            })
        } else {
            debug!("No runnable native Git found, using embedded libgit2.");
            Ok(Self::embedded())
        }
    }

    /// Native backend with an executable that is verified on first use.
    pub fn native(program: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Native(GitExecutable::unverified(program.into())),
        }
    }

    pub fn embedded() -> Self {
        Self {
            backend: Backend::Embedded,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self.backend {
            Backend::Native(_) => BackendKind::Native,
            Backend::Embedded => BackendKind::Embedded,
        }
    }

    /// The native executable; `None` for the embedded backend.
    pub fn executable(&self) -> Option<&GitExecutable> {
        match &self.backend {
            Backend::Native(executable) => Some(executable),
            Backend::Embedded => None,
        }
    }
}

fn looks_like_path(program: &Path) -> bool {
    program.is_absolute() || program.components().count() > 1
}

/// Runs `<program> --version`, optionally giving up after `timeout`.
fn probe(program: &Path, timeout: Option<Duration>) -> bool {
    let mut child = match Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!("Failed to invoke native git executable '{}': {}", program.display(), e);
            return false;
        }
    };

    let Some(timeout) = timeout else {
        return match child.wait() {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Failed to wait for native git executable: {}", e);
                false
            }
        };
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) if Instant::now() >= deadline => {
                info!("Git --version did not finish within {:?}", timeout);
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(e) => {
                warn!("Failed to wait for native git executable: {}", e);
                return false;
            }
        }
    }
}
