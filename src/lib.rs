//! Line-level blame and changed-lines detection for Git repositories.
//!
//! Two engines sit behind one provider:
//! - blame: per-line commit, committer and commit time for many files in
//!   parallel, padded to each file's current length
//! - changed files / changed lines: what differs between the working tree
//!   and its merge base with a target branch, ignoring whitespace
//!
//! Both run against either the native `git` executable or embedded libgit2,
//! chosen once by `GitContext::detect`.

pub mod config;
pub mod error;
pub mod git;
pub mod models;
pub mod provider;
pub mod warnings;

pub use config::ScmConfig;
pub use error::{Result, ScmError};
pub use git::coordinator::{BlameOutput, CollectedBlame};
pub use git::{BackendKind, GitContext};
pub use provider::GitScmProvider;
pub use warnings::{AnalysisWarnings, WarningCollector};
