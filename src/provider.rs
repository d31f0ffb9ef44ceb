//! The Git SCM provider: the operations an analysis run calls.
//!
//! Each operation opens the directory with the backend chosen in the shared
//! `GitContext`, then runs the backend-independent logic from `git::`.
//!
//! Error policy:
//! - configuration errors (bad executable, not a work tree) are returned
//! - an unknown target ref or missing merge base is `Ok(None)`
//! - anything else is logged and degrades to `Ok(None)` as well

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::git::blame::{BlameSource, LibraryBlame, NativeBlame};
use crate::git::coordinator::{BlameOutput, ParallelBlameCoordinator};
use crate::git::diff::MergeBaseDiffer;
use crate::git::ignore::GitIgnoreCommand;
use crate::git::refs::RefResolver;
use crate::git::repository::relative_to;
use crate::git::{self, BackendKind, GitContext, NativeGit};
use crate::models::{ChangedFiles, ChangedLines, InputFile};
use crate::warnings::AnalysisWarnings;

pub struct GitScmProvider {
    ctx: Arc<GitContext>,
    warnings: Arc<dyn AnalysisWarnings>,
    blame_workers: Option<usize>,
}

impl GitScmProvider {
    pub fn new(ctx: Arc<GitContext>, warnings: Arc<dyn AnalysisWarnings>) -> Self {
        Self {
            ctx,
            warnings,
            blame_workers: None,
        }
    }

    /// Overrides the blame pool size, which defaults to the CPU count.
    pub fn with_blame_workers(mut self, workers: usize) -> Self {
        self.blame_workers = Some(workers);
        self
    }

    pub fn key(&self) -> &'static str {
        "git"
    }

    pub fn backend(&self) -> BackendKind {
        self.ctx.kind()
    }

    /// Whether `dir` lies inside a Git work tree.
    pub fn supports(&self, dir: &Path) -> bool {
        match git::open(&self.ctx, dir) {
            Ok(_) => true,
            Err(e) => {
                debug!("{} is not supported: {}", dir.display(), e);
                false
            }
        }
    }

    /// Blames `files` in parallel, writing each result to `output`.
    pub fn blame<I>(&self, base_dir: &Path, files: I, output: &dyn BlameOutput) -> Result<()>
    where
        I: IntoIterator<Item = InputFile>,
    {
        let mut coordinator = ParallelBlameCoordinator::new(&*self.warnings);
        if let Some(workers) = self.blame_workers {
            coordinator = coordinator.with_workers(workers);
        }

        let source: Box<dyn BlameSource + '_> = match self.ctx.executable() {
            Some(executable) => Box::new(NativeBlame::new(NativeGit::verified(executable, base_dir)?)),
            None => Box::new(LibraryBlame::open(base_dir)?),
        };
        coordinator.blame(&*source, files, output);
        Ok(())
    }

    /// Files added or modified since the merge base with `target_branch`.
    pub fn branch_changed_files(&self, target_branch: &str, root_dir: &Path) -> Result<Option<ChangedFiles>> {
        let repo = git::open(&self.ctx, root_dir)?;
        degrade("changed files", || {
            let Some(target) = RefResolver::new(&*self.warnings).resolve(&*repo, target_branch)? else {
                return Ok(None);
            };
            MergeBaseDiffer::new(&*repo).diff_files(&target)
        })
    }

    /// Changed new-side lines of `files` since the merge base with
    /// `target_branch`. Files without changes are absent from the map.
    pub fn branch_changed_lines(
        &self,
        target_branch: &str,
        root_dir: &Path,
        files: &[PathBuf],
    ) -> Result<Option<ChangedLines>> {
        let repo = git::open(&self.ctx, root_dir)?;
        degrade("changed lines", || {
            let Some(target) = RefResolver::new(&*self.warnings).resolve(&*repo, target_branch)? else {
                return Ok(None);
            };
            MergeBaseDiffer::new(&*repo).diff_lines(&target, files.iter().map(PathBuf::as_path))
        })
    }

    /// Commit id of HEAD for the repository containing `path`.
    pub fn revision_id(&self, path: &Path) -> Result<Option<String>> {
        let repo = git::open(&self.ctx, containing_dir(path))?;
        degrade("revision id", || repo.head_oid())
    }

    /// `path` relative to the root of its work tree.
    pub fn relative_path_from_scm_root(&self, path: &Path) -> Result<Option<PathBuf>> {
        let repo = git::open(&self.ctx, containing_dir(path))?;
        degrade("relative path", || Ok(relative_to(&repo.work_tree()?, path)))
    }

    pub fn ignore_command(&self, base_dir: &Path) -> Result<GitIgnoreCommand> {
        GitIgnoreCommand::init(&self.ctx, base_dir)
    }
}

fn containing_dir(path: &Path) -> &Path {
    if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    }
}

fn degrade<T, F>(operation: &str, f: F) -> Result<Option<T>>
where
    F: FnOnce() -> Result<Option<T>>,
{
    match f() {
        Err(e) if !e.is_configuration() => {
            warn!("Failed to get {} from git: {}", operation, e);
            Ok(None)
        }
        other => other,
    }
}
