//! Embedded backend: a libgit2 repository handle.
//!
//! `git2::Repository` is not `Sync`, so the handle lives behind a mutex and
//! is only reached through `with_repo`. Diffing one file at a time against a
//! single handle is the expected access pattern.

use git2::{DiffFormat, DiffOptions, ErrorCode, Oid, Repository, Status, StatusOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Result, ScmError};
use crate::git::RepositoryOps;
use crate::git::changed_lines::ChangedLinesComputer;
use crate::models::DiffStatus;

pub struct GitRepository {
    repo: Mutex<Repository>,
    work_tree: PathBuf,
}

impl GitRepository {
    /// Opens the repository whose work tree contains `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|e| {
            debug!("No repository found from {}: {}", path.display(), e);
            ScmError::not_a_work_tree(path)
        })?;
        let work_tree = repo
            .workdir()
            .ok_or_else(|| ScmError::not_a_work_tree(path))?
            .to_path_buf();

        Ok(Self {
            repo: Mutex::new(repo),
            work_tree,
        })
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self
            .repo
            .lock()
            .map_err(|_| ScmError::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }

    fn commit_tree<'r>(repo: &'r Repository, oid: &str) -> Result<git2::Tree<'r>> {
        let oid = Oid::from_str(oid)?;
        Ok(repo.find_commit(oid)?.tree()?)
    }
}

impl RepositoryOps for GitRepository {
    fn work_tree(&self) -> Result<PathBuf> {
        Ok(self.work_tree.clone())
    }

    fn find_ref(&self, full_name: &str) -> Result<Option<String>> {
        self.with_repo(|repo| match repo.find_reference(full_name) {
            Ok(reference) => Ok(Some(reference.peel_to_commit()?.id().to_string())),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn head_oid(&self) -> Result<Option<String>> {
        self.with_repo(|repo| match repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?.id().to_string())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>> {
        self.with_repo(|repo| {
            match repo.merge_base(Oid::from_str(one)?, Oid::from_str(two)?) {
                Ok(base) => Ok(Some(base.to_string())),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn diff_names(&self, base: &str) -> Result<Vec<PathBuf>> {
        self.with_repo(|repo| {
            let tree = Self::commit_tree(repo, base)?;
            let mut opts = DiffOptions::new();
            opts.include_untracked(false);
            let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

            Ok(diff
                .deltas()
                .filter(|delta| DiffStatus::from(delta.status()).is_reported())
                .filter_map(|delta| delta.new_file().path().map(|p| self.work_tree.join(p)))
                .collect())
        })
    }

    fn diff_file(&self, base: &str, path: &Path, computer: &mut ChangedLinesComputer) -> Result<()> {
        let relative = relative_to(&self.work_tree, path)
            .ok_or_else(|| ScmError::PathNotFound(path.display().to_string()))?;

        self.with_repo(|repo| {
            let tree = Self::commit_tree(repo, base)?;
            let mut opts = DiffOptions::new();
            opts.pathspec(git_path(&relative))
                .disable_pathspec_match(true)
                .ignore_whitespace(true);
            let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

            diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
                let content = String::from_utf8_lossy(line.content());
                let content = content.trim_end_matches('\n');
                match line.origin() {
                    'H' => computer.feed_line(content),
                    origin @ ('+' | '-' | ' ') => computer.feed_line(&format!("{}{}", origin, content)),
                    _ => {}
                }
                true
            })?;
            computer.finish();
            Ok(())
        })
    }

    fn is_shallow(&self) -> Result<bool> {
        self.with_repo(|repo| Ok(repo.is_shallow()))
    }

    fn included_files(&self) -> Result<Vec<PathBuf>> {
        self.with_repo(|repo| {
            let mut files: Vec<PathBuf> = repo
                .index()?
                .iter()
                .map(|entry| self.work_tree.join(String::from_utf8_lossy(&entry.path).as_ref()))
                .collect();

            let mut opts = StatusOptions::new();
            opts.include_untracked(true)
                .recurse_untracked_dirs(true)
                .include_ignored(false);
            for entry in repo.statuses(Some(&mut opts))?.iter() {
                if entry.status().contains(Status::WT_NEW) {
                    if let Some(path) = entry.path() {
                        files.push(self.work_tree.join(path));
                    }
                }
            }
            Ok(files)
        })
    }
}

/// `path` relative to `root`, retrying with canonical forms so symlinked
/// temp directories still match.
pub(crate) fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Some(relative.to_path_buf());
    }
    let root = root.canonicalize().ok()?;
    let path = match path.canonicalize() {
        Ok(path) => path,
        Err(_) => path.parent()?.canonicalize().ok()?.join(path.file_name()?),
    };
    path.strip_prefix(&root).ok().map(Path::to_path_buf)
}

/// Git pathspecs always use forward slashes.
pub(crate) fn git_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
