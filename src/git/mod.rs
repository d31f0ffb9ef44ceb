//! Git access behind two interchangeable backends.
//!
//! - `process`: the native `git` executable
//! - `repository`: embedded libgit2
//!
//! Both implement `RepositoryOps`; the ref, diff and blame logic on top of
//! it is written once so the two backends cannot drift apart.

pub mod backend;
pub mod blame;
pub mod blame_parser;
pub mod changed_lines;
pub mod coordinator;
pub mod diff;
pub mod ignore;
pub mod process;
pub mod refs;
pub mod repository;

use std::path::{Path, PathBuf};

use crate::error::{Result, ScmError};
use changed_lines::ChangedLinesComputer;

pub use backend::{BackendKind, GitContext};
pub use process::NativeGit;
pub use repository::GitRepository;

/// Primitive repository queries each backend provides.
///
/// Paths going in and out are absolute; each backend maps them onto its
/// own work tree.
pub trait RepositoryOps {
    /// Root of the work tree.
    fn work_tree(&self) -> Result<PathBuf>;

    /// Commit id a fully qualified ref points at, `None` if it does not exist.
    fn find_ref(&self, full_name: &str) -> Result<Option<String>>;

    /// Commit id of HEAD, `None` in a repository without commits.
    fn head_oid(&self) -> Result<Option<String>>;

    /// Nearest common ancestor, `None` for unrelated histories.
    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>>;

    /// Files added or modified in the working tree relative to `base`.
    fn diff_names(&self, base: &str) -> Result<Vec<PathBuf>>;

    /// Whitespace-insensitive unified diff of one file between `base` and
    /// the working copy, written into `computer`.
    fn diff_file(&self, base: &str, path: &Path, computer: &mut ChangedLinesComputer) -> Result<()>;

    fn is_shallow(&self) -> Result<bool>;

    /// Tracked files plus untracked files that are not ignored.
    fn included_files(&self) -> Result<Vec<PathBuf>>;
}

/// Opens `dir` with whichever backend `ctx` selected.
pub fn open<'a>(ctx: &'a GitContext, dir: &Path) -> Result<Box<dyn RepositoryOps + 'a>> {
    match ctx.kind() {
        BackendKind::Native => {
            let executable = ctx
                .executable()
                .ok_or_else(|| ScmError::Internal("native backend without executable".to_string()))?;
            Ok(Box::new(NativeGit::verified(executable, dir)?))
        }
        BackendKind::Embedded => Ok(Box::new(GitRepository::open(dir)?)),
    }
}
