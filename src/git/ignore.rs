//! Ignore queries backed by a one-time index of the files Git would keep.
//!
//! The index holds every tracked file plus every untracked file that is not
//! excluded by `.gitignore` and friends. Anything else is ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::git::{self, GitContext};

#[derive(Debug, Default)]
pub struct IncludedFiles {
    files: HashSet<PathBuf>,
}

impl IncludedFiles {
    pub fn index(ctx: &GitContext, base_dir: &Path) -> Result<Self> {
        let repo = git::open(ctx, base_dir)?;
        let files: HashSet<PathBuf> = repo.included_files()?.into_iter().collect();
        debug!("{} non excluded files in this Git repository", files.len());
        Ok(Self { files })
    }

    pub fn contains(&self, absolute_path: &Path) -> bool {
        self.files.contains(absolute_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Answers `is_ignored` for one base directory.
#[derive(Debug)]
pub struct GitIgnoreCommand {
    included: IncludedFiles,
}

impl GitIgnoreCommand {
    /// Indexes `base_dir`; the index is not refreshed afterwards.
    pub fn init(ctx: &GitContext, base_dir: &Path) -> Result<Self> {
        Ok(Self {
            included: IncludedFiles::index(ctx, base_dir)?,
        })
    }

    pub fn is_ignored(&self, absolute_path: &Path) -> bool {
        !self.included.contains(absolute_path)
    }

    pub fn included_files(&self) -> &IncludedFiles {
        &self.included
    }
}
