//! Merge-base relative diffing.
//!
//! Changes are always measured from the common ancestor of the target ref
//! and HEAD to the working tree. Diffing against the target's tip would
//! flag lines that only moved on the target branch after the fork point.

use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::git::RepositoryOps;
use crate::git::changed_lines::ChangedLinesComputer;
use crate::models::{ChangedFiles, ChangedLines, ResolvedRef};

pub struct MergeBaseDiffer<'a> {
    repo: &'a dyn RepositoryOps,
}

impl<'a> MergeBaseDiffer<'a> {
    pub fn new(repo: &'a dyn RepositoryOps) -> Self {
        Self { repo }
    }

    /// Common ancestor of `target` and HEAD, computed fresh on every call.
    pub fn merge_base(&self, target: &ResolvedRef) -> Result<Option<String>> {
        let Some(head) = self.repo.head_oid()? else {
            warn!("HEAD does not point at a commit, cannot diff against {}", target.name);
            return Ok(None);
        };
        let base = self.repo.merge_base(&target.oid, &head)?;
        match &base {
            Some(base) => debug!("Merge base sha1: {}", base),
            None => warn!("No merge base between HEAD and {}", target.name),
        }
        Ok(base)
    }

    /// Files added or modified since the merge base, as absolute paths.
    /// `None` when there is no merge base to diff against.
    pub fn diff_files(&self, target: &ResolvedRef) -> Result<Option<ChangedFiles>> {
        let Some(base) = self.merge_base(target)? else {
            return Ok(None);
        };
        Ok(Some(self.repo.diff_names(&base)?.into_iter().collect()))
    }

    /// Changed new-side lines for each requested file. Files without changes
    /// are left out; a file that cannot be diffed is logged and skipped.
    pub fn diff_lines<'p, I>(&self, target: &ResolvedRef, files: I) -> Result<Option<ChangedLines>>
    where
        I: IntoIterator<Item = &'p Path>,
    {
        let Some(base) = self.merge_base(target)? else {
            return Ok(None);
        };

        let mut changed = ChangedLines::new();
        for path in files {
            let mut computer = ChangedLinesComputer::new();
            match self.repo.diff_file(&base, path, &mut computer) {
                Ok(()) => {
                    let lines = computer.into_changed_lines();
                    if !lines.is_empty() {
                        changed.insert(path.to_path_buf(), lines);
                    }
                }
                Err(e) => warn!("Failed to get changed lines from git for file {}: {}", path.display(), e),
            }
        }
        Ok(Some(changed))
    }
}
