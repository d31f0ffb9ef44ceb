//! Changed-files / changed-lines result types.
//!
//! - `ChangedFiles`: absolute paths added or modified since the merge base
//! - `ChangedLines`: per file, the new-side line numbers that differ
//! - `DiffStatus`: how a file differs, used to keep only additions and edits

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub type ChangedFiles = BTreeSet<PathBuf>;

pub type ChangedLineSet = BTreeSet<u32>;

pub type ChangedLines = BTreeMap<PathBuf, ChangedLineSet>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    TypeChanged,
    Unmodified,
}

impl DiffStatus {
    /// Deleted files never count as changed, and renames are not tracked.
    pub fn is_reported(self) -> bool {
        matches!(self, DiffStatus::Added | DiffStatus::Modified)
    }
}

impl From<git2::Delta> for DiffStatus {
    fn from(delta: git2::Delta) -> Self {
        match delta {
            git2::Delta::Added | git2::Delta::Untracked => DiffStatus::Added,
            git2::Delta::Deleted => DiffStatus::Deleted,
            git2::Delta::Modified => DiffStatus::Modified,
            git2::Delta::Renamed => DiffStatus::Renamed,
            git2::Delta::Copied => DiffStatus::Copied,
            git2::Delta::Typechange => DiffStatus::TypeChanged,
            _ => DiffStatus::Unmodified,
        }
    }
}
