//! Blame data types.
//!
//! Per-line attribution of the commit, committer and commit time that last
//! touched each line of a file, plus the padding rule that keeps a file's
//! attribution exactly as long as the file itself.

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Blame information for a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameLine {
    /// Line number (1-indexed)
    pub line_number: u32,
    /// Full id of the commit that last modified this line
    pub revision: String,
    /// Committer email
    pub author: String,
    /// Commit time in the committer's own offset
    pub date: DateTime<FixedOffset>,
}

impl BlameLine {
    /// The commit time shown in the local zone of this process.
    pub fn local_date(&self) -> DateTime<Local> {
        self.date.with_timezone(&Local)
    }

    fn renumbered(&self, line_number: u32) -> Self {
        Self {
            line_number,
            ..self.clone()
        }
    }
}

/// Blame result for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBlame {
    pub path: PathBuf,
    pub lines: Vec<BlameLine>,
}

/// A file whose lines should be blamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputFile {
    /// Absolute path
    pub path: PathBuf,
    /// Current number of lines in the working copy
    pub lines: usize,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>, lines: usize) -> Self {
        Self {
            path: path.into(),
            lines,
        }
    }

    /// Reads the working copy to count its lines.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        Ok(Self::new(path, count_lines(&content)))
    }
}

/// Counts lines the way `git blame` numbers them: a trailing partial line
/// counts, a trailing newline does not open a new one.
pub fn count_lines(content: &[u8]) -> usize {
    let newlines = content.iter().filter(|&&b| b == b'\n').count();
    match content.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

/// Interprets `epoch` seconds in the committer's offset (minutes east of UTC).
pub fn commit_time(epoch: i64, offset_minutes: i32) -> Option<DateTime<FixedOffset>> {
    FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?
        .timestamp_opt(epoch, 0)
        .single()
}

/// Builds exactly `line_count` ordered attributions out of the lines blame
/// could attribute to a commit.
///
/// Lines past the last attributed one (uncommitted tail) copy the last
/// attribution. Interior gaps copy the nearest attribution before them, and a
/// leading gap copies the first attribution. Returns `None` when nothing in a
/// non-empty file is attributed.
pub fn fill_lines(attributed: &BTreeMap<u32, BlameLine>, line_count: usize) -> Option<Vec<BlameLine>> {
    if line_count == 0 {
        return Some(Vec::new());
    }
    let first = attributed.values().next()?;

    let mut lines = Vec::with_capacity(line_count);
    let mut previous = first;
    for number in 1..=line_count as u32 {
        match attributed.get(&number) {
            Some(line) => {
                previous = line;
                lines.push(line.clone());
            }
            None => lines.push(previous.renumbered(number)),
        }
    }
    Some(lines)
}
