//! Parser for `git blame --incremental` output.
//!
//! The stream is a sequence of records:
//!
//! ```text
//! <commit> <orig-line> <final-line> <line-count>
//! committer-mail <dev@example.com>      (first sighting of a commit only)
//! committer-time 1500000000
//! committer-tz +0200
//! ...other metadata...
//! filename path/to/file
//! ```
//!
//! A header opens a record for a range of final lines; `filename` closes it
//! and assigns the commit's metadata to every line in the range. Metadata is
//! kept per commit for the whole stream because later records for the same
//! commit repeat only the header.
//!
//! Lines attributed to the all-zero commit are working-tree changes and are
//! left unattributed.

use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

use crate::error::{Result, ScmError};
use crate::models::{BlameLine, commit_time};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Accumulating { revision: String, start: u32, count: u32 },
}

#[derive(Debug, Default)]
struct CommitMetadata {
    author: Option<String>,
    epoch: Option<i64>,
    date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug)]
pub struct BlameParser {
    state: State,
    commits: HashMap<String, CommitMetadata>,
    lines: BTreeMap<u32, BlameLine>,
}

impl Default for BlameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BlameParser {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            commits: HashMap::new(),
            lines: BTreeMap::new(),
        }
    }

    /// Parses a complete stream into attributions keyed by line number.
    pub fn parse<R: BufRead + ?Sized>(reader: &mut R) -> Result<BTreeMap<u32, BlameLine>> {
        let mut parser = Self::new();
        let mut buf = Vec::new();
        while reader.read_until(b'\n', &mut buf)? > 0 {
            parser.feed_line(&crate::git::process::decode_line(&buf))?;
            buf.clear();
        }
        parser.finish()
    }

    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "committer-mail" => {
                let email = value
                    .strip_prefix('<')
                    .and_then(|v| v.strip_suffix('>'))
                    .unwrap_or(value);
                self.current_metadata(key)?.author = Some(email.to_string());
            }
            "committer-time" => {
                let epoch = value
                    .parse()
                    .map_err(|_| protocol(format!("bad committer-time '{}'", value)))?;
                self.current_metadata(key)?.epoch = Some(epoch);
            }
            "committer-tz" => {
                let offset = parse_tz(value).ok_or_else(|| protocol(format!("bad committer-tz '{}'", value)))?;
                let metadata = self.current_metadata(key)?;
                let epoch = metadata
                    .epoch
                    .ok_or_else(|| protocol("committer-tz before committer-time".to_string()))?;
                metadata.date = Some(
                    commit_time(epoch, offset)
                        .ok_or_else(|| protocol(format!("commit time {} out of range", epoch)))?,
                );
            }
            "filename" => self.flush()?,
            _ => {
                if self.state == State::Idle {
                    self.state = parse_header(key, value)?;
                }
            }
        }
        Ok(())
    }

    /// Ends the stream; a record without its `filename` line is an error.
    pub fn finish(self) -> Result<BTreeMap<u32, BlameLine>> {
        match self.state {
            State::Idle => Ok(self.lines),
            State::Accumulating { revision, .. } => {
                Err(protocol(format!("blame output ended inside the record for {}", revision)))
            }
        }
    }

    fn current_metadata(&mut self, key: &str) -> Result<&mut CommitMetadata> {
        match &self.state {
            State::Accumulating { revision, .. } => Ok(self.commits.entry(revision.clone()).or_default()),
            State::Idle => Err(protocol(format!("'{}' outside of a blame record", key))),
        }
    }

    fn flush(&mut self) -> Result<()> {
        let State::Accumulating { revision, start, count } = std::mem::replace(&mut self.state, State::Idle)
        else {
            return Err(protocol("'filename' outside of a blame record".to_string()));
        };
        if is_uncommitted(&revision) {
            return Ok(());
        }

        let metadata = self.commits.get(&revision);
        let (Some(author), Some(date)) = (
            metadata.and_then(|m| m.author.clone()),
            metadata.and_then(|m| m.date),
        ) else {
            return Err(protocol(format!("no committer metadata for {}", revision)));
        };

        for line_number in start..start + count {
            self.lines.insert(
                line_number,
                BlameLine {
                    line_number,
                    revision: revision.clone(),
                    author: author.clone(),
                    date,
                },
            );
        }
        Ok(())
    }
}

fn protocol(message: String) -> ScmError {
    ScmError::BlameProtocol(message)
}

fn parse_header(revision: &str, rest: &str) -> Result<State> {
    let is_object_id = matches!(revision.len(), 40 | 64) && revision.bytes().all(|b| b.is_ascii_hexdigit());
    let numbers: Vec<u32> = rest.split(' ').filter_map(|n| n.parse().ok()).collect();
    match (is_object_id, numbers.as_slice()) {
        (true, [_orig, start, count]) if *start > 0 => Ok(State::Accumulating {
            revision: revision.to_string(),
            start: *start,
            count: *count,
        }),
        _ => Err(protocol(format!("unexpected line '{} {}'", revision, rest))),
    }
}

fn is_uncommitted(revision: &str) -> bool {
    revision.bytes().all(|b| b == b'0')
}

/// `+0200` / `-0530` to minutes east of UTC.
fn parse_tz(tz: &str) -> Option<i32> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}
