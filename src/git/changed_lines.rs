//! Unified-diff hunk parser.
//!
//! Turns the text of a unified diff for one file into the set of new-side
//! line numbers that were added or modified. Deleted lines have no position
//! in the new file and are never recorded.
//!
//! The computer is an `io::Write` sink so process output can be copied
//! straight into it; library diffs feed it line by line.

use std::io::{self, Write};

use crate::models::ChangedLineSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hunk {
    next_new_line: u32,
    old_remaining: u32,
    new_remaining: u32,
}

#[derive(Debug, Default)]
pub struct ChangedLinesComputer {
    pending: Vec<u8>,
    hunk: Option<Hunk>,
    changed: ChangedLineSet,
}

impl ChangedLinesComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of diff text, without its terminator.
    pub fn feed_line(&mut self, line: &str) {
        if let Some(hunk) = parse_hunk_header(line) {
            self.hunk = Some(hunk);
            return;
        }
        let Some(hunk) = self.hunk.as_mut() else {
            return;
        };

        match line.as_bytes().first() {
            Some(b'+') => {
                self.changed.insert(hunk.next_new_line);
                hunk.next_new_line += 1;
                hunk.new_remaining = hunk.new_remaining.saturating_sub(1);
            }
            Some(b'-') => {
                hunk.old_remaining = hunk.old_remaining.saturating_sub(1);
            }
            Some(b' ') | None => {
                hunk.next_new_line += 1;
                hunk.old_remaining = hunk.old_remaining.saturating_sub(1);
                hunk.new_remaining = hunk.new_remaining.saturating_sub(1);
            }
            // "\ No newline at end of file"
            Some(b'\\') => {}
            Some(_) => {
                self.hunk = None;
                return;
            }
        }

        if hunk.old_remaining == 0 && hunk.new_remaining == 0 {
            self.hunk = None;
        }
    }

    /// Processes a trailing line that was written without a final newline.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.feed_line(&String::from_utf8_lossy(&line));
        }
    }

    pub fn changed_lines(&self) -> &ChangedLineSet {
        &self.changed
    }

    pub fn into_changed_lines(mut self) -> ChangedLineSet {
        self.finish();
        self.changed
    }
}

impl Write for ChangedLinesComputer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = crate::git::process::decode_line(&line);
            self.feed_line(&text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses `@@ -oldStart[,oldCount] +newStart[,newCount] @@`.
fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let rest = line.strip_prefix("@@ -")?;
    let (old, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix('+')?;
    let (new, rest) = rest.split_once(' ')?;
    if !rest.starts_with("@@") {
        return None;
    }
    let (_, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some(Hunk {
        next_new_line: new_start,
        old_remaining: old_count,
        new_remaining: new_count,
    })
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
