//! Per-file blame for both backends.
//!
//! A `BlameSource` reports the committed attribution of a file's current
//! lines. Padding to the file's length happens afterwards, in the
//! coordinator, so both backends share it.

use chrono::{DateTime, FixedOffset};
use git2::{BlameOptions, Oid, Repository};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, ScmError};
use crate::git::blame_parser::BlameParser;
use crate::git::process::NativeGit;
use crate::git::repository::relative_to;
use crate::git::{GitRepository, RepositoryOps};
use crate::models::{BlameLine, InputFile, commit_time};

/// Source of per-file blame, shared by all blame workers.
pub trait BlameSource: Sync {
    fn is_shallow(&self) -> Result<bool>;

    /// Committed attributions for the file's current lines, keyed by line
    /// number. Uncommitted lines are absent.
    fn attributions(&self, file: &InputFile) -> Result<BTreeMap<u32, BlameLine>>;
}

/// `git blame --incremental -w`, parsed as it streams.
pub struct NativeBlame<'a> {
    git: NativeGit<'a>,
}

impl<'a> NativeBlame<'a> {
    pub fn new(git: NativeGit<'a>) -> Self {
        Self { git }
    }
}

impl BlameSource for NativeBlame<'_> {
    fn is_shallow(&self) -> Result<bool> {
        self.git.is_shallow()
    }

    fn attributions(&self, file: &InputFile) -> Result<BTreeMap<u32, BlameLine>> {
        let path = self.git.path_arg(&file.path);
        self.git
            .stream(["blame", "--incremental", "-w", "--", &*path], |reader| {
                BlameParser::parse(reader)
            })
    }
}

/// libgit2 blame of HEAD, re-aligned to the working copy's contents.
///
/// Each call opens its own repository handle so workers never share one.
pub struct LibraryBlame {
    repo: GitRepository,
    work_tree: PathBuf,
}

impl LibraryBlame {
    pub fn open(base_dir: &Path) -> Result<Self> {
        let repo = GitRepository::open(base_dir)?;
        let work_tree = repo.work_tree()?;
        Ok(Self { repo, work_tree })
    }
}

impl BlameSource for LibraryBlame {
    fn is_shallow(&self) -> Result<bool> {
        self.repo.is_shallow()
    }

    fn attributions(&self, file: &InputFile) -> Result<BTreeMap<u32, BlameLine>> {
        let relative = relative_to(&self.work_tree, &file.path)
            .ok_or_else(|| ScmError::PathNotFound(file.path.display().to_string()))?;
        let contents = fs::read(&file.path)?;
        if contents.is_empty() {
            return Ok(BTreeMap::new());
        }
        let repo = Repository::open(&self.work_tree)?;

        let mut opts = BlameOptions::new();
        opts.ignore_whitespace(true);
        let committed = repo.blame_file(&relative, Some(&mut opts))?;
        let blame = committed.blame_buffer(&contents)?;

        let mut commits: HashMap<Oid, (String, DateTime<FixedOffset>)> = HashMap::new();
        let mut lines = BTreeMap::new();
        for hunk in blame.iter() {
            let oid = hunk.final_commit_id();
            if oid.is_zero() {
                continue;
            }
            let (author, date) = match commits.get(&oid) {
                Some(known) => known.clone(),
                None => {
                    let known = committer_of(&repo, oid)?;
                    commits.insert(oid, known.clone());
                    known
                }
            };

            let start = hunk.final_start_line() as u32;
            let revision = oid.to_string();
            for line_number in start..start + hunk.lines_in_hunk() as u32 {
                lines.insert(
                    line_number,
                    BlameLine {
                        line_number,
                        revision: revision.clone(),
                        author: author.clone(),
                        date,
                    },
                );
            }
        }
        debug!("Blamed {} lines of {}", lines.len(), relative.display());
        Ok(lines)
    }
}

fn committer_of(repo: &Repository, oid: Oid) -> Result<(String, DateTime<FixedOffset>)> {
    let commit = repo.find_commit(oid)?;
    let committer = commit.committer();
    let when = committer.when();
    let date = commit_time(when.seconds(), when.offset_minutes())
        .ok_or_else(|| ScmError::Internal(format!("commit time of {} out of range", oid)))?;
    Ok((committer.email().unwrap_or("").to_string(), date))
}
