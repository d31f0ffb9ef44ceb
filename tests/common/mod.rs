//! Shared helpers for scm-git integration tests.
//!
//! Every test builds its own repository in a temp directory with libgit2,
//! then runs the scenario once per available backend.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use git2::{IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

use scm_git::{GitContext, GitScmProvider, WarningCollector};

pub const EMAIL: &str = "dev@example.com";
pub const START_TIME: i64 = 1_600_000_000;
pub const OFFSET_MINUTES: i32 = 120;

pub struct TestRepo {
    _dir: TempDir,
    pub root: PathBuf,
    pub repo: Repository,
    clock: Cell<i64>,
}

impl TestRepo {
    /// Empty repository whose initial branch is `master`.
    pub fn init() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().canonicalize().expect("failed to canonicalize temp dir");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(&root, &opts).expect("failed to init repository");
        Self {
            _dir: dir,
            root,
            repo,
            clock: Cell::new(START_TIME),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).unwrap();
    }

    /// Sets a key in the repository's local config.
    pub fn set_config(&self, key: &str, value: &str) {
        self.repo.config().unwrap().set_str(key, value).unwrap();
    }

    fn signature(&self) -> Signature<'static> {
        let now = self.clock.get();
        self.clock.set(now + 60);
        Signature::new("Dev", EMAIL, &Time::new(now, OFFSET_MINUTES)).unwrap()
    }

    /// Stages every change in the work tree and commits it on HEAD.
    pub fn commit(&self, message: &str) -> Oid {
        let mut index = self.repo.index().unwrap();
        index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = self.signature();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// Commits the current index as a root commit on `branch` without
    /// touching HEAD.
    pub fn orphan_commit(&self, branch: &str) -> Oid {
        let tree = self.repo.find_tree(self.repo.index().unwrap().write_tree().unwrap()).unwrap();
        let sig = self.signature();
        self.repo
            .commit(Some(&format!("refs/heads/{}", branch)), &sig, &sig, "orphan", &tree, &[])
            .unwrap()
    }

    pub fn head(&self) -> Oid {
        self.repo.head().unwrap().peel_to_commit().unwrap().id()
    }

    pub fn branch(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &head, false).unwrap();
    }

    pub fn checkout(&self, name: &str) {
        self.repo.set_head(&format!("refs/heads/{}", name)).unwrap();
        self.repo.checkout_head(Some(CheckoutBuilder::new().force())).unwrap();
    }

    /// Merges `other` into HEAD with a two-parent commit. The histories must
    /// merge cleanly.
    pub fn merge(&self, other: &str, message: &str) -> Oid {
        let ours = self.repo.head().unwrap().peel_to_commit().unwrap();
        let theirs = self
            .repo
            .find_branch(other, git2::BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        let mut merged = self.repo.merge_commits(&ours, &theirs, None).unwrap();
        assert!(!merged.has_conflicts(), "merge of {} conflicted", other);
        let tree = self.repo.find_tree(merged.write_tree_to(&self.repo).unwrap()).unwrap();

        let sig = self.signature();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&ours, &theirs])
            .unwrap();
        self.repo.checkout_head(Some(CheckoutBuilder::new().force())).unwrap();
        oid
    }

    /// Creates `refs/remotes/origin/<name>` pointing at HEAD.
    pub fn remote_branch(&self, name: &str) {
        self.repo
            .reference(&format!("refs/remotes/origin/{}", name), self.head(), true, "test remote")
            .unwrap();
    }

    /// Marks the repository as a shallow clone grafted at HEAD.
    pub fn make_shallow(&self) {
        fs::write(self.repo.path().join("shallow"), format!("{}\n", self.head())).unwrap();
    }
}

pub fn native_git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The embedded backend always, the native one when `git` can run here.
pub fn contexts() -> Vec<(&'static str, GitContext)> {
    let mut contexts = vec![("embedded", GitContext::embedded())];
    if native_git_available() {
        contexts.push(("native", GitContext::native("git")));
    } else {
        eprintln!("git executable not available, skipping native backend");
    }
    contexts
}

pub fn provider(ctx: GitContext) -> (GitScmProvider, Arc<WarningCollector>) {
    let warnings = Arc::new(WarningCollector::new());
    let provider = GitScmProvider::new(Arc::new(ctx), warnings.clone()).with_blame_workers(2);
    (provider, warnings)
}
