//! Parallel blame over many files.
//!
//! ```text
//!   files ──► work queue ──► worker 1 ─┐
//!                        ├─► worker 2 ─┼─► BlameOutput (one call per file)
//!                        └─► worker N ─┘
//! ```
//!
//! A shallow clone is checked once up front and abandons the whole run with
//! a single warning. Otherwise each file is blamed independently; a failing
//! file is logged and skipped without affecting the others.

use crossbeam_channel::unbounded;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use tracing::{debug, info, warn};

use crate::git::blame::BlameSource;
use crate::models::{BlameLine, InputFile, fill_lines};
use crate::warnings::AnalysisWarnings;

pub const SHALLOW_CLONE_WARNING: &str = "Shallow clone detected during the analysis. \
    Some files will miss SCM information. This will affect features like auto-assignment of issues. \
    Please configure your build to disable shallow clone.";

/// Receives finished blame results. Called from worker threads, at most
/// once per file.
pub trait BlameOutput: Sync {
    fn blame_result(&self, file: &InputFile, lines: Vec<BlameLine>);
}

/// Keeps every result in memory, keyed by file path.
#[derive(Debug, Default)]
pub struct CollectedBlame {
    results: Mutex<HashMap<PathBuf, Vec<BlameLine>>>,
}

impl CollectedBlame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_results(self) -> HashMap<PathBuf, Vec<BlameLine>> {
        match self.results.into_inner() {
            Ok(results) => results,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl BlameOutput for CollectedBlame {
    fn blame_result(&self, file: &InputFile, lines: Vec<BlameLine>) {
        let mut results = match self.results.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        results.insert(file.path.clone(), lines);
    }
}

pub struct ParallelBlameCoordinator<'a> {
    warnings: &'a dyn AnalysisWarnings,
    workers: usize,
}

impl<'a> ParallelBlameCoordinator<'a> {
    /// One worker per available CPU.
    pub fn new(warnings: &'a dyn AnalysisWarnings) -> Self {
        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { warnings, workers }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn blame<I>(&self, source: &dyn BlameSource, files: I, output: &dyn BlameOutput)
    where
        I: IntoIterator<Item = InputFile>,
    {
        match source.is_shallow() {
            Ok(true) => {
                warn!(
                    "Shallow clone detected, no blame information will be provided. \
                     You can convert to non-shallow with 'git fetch --unshallow'."
                );
                self.warnings.add_unique(SHALLOW_CLONE_WARNING);
                return;
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to check for a shallow clone: {}", e),
        }

        let (tx, rx) = unbounded::<InputFile>();
        for file in files {
            if tx.send(file).is_err() {
                break;
            }
        }
        drop(tx);

        let rx = &rx;
        thread::scope(|scope| {
            let mut started = 0;
            let mut handles = Vec::with_capacity(self.workers);
            for i in 0..self.workers {
                let spawned = thread::Builder::new()
                    .name(format!("git-blame-{}", i))
                    .spawn_scoped(scope, move || {
                        for file in rx.iter() {
                            blame_one(source, &file, output);
                        }
                    });
                match spawned {
                    Ok(handle) => {
                        started += 1;
                        handles.push(handle);
                    }
                    Err(e) => warn!("Failed to start blame worker: {}", e),
                }
            }

            if started == 0 {
                for file in rx.iter() {
                    blame_one(source, &file, output);
                }
            }

            for handle in handles {
                if handle.join().is_err() {
                    info!("Git blame worker stopped unexpectedly, not waiting for it");
                }
            }
        });
    }
}

fn blame_one(source: &dyn BlameSource, file: &InputFile, output: &dyn BlameOutput) {
    debug!("Blame file {}", file.path.display());
    match source.attributions(file) {
        Ok(attributed) => match fill_lines(&attributed, file.lines) {
            Some(lines) => output.blame_result(file, lines),
            None => debug!("No committed lines in {}, skipping", file.path.display()),
        },
        Err(e) => warn!("Failed to blame {}: {}", file.path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScmError};
    use crate::models::commit_time;
    use crate::warnings::WarningCollector;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        shallow: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(shallow: bool) -> Self {
            Self {
                shallow,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BlameSource for FakeSource {
        fn is_shallow(&self) -> Result<bool> {
            Ok(self.shallow)
        }

        fn attributions(&self, file: &InputFile) -> Result<BTreeMap<u32, BlameLine>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = file.path.to_string_lossy();
            if name.contains("broken") {
                return Err(ScmError::BlameProtocol("boom".to_string()));
            }
            if name.contains("uncommitted") {
                return Ok(BTreeMap::new());
            }
            Ok((1..=2)
                .map(|n| {
                    (
                        n,
                        BlameLine {
                            line_number: n,
                            revision: format!("rev{}", n),
                            author: "dev@example.com".to_string(),
                            date: commit_time(0, 0).unwrap(),
                        },
                    )
                })
                .collect())
        }
    }

    fn files() -> Vec<InputFile> {
        vec![
            InputFile::new("/w/a.txt", 3),
            InputFile::new("/w/broken.txt", 2),
            InputFile::new("/w/uncommitted.txt", 2),
            InputFile::new("/w/b.txt", 2),
        ]
    }

    #[test]
    fn blames_each_file_and_pads_the_tail() {
        let warnings = WarningCollector::new();
        let source = FakeSource::new(false);
        let output = CollectedBlame::new();

        ParallelBlameCoordinator::new(&warnings)
            .with_workers(3)
            .blame(&source, files(), &output);

        let results = output.into_results();
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(results.len(), 2);

        let a = &results[&PathBuf::from("/w/a.txt")];
        assert_eq!(a.len(), 3);
        assert_eq!(a[2].revision, "rev2");
        assert_eq!(a[2].line_number, 3);
        assert_eq!(results[&PathBuf::from("/w/b.txt")].len(), 2);
        assert!(warnings.messages().is_empty());
    }

    #[test]
    fn shallow_clone_skips_everything_with_one_warning() {
        let warnings = WarningCollector::new();
        let source = FakeSource::new(true);
        let output = CollectedBlame::new();

        ParallelBlameCoordinator::new(&warnings).blame(&source, files(), &output);

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(output.into_results().is_empty());
        assert_eq!(warnings.messages(), vec![SHALLOW_CLONE_WARNING.to_string()]);
    }

    #[test]
    fn single_worker_still_processes_every_file() {
        let warnings = WarningCollector::new();
        let source = FakeSource::new(false);
        let output = CollectedBlame::new();

        ParallelBlameCoordinator::new(&warnings)
            .with_workers(0)
            .blame(&source, files(), &output);

        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(output.into_results().len(), 2);
    }
}
