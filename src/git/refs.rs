//! Target branch resolution.
//!
//! A branch name is looked up as a local branch first, then as the
//! `origin` remote-tracking branch. Not finding either is an expected
//! outcome: it is logged, surfaced once as an analysis warning, and
//! reported as `None`.

use tracing::{debug, warn};

use crate::error::Result;
use crate::git::RepositoryOps;
use crate::models::{REF_NAMESPACES, ResolvedRef};
use crate::warnings::AnalysisWarnings;

pub struct RefResolver<'a> {
    warnings: &'a dyn AnalysisWarnings,
}

impl<'a> RefResolver<'a> {
    pub fn new(warnings: &'a dyn AnalysisWarnings) -> Self {
        Self { warnings }
    }

    pub fn resolve(&self, repo: &dyn RepositoryOps, branch: &str) -> Result<Option<ResolvedRef>> {
        for namespace in REF_NAMESPACES {
            let name = format!("{}{}", namespace, branch);
            if let Some(oid) = repo.find_ref(&name)? {
                debug!("Resolved target branch '{}' to {} ({})", branch, name, oid);
                return Ok(Some(ResolvedRef { name, oid }));
            }
        }

        warn!("Could not find ref: {} in refs/heads or refs/remotes/origin", branch);
        self.warnings.add_unique(&format!(
            "Could not find ref '{}' in refs/heads or refs/remotes/origin. \
             You may see unexpected issues and changes. \
             Please make sure to fetch this ref before pull request analysis.",
            branch
        ));
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::git::changed_lines::ChangedLinesComputer;
    use crate::warnings::WarningCollector;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// In-memory repository. Diffs are canned text keyed by path; a path
    /// without one fails like an unreadable file.
    #[derive(Default)]
    pub(crate) struct FakeRepo {
        pub refs: HashMap<String, String>,
        pub base: Option<String>,
        pub names: Vec<PathBuf>,
        pub diffs: HashMap<PathBuf, String>,
        pub bases_asked: std::cell::RefCell<Vec<(String, String)>>,
    }

    impl RepositoryOps for FakeRepo {
        fn work_tree(&self) -> Result<PathBuf> {
            Ok(PathBuf::from("/work"))
        }
        fn find_ref(&self, full_name: &str) -> Result<Option<String>> {
            Ok(self.refs.get(full_name).cloned())
        }
        fn head_oid(&self) -> Result<Option<String>> {
            Ok(self.refs.get("HEAD").cloned())
        }
        fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>> {
            self.bases_asked.borrow_mut().push((one.to_string(), two.to_string()));
            Ok(self.base.clone())
        }
        fn diff_names(&self, _base: &str) -> Result<Vec<PathBuf>> {
            Ok(self.names.clone())
        }
        fn diff_file(&self, _base: &str, path: &Path, computer: &mut ChangedLinesComputer) -> Result<()> {
            let diff = self
                .diffs
                .get(path)
                .ok_or_else(|| crate::error::ScmError::PathNotFound(path.display().to_string()))?;
            for line in diff.lines() {
                computer.feed_line(line);
            }
            Ok(())
        }
        fn is_shallow(&self) -> Result<bool> {
            Ok(false)
        }
        fn included_files(&self) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    pub(crate) fn repo_with(refs: &[(&str, &str)]) -> FakeRepo {
        FakeRepo {
            refs: refs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..FakeRepo::default()
        }
    }

    #[test]
    fn prefers_local_branch_over_remote() {
        let repo = repo_with(&[
            ("refs/heads/main", "local"),
            ("refs/remotes/origin/main", "remote"),
        ]);
        let warnings = WarningCollector::new();
        let resolved = RefResolver::new(&warnings).resolve(&repo, "main").unwrap().unwrap();

        assert_eq!(resolved.name, "refs/heads/main");
        assert_eq!(resolved.oid, "local");
        assert!(!resolved.is_remote());
        assert!(warnings.messages().is_empty());
    }

    #[test]
    fn falls_back_to_origin_remote() {
        let repo = repo_with(&[("refs/remotes/origin/release", "remote")]);
        let warnings = WarningCollector::new();
        let resolved = RefResolver::new(&warnings).resolve(&repo, "release").unwrap().unwrap();

        assert_eq!(resolved.name, "refs/remotes/origin/release");
        assert!(resolved.is_remote());
    }

    #[test]
    fn unknown_branch_warns_once_and_resolves_to_none() {
        let repo = repo_with(&[("refs/remotes/upstream/main", "elsewhere")]);
        let warnings = WarningCollector::new();
        let resolver = RefResolver::new(&warnings);

        assert!(resolver.resolve(&repo, "main").unwrap().is_none());
        assert!(resolver.resolve(&repo, "main").unwrap().is_none());

        let messages = warnings.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Could not find ref 'main' in refs/heads or refs/remotes/origin."));
    }
}
