//! Provider operations outside blame and diff.

mod common;

use std::path::PathBuf;

use common::{TestRepo, contexts, provider};
use scm_git::{BackendKind, GitContext, ScmConfig};
use tempfile::TempDir;

#[test]
fn key_names_the_provider() {
    let (provider, _) = provider(GitContext::embedded());
    assert_eq!(provider.key(), "git");
    assert_eq!(provider.backend(), BackendKind::Embedded);
}

#[test]
fn supports_only_work_trees() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        repo.write("sub/a.txt", "a\n");
        repo.commit("initial");
        let outside = TempDir::new().unwrap();
        let (provider, _) = provider(ctx);

        assert!(provider.supports(&repo.root), "{backend}");
        assert!(provider.supports(&repo.path("sub")), "{backend}");
        assert!(!provider.supports(outside.path()), "{backend}");
    }
}

#[test]
fn revision_id_is_the_head_commit() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        let file = repo.write("a.txt", "a\n");
        repo.commit("first");
        repo.write("a.txt", "b\n");
        let head = repo.commit("second").to_string();
        let (provider, _) = provider(ctx);

        assert_eq!(provider.revision_id(&repo.root).unwrap(), Some(head.clone()), "{backend}");
        assert_eq!(provider.revision_id(&file).unwrap(), Some(head), "{backend}");
    }
}

#[test]
fn revision_id_without_commits_is_unknown() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        let (provider, _) = provider(ctx);

        assert_eq!(provider.revision_id(&repo.root).unwrap(), None, "{backend}");
    }
}

#[test]
fn relative_paths_start_at_the_work_tree_root() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        let file = repo.write("src/deep/a.txt", "a\n");
        repo.commit("initial");
        let (provider, _) = provider(ctx);

        assert_eq!(
            provider.relative_path_from_scm_root(&file).unwrap(),
            Some(PathBuf::from("src/deep/a.txt")),
            "{backend}"
        );
    }
}

#[test]
fn ignore_command_follows_gitignore() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        repo.write(".gitignore", "*.log\nbuild/\n");
        let tracked = repo.write("src/a.txt", "a\n");
        repo.commit("initial");
        let untracked = repo.write("src/b.txt", "b\n");
        let nested = repo.write("docs/notes/c.txt", "c\n");
        let log = repo.write("debug.log", "noise\n");
        let output = repo.write("build/out.bin", "bin\n");
        let (provider, _) = provider(ctx);

        let ignore = provider.ignore_command(&repo.root).unwrap();

        assert!(!ignore.is_ignored(&tracked), "{backend}");
        assert!(!ignore.is_ignored(&untracked), "{backend}");
        assert!(!ignore.is_ignored(&nested), "{backend}");
        assert!(ignore.is_ignored(&log), "{backend}");
        assert!(ignore.is_ignored(&output), "{backend}");
        assert_eq!(ignore.included_files().len(), 4, "{backend}");
    }
}

#[test]
fn missing_configured_executable_is_a_configuration_error() {
    let err = GitContext::detect(&ScmConfig::with_executable("/definitely/not/here/git")).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.to_string(), "Provided Git executable file does not exist.");
}

#[test]
fn unrunnable_executable_fails_every_operation() {
    let repo = TestRepo::init();
    repo.write("a.txt", "a\n");
    repo.commit("initial");
    let dir = TempDir::new().unwrap();
    let fake = dir.path().join("git");
    std::fs::write(&fake, "not a program").unwrap();

    let (provider, _) = provider(GitContext::native(&fake));

    for _ in 0..2 {
        let err = provider.branch_changed_files("master", &repo.root).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("seems not to be runnable"));
    }
    let err = provider.revision_id(&repo.root).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn ignore_index_covers_the_whole_work_tree_from_a_subdirectory() {
    for (backend, ctx) in contexts() {
        let repo = TestRepo::init();
        repo.write(".gitignore", "*.log\n");
        let inside = repo.write("module/src/a.txt", "a\n");
        let outside = repo.write("other/b.txt", "b\n");
        repo.commit("initial");
        let untracked_outside = repo.write("other/c.txt", "c\n");
        let log = repo.write("module/debug.log", "noise\n");
        let (provider, _) = provider(ctx);

        let ignore = provider.ignore_command(&repo.path("module")).unwrap();

        assert!(!ignore.is_ignored(&inside), "{backend}");
        assert!(!ignore.is_ignored(&outside), "{backend}");
        assert!(!ignore.is_ignored(&untracked_outside), "{backend}");
        assert!(ignore.is_ignored(&log), "{backend}");
        assert_eq!(ignore.included_files().len(), 4, "{backend}");
    }
}
