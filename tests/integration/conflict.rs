//! Merge conflict integration tests.
//!
//! A conflicted merge must come back as the raw git error, leave the
//! conflict in the working tree for inspection, and be abortable.

use swarm::Error;

use crate::fixtures::{diamond_swarm, TestRepo};

/// Repository with `shared.txt` at the base commit, a created integration
/// branch, and two workers that rewrote `shared.txt` differently.
fn conflicting_workers() -> TestRepo {
    let repo = TestRepo::new();
    let base = repo.commit_file("shared.txt", "line one\n", "Add shared file");
    repo.save_swarm(&diamond_swarm("sw-1", &base));
    repo.manager().create_integration_branch("sw-1").unwrap();
    repo.worker_branch("sw-1/Toast/B", &base, "shared.txt", "line one from B\n");
    repo.worker_branch("sw-1/Nux/C", &base, "shared.txt", "line one from C\n");
    repo
}

/// Test: Conflicting merge
/// Given two workers editing the same line
/// When both are merged
/// Then the second merge returns Error::Git and the file is unmerged
#[test]
fn test_conflict_returns_raw_git_error() {
    let repo = conflicting_workers();
    let manager = repo.manager();

    manager.merge_to_integration("sw-1", "sw-1/Toast/B").unwrap();
    let err = manager
        .merge_to_integration("sw-1", "sw-1/Nux/C")
        .unwrap_err();

    match &err {
        Error::Git(git) => assert_eq!(git.command, "merge"),
        other => panic!("expected raw git error, got {:?}", other),
    }
    assert!(!err.to_string().starts_with("merging:"));
    assert_eq!(manager.conflicting_files().unwrap(), vec!["shared.txt"]);
}

/// Test: Aborting a conflicted merge restores the integration branch
#[test]
fn test_abort_after_conflict() {
    let repo = conflicting_workers();
    let manager = repo.manager();
    manager.merge_to_integration("sw-1", "sw-1/Toast/B").unwrap();
    let merged = repo.head();
    assert!(manager.merge_to_integration("sw-1", "sw-1/Nux/C").is_err());

    manager.abort_merge().unwrap();

    assert!(manager.conflicting_files().unwrap().is_empty());
    assert_eq!(repo.head(), merged);
    assert_eq!(repo.git(&["status", "--porcelain"]), "");
    assert_eq!(
        repo.read_file("shared.txt").as_deref(),
        Some("line one from B\n")
    );
}

/// Test: Aborting with no merge in progress is a git failure
#[test]
fn test_abort_without_merge() {
    let repo = TestRepo::new();
    let err = repo.manager().abort_merge().unwrap_err();
    assert!(matches!(err, Error::Git(_)));
}

/// Test: A failed merge that is not a conflict is wrapped
#[test]
fn test_merge_of_missing_branch_is_wrapped() {
    let repo = TestRepo::new();
    repo.save_swarm(&diamond_swarm("sw-1", &repo.head()));
    let manager = repo.manager();
    manager.create_integration_branch("sw-1").unwrap();

    let err = manager
        .merge_to_integration("sw-1", "sw-1/ghost/Z")
        .unwrap_err();

    assert!(matches!(err, Error::Step { ref step, .. } if step == "merging"));
    assert!(err.to_string().starts_with("merging: "));
    assert!(manager.conflicting_files().unwrap().is_empty());
}

/// Test: Landing onto a target that moved in a conflicting way
#[test]
fn test_land_conflict_returns_raw_git_error() {
    let repo = conflicting_workers();
    let manager = repo.manager();
    manager.merge_to_integration("sw-1", "sw-1/Toast/B").unwrap();

    repo.git(&["checkout", "--quiet", "main"]);
    repo.commit_file("shared.txt", "line one from main\n", "Edit on main");
    let main_before = repo.head();

    let err = manager.land_to_main("sw-1").unwrap_err();
    assert!(matches!(err, Error::Git(_)));
    assert_eq!(manager.conflicting_files().unwrap(), vec!["shared.txt"]);

    manager.abort_merge().unwrap();
    assert_eq!(repo.current_branch(), "main");
    assert_eq!(repo.head(), main_before);
}
