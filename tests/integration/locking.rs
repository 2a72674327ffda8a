//! Concurrency integration tests.
//!
//! Operations on one swarm are serialized by its lock file; operations on
//! different swarms sharing a working tree are serialized by the worktree
//! lock, so a merge never lands on another swarm's branch.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::fixtures::{diamond_swarm, TestRepo};

/// Test: Concurrent merges into one swarm
/// Given four workers touching different files
/// When all four merge at once from separate threads
/// Then every merge succeeds and produces its own merge commit
#[test]
fn test_concurrent_merges_into_one_swarm() {
    let repo = TestRepo::new();
    let base = repo.head();
    repo.save_swarm(&diamond_swarm("sw-1", &base));
    let manager = Arc::new(repo.manager());
    manager.create_integration_branch("sw-1").unwrap();

    let branches: Vec<String> = (0..4).map(|i| format!("sw-1/w{}/t{}", i, i)).collect();
    for (i, branch) in branches.iter().enumerate() {
        repo.worker_branch(branch, &base, &format!("file{}.txt", i), "work\n");
    }

    let handles: Vec<_> = branches
        .iter()
        .cloned()
        .map(|branch| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.merge_to_integration("sw-1", &branch))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let merges = repo.git(&["log", "--merges", "--format=%s", "swarm/sw-1"]);
    assert_eq!(merges.lines().count(), 4);
    for i in 0..4 {
        assert_eq!(repo.read_file(&format!("file{}.txt", i)).as_deref(), Some("work\n"));
    }
}

/// Test: Two swarms sharing a working tree
/// When both merge concurrently
/// Then each integration branch holds only its own worker's change
#[test]
fn test_swarms_sharing_a_worktree_do_not_cross_merge() {
    let repo = TestRepo::new();
    let base = repo.head();
    repo.save_swarm(&diamond_swarm("sw-1", &base));
    repo.save_swarm(&diamond_swarm("sw-2", &base));
    let manager = Arc::new(repo.manager());
    manager.create_integration_branch("sw-1").unwrap();
    manager.create_integration_branch("sw-2").unwrap();

    for round in 0..3 {
        let one = format!("sw-1/Toast/r{}", round);
        let two = format!("sw-2/Nux/r{}", round);
        repo.worker_branch(&one, &base, &format!("one-{}.txt", round), "1\n");
        repo.worker_branch(&two, &base, &format!("two-{}.txt", round), "2\n");

        let a = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.merge_to_integration("sw-1", &one))
        };
        let b = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.merge_to_integration("sw-2", &two))
        };
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();
    }

    for round in 0..3 {
        let has = |branch: &str, file: String| {
            repo.try_git(&["cat-file", "-e", &format!("{}:{}", branch, file)])
                .status
                .success()
        };
        assert!(has("swarm/sw-1", format!("one-{}.txt", round)));
        assert!(!has("swarm/sw-1", format!("two-{}.txt", round)));
        assert!(has("swarm/sw-2", format!("two-{}.txt", round)));
        assert!(!has("swarm/sw-2", format!("one-{}.txt", round)));
    }
}

/// Test: The swarm lock is honored by an independent manager
/// Given one manager holding the lock for sw-1
/// When a second manager merges into sw-1
/// Then the merge waits until the lock is released
#[test]
fn test_merge_waits_for_lock_held_elsewhere() {
    let repo = TestRepo::new();
    let base = repo.head();
    repo.save_swarm(&diamond_swarm("sw-1", &base));
    let holder = repo.manager();
    holder.create_integration_branch("sw-1").unwrap();
    repo.worker_branch("sw-1/Toast/B", &base, "b.txt", "from B\n");
    let before = repo.head();

    let lock = holder.locks().acquire("sw-1").unwrap();
    let merger = repo.manager();
    let handle = thread::spawn(move || merger.merge_to_integration("sw-1", "sw-1/Toast/B"));

    thread::sleep(Duration::from_millis(200));
    assert_eq!(repo.head(), before, "merge ran while the lock was held");

    lock.release().unwrap();
    handle.join().unwrap().unwrap();
    assert_ne!(repo.head(), before);
}

/// Test: Lock files live under the repository's lock directory
#[test]
fn test_lock_files_created_under_repo() {
    let repo = TestRepo::new();
    repo.save_swarm(&diamond_swarm("sw-1", &repo.head()));
    repo.manager().create_integration_branch("sw-1").unwrap();

    assert!(repo.path.join(".swarm-locks/sw-1.lock").exists());
    assert!(repo.path.join(".swarm-locks/%worktree.lock").exists());
}
