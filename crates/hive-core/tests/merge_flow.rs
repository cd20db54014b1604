use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use hive_core::config::HiveConfig;
use hive_core::error::HiveError;
use hive_core::git::is_merge_in_progress;
use hive_core::merge::{abort_merge, merge_task, MergeOptions};
use hive_core::ops::create_task;
use hive_core::registry::find_task;
use hive_core::task::TaskStatus;

fn run_git(repo: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_git_repo(repo: &Path) {
    run_git(repo, &["init", "-b", "main"]);
    run_git(repo, &["config", "user.name", "Hive Test"]);
    run_git(repo, &["config", "user.email", "hive-test@example.com"]);
    std::fs::write(repo.join("shared.txt"), "line one\nline two\n").expect("seed file");
    std::fs::write(repo.join(".gitignore"), ".hive/\n").expect("gitignore");
    run_git(repo, &["add", "."]);
    run_git(repo, &["commit", "-m", "seed"]);
}

fn commit_in(worktree: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(worktree.join(file), content).expect("write");
    run_git(worktree, &["add", "."]);
    run_git(worktree, &["commit", "-m", message]);
}

fn no_pull() -> MergeOptions {
    MergeOptions {
        pull_first: false,
        ..MergeOptions::default()
    }
}

#[test]
fn happy_path_merges_and_removes_the_worktree() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let created = create_task(repo, &config, "Add feature file", None).expect("create");
    commit_in(&created.worktree.path, "feature.txt", "feature\n", "add feature");

    let outcome = merge_task(repo, &config, &created.task.slug, &no_pull()).expect("merge");
    assert!(outcome.merged);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.target, "main");

    let task = find_task(repo, &created.task.slug).expect("find").expect("task");
    assert_eq!(task.status, TaskStatus::Merged);
    assert!(!created.worktree.path.exists());
    assert!(repo.join("feature.txt").exists());
}

#[test]
fn keep_worktree_leaves_the_directory_in_place() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let created = create_task(repo, &config, "Keep me around", None).expect("create");
    commit_in(&created.worktree.path, "keep.txt", "keep\n", "add keep");

    let options = MergeOptions {
        keep_worktree: true,
        pull_first: false,
        ..MergeOptions::default()
    };
    let outcome = merge_task(repo, &config, &created.task.slug, &options).expect("merge");
    assert!(outcome.merged);
    assert!(created.worktree.path.exists());
}

#[test]
fn conflict_reports_files_and_leaves_the_merge_in_progress() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let first = create_task(repo, &config, "First edit", None).expect("create");
    commit_in(&first.worktree.path, "shared.txt", "first version\nline two\n", "first");

    let second = create_task(repo, &config, "Second edit", None).expect("create");
    commit_in(
        &second.worktree.path,
        "shared.txt",
        "second version\nline two\n",
        "second",
    );

    let outcome = merge_task(repo, &config, &first.task.slug, &no_pull()).expect("first merge");
    assert!(outcome.merged);

    let outcome = merge_task(repo, &config, &second.task.slug, &no_pull()).expect("second merge");
    assert!(!outcome.merged);
    assert_eq!(outcome.conflicts, vec!["shared.txt".to_string()]);

    // Conflict outcome leaves the merge unresolved and the task untouched.
    assert!(is_merge_in_progress(repo).expect("merge state"));
    let task = find_task(repo, &second.task.slug).expect("find").expect("task");
    assert_eq!(task.status, TaskStatus::Active);
    assert!(second.worktree.path.exists());

    assert!(abort_merge(repo).expect("abort"));
    assert!(!is_merge_in_progress(repo).expect("merge state"));
}

#[test]
fn dirty_worktree_blocks_the_merge() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let created = create_task(repo, &config, "Dirty task", None).expect("create");
    std::fs::write(created.worktree.path.join("wip.txt"), "uncommitted\n").expect("write");

    let err = merge_task(repo, &config, &created.task.slug, &no_pull()).unwrap_err();
    assert!(matches!(err, HiveError::DirtyWorktree(_)));
    let task = find_task(repo, &created.task.slug).expect("find").expect("task");
    assert_eq!(task.status, TaskStatus::Active);
}

#[test]
fn merged_task_cannot_be_merged_again() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let created = create_task(repo, &config, "Merge once", None).expect("create");
    commit_in(&created.worktree.path, "once.txt", "once\n", "add once");
    merge_task(repo, &config, &created.task.slug, &no_pull()).expect("merge");

    let err = merge_task(repo, &config, &created.task.slug, &no_pull()).unwrap_err();
    assert!(matches!(
        err,
        HiveError::InvalidState {
            status: TaskStatus::Merged,
            ..
        }
    ));
}

#[test]
fn unknown_task_is_not_found() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let err = merge_task(repo, &config, "ghost", &no_pull()).unwrap_err();
    assert!(matches!(err, HiveError::NotFound(_)));
}

#[test]
fn merge_failure_surfaces_the_original_error() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);
    let config = HiveConfig::default();

    let created = create_task(repo, &config, "Doomed merge", None).expect("create");
    commit_in(&created.worktree.path, "doomed.txt", "doomed\n", "add doomed");
    // Delete the task branch out from under the coordinator so the merge
    // itself fails for a reason other than conflicts.
    run_git(
        &created.worktree.path,
        &["checkout", "--detach", "HEAD"],
    );
    run_git(repo, &["branch", "-D", &created.task.branch]);

    let err = merge_task(repo, &config, &created.task.slug, &no_pull()).unwrap_err();
    // The error must describe the failed merge, not any cleanup step.
    match err {
        HiveError::Git(message) => {
            assert!(
                message.contains("merge"),
                "expected the merge failure, got: {message}"
            );
        }
        other => panic!("expected a git error from the merge, got {other:?}"),
    }
    assert!(!is_merge_in_progress(repo).expect("merge state"));
    let task = find_task(repo, &created.task.slug).expect("find").expect("task");
    assert_eq!(task.status, TaskStatus::Active);
}

#[test]
fn abort_merge_is_idempotent() {
    let temp = TempDir::new().expect("tempdir");
    let repo = temp.path();
    init_git_repo(repo);

    assert!(!abort_merge(repo).expect("abort with nothing in progress"));
    assert!(!abort_merge(repo).expect("still nothing in progress"));
}
