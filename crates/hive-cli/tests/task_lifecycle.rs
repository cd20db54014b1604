use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hive"))
}

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
    std::fs::write(repo.join("README.md"), "seed\n").expect("seed");
    std::fs::write(repo.join(".gitignore"), ".hive/\n").expect("gitignore");
    run_git(repo, &["add", "."]);
    run_git(repo, &["commit", "-m", "seed"]);
}

#[test]
fn new_list_status_and_drop() {
    let repo = TempDir::new().expect("repo");
    init_git_repo(repo.path());

    let create = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("new")
        .arg("Fix the login flow")
        .arg("--json")
        .output()
        .expect("hive new");
    assert!(
        create.status.success(),
        "hive new failed: {}",
        String::from_utf8_lossy(&create.stderr)
    );
    let created: Value = serde_json::from_slice(&create.stdout).expect("json");
    assert_eq!(
        created.pointer("/task/slug").and_then(Value::as_str),
        Some("fix-the-login-flow")
    );
    assert_eq!(
        created.pointer("/task/branch").and_then(Value::as_str),
        Some("hive/fix-the-login-flow")
    );
    let worktree = created
        .pointer("/worktree/path")
        .and_then(Value::as_str)
        .expect("worktree path");
    assert!(Path::new(worktree).is_dir());

    let list = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("list")
        .arg("--status")
        .arg("active")
        .arg("--json")
        .output()
        .expect("hive list");
    assert!(list.status.success());
    let listed: Value = serde_json::from_slice(&list.stdout).expect("json");
    let tasks = listed.pointer("/tasks").and_then(Value::as_array).expect("tasks");
    assert_eq!(tasks.len(), 1);

    let status = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("status")
        .arg("fix-the-login-flow")
        .arg("--json")
        .output()
        .expect("hive status");
    assert!(status.status.success());
    let shown: Value = serde_json::from_slice(&status.stdout).expect("json");
    assert_eq!(
        shown.pointer("/worktree/clean").and_then(Value::as_bool),
        Some(true)
    );

    let drop = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("drop")
        .arg("fix-the-login-flow")
        .arg("--force")
        .arg("--remove")
        .arg("--json")
        .output()
        .expect("hive drop");
    assert!(drop.status.success());
    let dropped: Value = serde_json::from_slice(&drop.stdout).expect("json");
    assert_eq!(
        dropped.pointer("/drop/recordRemoved").and_then(Value::as_bool),
        Some(true)
    );
    assert!(!Path::new(worktree).exists());

    let list = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("list")
        .arg("--json")
        .output()
        .expect("hive list");
    let listed: Value = serde_json::from_slice(&list.stdout).expect("json");
    assert!(listed
        .pointer("/tasks")
        .and_then(Value::as_array)
        .expect("tasks")
        .is_empty());
}

#[test]
fn duplicate_description_is_rejected() {
    let repo = TempDir::new().expect("repo");
    init_git_repo(repo.path());

    let first = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("new")
        .arg("Same idea")
        .output()
        .expect("hive new");
    assert!(first.status.success());

    let second = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("new")
        .arg("Same idea")
        .output()
        .expect("hive new");
    assert!(!second.status.success());
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("same-idea"), "unexpected stderr: {stderr}");
}

#[test]
fn status_of_unknown_slug_fails() {
    let repo = TempDir::new().expect("repo");
    init_git_repo(repo.path());

    let status = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("status")
        .arg("ghost")
        .output()
        .expect("hive status");
    assert!(!status.status.success());
    assert!(String::from_utf8_lossy(&status.stderr).contains("ghost"));
}

#[test]
fn worktrees_lists_main_and_tasks() {
    let repo = TempDir::new().expect("repo");
    init_git_repo(repo.path());

    bin()
        .arg("--root")
        .arg(repo.path())
        .arg("new")
        .arg("Side job")
        .output()
        .expect("hive new");

    let listed = bin()
        .arg("--root")
        .arg(repo.path())
        .arg("worktrees")
        .arg("--json")
        .output()
        .expect("hive worktrees");
    assert!(listed.status.success());
    let parsed: Value = serde_json::from_slice(&listed.stdout).expect("json");
    let entries = parsed
        .pointer("/worktrees")
        .and_then(Value::as_array)
        .expect("worktrees");
    let slugs: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry.pointer("/slug").and_then(Value::as_str))
        .collect();
    assert!(slugs.contains(&"main"));
    assert!(slugs.contains(&"side-job"));
}
