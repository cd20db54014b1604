use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{HiveError, Result};

/// Run a git subcommand under `dir` and return trimmed stdout.
///
/// Every git invocation in the crate goes through here so failures are
/// classified uniformly: operating outside a repository maps to
/// `NotARepository`, everything else to `Git` wrapping the tool's stderr.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                HiveError::Git("git executable not found; install git or fix PATH".to_string())
            } else {
                HiveError::Git(format!("failed to run git {}: {err}", args.join(" ")))
            }
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("not a git repository") {
            return Err(HiveError::NotARepository(dir.to_path_buf()));
        }
        return Err(HiveError::Git(format!(
            "git {} failed: {stderr}",
            args.join(" ")
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Top-level directory of the repository containing `dir`.
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    let raw = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(raw.trim()))
}

/// Current branch name, or `None` when HEAD is detached.
pub fn current_branch(dir: &Path) -> Result<Option<String>> {
    let raw = run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let name = raw.trim();
    if name.is_empty() || name == "HEAD" {
        Ok(None)
    } else {
        Ok(Some(name.to_string()))
    }
}

pub fn branch_exists(dir: &Path, name: &str) -> Result<bool> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--verify", "--quiet"])
        .arg(format!("refs/heads/{name}"))
        .output()
        .map_err(|err| HiveError::Git(format!("failed to run git rev-parse: {err}")))?;
    Ok(output.status.success())
}

/// Whether the working copy at `dir` has an unfinished merge (MERGE_HEAD present).
pub fn is_merge_in_progress(dir: &Path) -> Result<bool> {
    let git_dir = run_git(dir, &["rev-parse", "--git-dir"])?;
    let git_dir = PathBuf::from(git_dir.trim());
    let git_dir = if git_dir.is_absolute() {
        git_dir
    } else {
        dir.join(git_dir)
    };
    Ok(git_dir.join("MERGE_HEAD").exists())
}

/// Paths with unresolved merge conflicts in the working copy at `dir`.
pub fn conflicted_files(dir: &Path) -> Result<Vec<String>> {
    let raw = run_git(dir, &["diff", "--name-only", "--diff-filter=U"])?;
    Ok(raw
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Content of `path` at `rev`, or `None` when the file does not exist there.
pub fn show_file(dir: &Path, rev: &str, path: &str) -> Result<Option<String>> {
    match run_git(dir, &["show", &format!("{rev}:{path}")]) {
        Ok(content) => Ok(Some(content)),
        Err(HiveError::Git(message))
            if message.contains("does not exist")
                || message.contains("invalid object name")
                || message.contains("exists on disk, but not in") =>
        {
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Version string of the installed git binary, best effort.
pub fn git_binary_version() -> Option<String> {
    let binary = which::which("git").ok()?;
    let output = Command::new(binary).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.name", "Hive Test"],
            vec!["config", "user.email", "hive-test@example.com"],
        ] {
            let output = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(&args)
                .output()
                .expect("run git");
            assert!(output.status.success(), "git {:?} failed", args);
        }
        std::fs::write(dir.join("README.md"), "seed\n").expect("write");
        for args in [vec!["add", "."], vec!["commit", "-m", "seed"]] {
            let output = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(&args)
                .output()
                .expect("run git");
            assert!(output.status.success(), "git {:?} failed", args);
        }
    }

    #[test]
    fn run_git_outside_repo_maps_to_not_a_repository() {
        let temp = TempDir::new().expect("tempdir");
        let err = run_git(temp.path(), &["status", "--porcelain"]).unwrap_err();
        assert!(matches!(err, HiveError::NotARepository(_)));
    }

    #[test]
    fn repo_root_and_current_branch_resolve() {
        let temp = TempDir::new().expect("tempdir");
        init_repo(temp.path());
        let root = repo_root(temp.path()).expect("repo root");
        assert_eq!(
            root.canonicalize().expect("canonicalize"),
            temp.path().canonicalize().expect("canonicalize")
        );
        let branch = current_branch(temp.path()).expect("branch");
        assert_eq!(branch.as_deref(), Some("main"));
    }

    #[test]
    fn branch_exists_distinguishes_known_and_unknown() {
        let temp = TempDir::new().expect("tempdir");
        init_repo(temp.path());
        assert!(branch_exists(temp.path(), "main").expect("exists"));
        assert!(!branch_exists(temp.path(), "no-such-branch").expect("exists"));
    }

    #[test]
    fn show_file_returns_none_for_missing_path() {
        let temp = TempDir::new().expect("tempdir");
        init_repo(temp.path());
        let present = show_file(temp.path(), "main", "README.md").expect("show");
        assert_eq!(present.as_deref(), Some("seed"));
        let absent = show_file(temp.path(), "main", "missing.txt").expect("show");
        assert!(absent.is_none());
    }
}
