use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::{HiveError, Result};
use crate::git::{branch_exists, current_branch, run_git};
use crate::share::{self, ShareReport};
use crate::slug::{slug_from_branch, task_branch, worktree_path, MAIN_SLUG};

/// One entry of `git worktree list --porcelain`, tagged with the hive slug it
/// maps to. The main working copy gets the reserved slug `main`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeInfo {
    pub path: PathBuf,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub detached: bool,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Live status of one working copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeStatus {
    pub modified: usize,
    pub added: usize,
    pub deleted: usize,
    pub staged: usize,
    pub conflicted: usize,
    pub clean: bool,
    pub ahead: usize,
    pub behind: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    pub path: String,
    pub insertions: usize,
    pub deletions: usize,
    pub change_type: ChangeType,
}

/// Diff of a task branch against its base, computed over `base...HEAD` so
/// only commits unique to the task branch are counted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub files: Vec<FileDiff>,
    pub total_insertions: usize,
    pub total_deletions: usize,
    pub total_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWorktree {
    pub slug: String,
    pub branch: String,
    pub base: String,
    pub path: PathBuf,
    pub share: ShareReport,
}

/// Base branch for new worktrees: explicit choice, then the configured
/// default when that branch exists, then `main`, then `master`, then
/// whatever the main working copy has checked out.
pub fn resolve_base_branch(
    repo_root: &Path,
    config: &HiveConfig,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(base) = explicit {
        let base = base.trim();
        if !base.is_empty() {
            return Ok(base.to_string());
        }
    }
    for candidate in [config.default_base_branch.as_str(), "main", "master"] {
        if branch_exists(repo_root, candidate)? {
            return Ok(candidate.to_string());
        }
    }
    current_branch(repo_root)?.ok_or_else(|| {
        HiveError::Git("cannot resolve a base branch: HEAD is detached and no default exists".to_string())
    })
}

/// Create the branch `hive/<slug>` rooted at the base branch plus an isolated
/// worktree for it, then run the directory-sharing pass when enabled.
pub fn create_worktree(
    repo_root: &Path,
    config: &HiveConfig,
    slug: &str,
    base_branch: Option<&str>,
) -> Result<CreatedWorktree> {
    let branch = task_branch(slug);
    let path = worktree_path(repo_root, config, slug);
    if path.exists() {
        return Err(HiveError::AlreadyExists(format!(
            "worktree path {}",
            path.display()
        )));
    }
    if branch_exists(repo_root, &branch)? {
        return Err(HiveError::AlreadyExists(format!("branch {branch}")));
    }
    let base = resolve_base_branch(repo_root, config, base_branch)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    run_git(
        repo_root,
        &[
            "worktree",
            "add",
            "-b",
            &branch,
            &path.to_string_lossy(),
            &base,
        ],
    )?;
    let share = if config.auto_symlink {
        share::link_shared_dirs(repo_root, &path, config)
    } else {
        ShareReport::default()
    };
    Ok(CreatedWorktree {
        slug: slug.to_string(),
        branch,
        base,
        path,
        share,
    })
}

/// Remove a task's worktree, discarding uncommitted state, then best-effort
/// delete its branch. Branch deletion failure is a warning, not an error.
pub fn remove_worktree(repo_root: &Path, slug: &str) -> Result<()> {
    if slug == MAIN_SLUG {
        return Err(HiveError::Validation(
            "the main working copy cannot be removed".to_string(),
        ));
    }
    let info = find_worktree(repo_root, slug)?
        .ok_or_else(|| HiveError::NotFound(slug.to_string()))?;
    run_git(
        repo_root,
        &["worktree", "remove", "--force", &info.path.to_string_lossy()],
    )?;
    let branch = task_branch(slug);
    if let Err(err) = run_git(repo_root, &["branch", "-D", &branch]) {
        tracing::warn!(branch = %branch, error = %err, "could not delete task branch");
    }
    Ok(())
}

pub fn list_worktrees(repo_root: &Path) -> Result<Vec<WorktreeInfo>> {
    let raw = run_git(repo_root, &["worktree", "list", "--porcelain"])?;
    Ok(parse_worktree_list(&raw))
}

pub fn find_worktree(repo_root: &Path, slug: &str) -> Result<Option<WorktreeInfo>> {
    Ok(list_worktrees(repo_root)?
        .into_iter()
        .find(|info| info.slug.as_deref() == Some(slug)))
}

/// Directory backing a slug: the repository root for `main`, the worktree
/// directory for a task. Fails `NotFound` when no worktree matches.
pub fn worktree_dir(repo_root: &Path, slug: &str) -> Result<PathBuf> {
    if slug == MAIN_SLUG {
        return Ok(repo_root.to_path_buf());
    }
    find_worktree(repo_root, slug)?
        .map(|info| info.path)
        .ok_or_else(|| HiveError::NotFound(slug.to_string()))
}

pub fn has_uncommitted_changes(repo_root: &Path, slug: &str) -> Result<bool> {
    let dir = worktree_dir(repo_root, slug)?;
    let raw = run_git(&dir, &["status", "--porcelain"])?;
    Ok(!raw.trim().is_empty())
}

pub fn worktree_status(repo_root: &Path, slug: &str) -> Result<WorktreeStatus> {
    let dir = worktree_dir(repo_root, slug)?;
    let raw = run_git(&dir, &["status", "--porcelain"])?;
    let mut status = WorktreeStatus::default();
    for line in raw.lines() {
        if line.len() < 2 {
            continue;
        }
        let index = line.as_bytes()[0] as char;
        let tree = line.as_bytes()[1] as char;
        if index == 'U' || tree == 'U' || (index == 'A' && tree == 'A') || (index == 'D' && tree == 'D') {
            status.conflicted += 1;
            continue;
        }
        if index != ' ' && index != '?' {
            status.staged += 1;
        }
        match (index, tree) {
            ('?', '?') => status.added += 1,
            (_, 'M') | ('M', _) | (_, 'R') | ('R', _) => status.modified += 1,
            (_, 'D') | ('D', _) => status.deleted += 1,
            ('A', _) => status.added += 1,
            _ => {}
        }
    }
    status.clean = raw.trim().is_empty();
    // Absent upstream reads as 0/0 rather than an error.
    if let Ok(counts) = run_git(
        &dir,
        &["rev-list", "--left-right", "--count", "@{upstream}...HEAD"],
    ) {
        let mut parts = counts.split_whitespace();
        status.behind = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
        status.ahead = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
    }
    Ok(status)
}

pub fn diff_stats(
    repo_root: &Path,
    config: &HiveConfig,
    slug: &str,
    base_branch: Option<&str>,
) -> Result<DiffStats> {
    let dir = worktree_dir(repo_root, slug)?;
    let base = resolve_base_branch(repo_root, config, base_branch)?;
    let raw = run_git(&dir, &["diff", "--numstat", &format!("{base}...HEAD")])?;
    let mut stats = DiffStats::default();
    for line in raw.lines() {
        let mut parts = line.split('\t');
        let (Some(insertions), Some(deletions), Some(path)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        // Binary files report "-" for both counters.
        let insertions = insertions.trim().parse().unwrap_or(0);
        let deletions = deletions.trim().parse().unwrap_or(0);
        stats.files.push(FileDiff {
            path: path.trim().to_string(),
            insertions,
            deletions,
            change_type: ChangeType::Modified,
        });
        stats.total_insertions += insertions;
        stats.total_deletions += deletions;
    }
    stats.total_files = stats.files.len();
    Ok(stats)
}

pub fn full_diff(
    repo_root: &Path,
    config: &HiveConfig,
    slug: &str,
    base_branch: Option<&str>,
) -> Result<String> {
    let dir = worktree_dir(repo_root, slug)?;
    let base = resolve_base_branch(repo_root, config, base_branch)?;
    run_git(&dir, &["diff", &format!("{base}...HEAD")])
}

fn parse_worktree_list(raw: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeInfo> = None;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            continue;
        }
        if let Some(value) = trimmed.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeInfo {
                path: PathBuf::from(value),
                head: None,
                branch: None,
                detached: false,
                slug: None,
            });
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if let Some(value) = trimmed.strip_prefix("HEAD ") {
            entry.head = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("branch ") {
            let branch = value.trim();
            entry.branch = Some(
                branch
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch)
                    .to_string(),
            );
        } else if trimmed == "detached" {
            entry.detached = true;
        }
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    // The main working copy is always the first porcelain entry.
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.slug = if index == 0 {
            Some(MAIN_SLUG.to_string())
        } else {
            entry
                .branch
                .as_deref()
                .and_then(slug_from_branch)
                .map(str::to_string)
                .or_else(|| {
                    entry
                        .path
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                })
        };
    }
    entries
}
