use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::{HiveError, Result};
use crate::git::{conflicted_files, current_branch, is_merge_in_progress, run_git};
use crate::registry::{find_task, update_task};
use crate::task::{TaskStatus, TaskUpdate};
use crate::worktree::{has_uncommitted_changes, remove_worktree};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Target branch; the configured default base branch when unset.
    pub target_branch: Option<String>,
    /// Leave the task worktree in place after a successful merge.
    pub keep_worktree: bool,
    /// Pull the target branch before merging. Pull failure is non-fatal.
    pub pull_first: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            target_branch: None,
            keep_worktree: false,
            pull_first: true,
        }
    }
}

/// Outcome of one merge attempt. A conflict is a structured outcome, not an
/// error: the in-progress merge is deliberately left in place for manual
/// resolution, and the task stays active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub merged: bool,
    pub conflicts: Vec<String>,
    pub target: String,
}

/// Integrate a task branch into the target branch.
///
/// Prechecks: the task must exist and be active, and its worktree must be
/// clean (no auto-stash). The merge itself runs in the main working copy:
/// switch to the target, optionally pull, merge the task branch. On success
/// the task is marked merged and its worktree removed unless kept; on
/// conflict the unmerged paths are reported and nothing is rolled back; on
/// any other failure the half-done merge is aborted before the error
/// surfaces.
pub fn merge_task(
    repo_root: &Path,
    config: &HiveConfig,
    slug: &str,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let task = find_task(repo_root, slug)?.ok_or_else(|| HiveError::NotFound(slug.to_string()))?;
    if task.status != TaskStatus::Active {
        return Err(HiveError::InvalidState {
            slug: slug.to_string(),
            status: task.status,
        });
    }
    if has_uncommitted_changes(repo_root, slug)? {
        return Err(HiveError::DirtyWorktree(slug.to_string()));
    }

    let target = options
        .target_branch
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&config.default_base_branch)
        .to_string();

    if current_branch(repo_root)?.as_deref() != Some(target.as_str()) {
        run_git(repo_root, &["checkout", &target])?;
    }
    if options.pull_first {
        if let Err(err) = run_git(repo_root, &["pull", "--ff-only"]) {
            tracing::warn!(target = %target, error = %err, "pull failed, merging against local state");
        }
    }

    match run_git(repo_root, &["merge", "--no-edit", &task.branch]) {
        Ok(_) => {
            update_task(
                repo_root,
                slug,
                &TaskUpdate {
                    status: Some(TaskStatus::Merged),
                    ..TaskUpdate::default()
                },
            )?;
            if !options.keep_worktree {
                if let Err(err) = remove_worktree(repo_root, slug) {
                    tracing::warn!(slug = %slug, error = %err, "merged but could not remove worktree");
                }
            }
            Ok(MergeOutcome {
                merged: true,
                conflicts: Vec::new(),
                target,
            })
        }
        Err(merge_err) => {
            // Probe and abort are best effort from here on: whatever they
            // report, the caller gets the original merge error, not a
            // secondary one.
            let conflicts = match is_merge_in_progress(repo_root) {
                Ok(true) => conflicted_files(repo_root).unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "could not list conflicted files");
                    Vec::new()
                }),
                Ok(false) => Vec::new(),
                Err(err) => {
                    tracing::warn!(error = %err, "could not probe merge state");
                    Vec::new()
                }
            };
            if !conflicts.is_empty() {
                // Left unresolved on purpose so the caller can inspect and
                // finish the merge with their own tooling.
                return Ok(MergeOutcome {
                    merged: false,
                    conflicts,
                    target,
                });
            }
            if let Err(err) = abort_merge(repo_root) {
                tracing::warn!(error = %err, "could not abort failed merge");
            }
            Err(merge_err)
        }
    }
}

/// Abort an in-progress merge in the main working copy. Idempotent: calling
/// it with no merge in progress reports `false` instead of failing.
pub fn abort_merge(repo_root: &Path) -> Result<bool> {
    if !is_merge_in_progress(repo_root)? {
        return Ok(false);
    }
    match run_git(repo_root, &["merge", "--abort"]) {
        Ok(_) => Ok(true),
        Err(HiveError::Git(message))
            if message.contains("There is no merge to abort")
                || message.contains("MERGE_HEAD missing") =>
        {
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
