use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::Result;
use crate::registry::{load_registry, update_task};
use crate::slug::{BRANCH_PREFIX, MAIN_SLUG};
use crate::task::{TaskStatus, TaskUpdate};
use crate::worktree::{list_worktrees, remove_worktree, WorktreeInfo};

/// Worktree creation and registry insertion are two separate writes with no
/// transaction across them; a crash in between strands one side. The scan
/// reports both directions so `clean` can fix them up.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Hive-managed worktrees with no registry record.
    pub orphan_worktrees: Vec<WorktreeInfo>,
    /// Active tasks whose worktree directory is gone.
    pub missing_worktrees: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanReport {
    pub removed_worktrees: Vec<String>,
    pub dropped_tasks: Vec<String>,
}

fn is_hive_managed(repo_root: &Path, config: &HiveConfig, info: &WorktreeInfo) -> bool {
    if info.slug.as_deref() == Some(MAIN_SLUG) {
        return false;
    }
    let branch_managed = info
        .branch
        .as_deref()
        .is_some_and(|branch| branch.starts_with(BRANCH_PREFIX));
    let path_managed = info.path.starts_with(repo_root.join(&config.worktree_dir));
    branch_managed || path_managed
}

pub fn scan(repo_root: &Path, config: &HiveConfig) -> Result<ReconcileReport> {
    let registry = load_registry(repo_root)?;
    let mut report = ReconcileReport::default();

    for info in list_worktrees(repo_root)? {
        if !is_hive_managed(repo_root, config, &info) {
            continue;
        }
        let known = info.slug.as_deref().is_some_and(|slug| {
            registry.tasks.iter().any(|task| task.slug == slug)
        });
        if !known {
            report.orphan_worktrees.push(info);
        }
    }

    for task in &registry.tasks {
        if task.status == TaskStatus::Active && !task.worktree_path.exists() {
            report.missing_worktrees.push(task.slug.clone());
        }
    }

    Ok(report)
}

/// Fix what the scan found: remove orphan worktrees, mark stranded active
/// records dropped. Individual failures are warnings so one stuck entry
/// does not block the rest of the pass.
pub fn clean(repo_root: &Path, config: &HiveConfig) -> Result<CleanReport> {
    let scan = scan(repo_root, config)?;
    let mut report = CleanReport::default();

    for info in scan.orphan_worktrees {
        let Some(slug) = info.slug.clone() else {
            continue;
        };
        match remove_worktree(repo_root, &slug) {
            Ok(()) => report.removed_worktrees.push(slug),
            Err(err) => {
                tracing::warn!(slug = %slug, error = %err, "could not remove orphan worktree");
            }
        }
    }

    for slug in scan.missing_worktrees {
        match update_task(
            repo_root,
            &slug,
            &TaskUpdate {
                status: Some(TaskStatus::Dropped),
                ..TaskUpdate::default()
            },
        ) {
            Ok(_) => report.dropped_tasks.push(slug),
            Err(err) => {
                tracing::warn!(slug = %slug, error = %err, "could not drop stranded task");
            }
        }
    }

    Ok(report)
}
