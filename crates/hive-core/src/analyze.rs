use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::Result;
use crate::git::show_file;
use crate::task::{Task, TaskStatus};
use crate::worktree::{diff_stats, full_diff, ChangeType, DiffStats};

/// Per-task diff analysis: stats plus the raw diff text the review service
/// consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub slug: String,
    pub branch: String,
    pub stats: DiffStats,
    pub diff: String,
}

/// A file touched by more than one active task. Detection is purely
/// path-based; judging conflict likelihood is the review service's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileOverlap {
    pub path: String,
    pub slugs: Vec<String>,
}

/// One branch's full copy of an overlapping file, for side-by-side review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub label: String,
    pub branch: String,
    /// `None` when the file does not exist on that branch.
    pub content: Option<String>,
}

/// Analyze every active task in the given set against the base branch.
pub fn analyze_tasks(
    repo_root: &Path,
    config: &HiveConfig,
    tasks: &[Task],
    base_branch: Option<&str>,
) -> Result<Vec<TaskAnalysis>> {
    let mut analyses = Vec::new();
    for task in tasks.iter().filter(|task| task.status == TaskStatus::Active) {
        let mut stats = diff_stats(repo_root, config, &task.slug, base_branch)?;
        let diff = full_diff(repo_root, config, &task.slug, base_branch)?;
        apply_change_types(&mut stats, &diff);
        analyses.push(TaskAnalysis {
            slug: task.slug.clone(),
            branch: task.branch.clone(),
            stats,
            diff,
        });
    }
    Ok(analyses)
}

/// Refine numstat change types by scanning the diff headers for
/// "new file" / "deleted file" markers; everything else stays modified.
fn apply_change_types(stats: &mut DiffStats, diff: &str) {
    let mut kinds: BTreeMap<String, ChangeType> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            current = rest.split(" b/").next().map(str::to_string);
        } else if line.starts_with("new file mode") {
            if let Some(path) = &current {
                kinds.insert(path.clone(), ChangeType::Added);
            }
        } else if line.starts_with("deleted file mode") {
            if let Some(path) = &current {
                kinds.insert(path.clone(), ChangeType::Deleted);
            }
        }
    }
    for file in &mut stats.files {
        if let Some(kind) = kinds.get(&file.path) {
            file.change_type = *kind;
        }
    }
}

/// Map each touched file to the set of tasks touching it and keep the ones
/// claimed by two or more.
pub fn overlapping_files(analyses: &[TaskAnalysis]) -> Vec<FileOverlap> {
    let mut by_path: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for analysis in analyses {
        for file in &analysis.stats.files {
            by_path
                .entry(file.path.clone())
                .or_default()
                .insert(analysis.slug.clone());
        }
    }
    by_path
        .into_iter()
        .filter(|(_, slugs)| slugs.len() > 1)
        .map(|(path, slugs)| FileOverlap {
            path,
            slugs: slugs.into_iter().collect(),
        })
        .collect()
}

/// Each task's version of a file plus the target branch's copy. All versions
/// are read through the true repository root so the target branch never
/// depends on any worktree's checkout state.
pub fn file_versions(
    repo_root: &Path,
    path: &str,
    tasks: &[Task],
    target_branch: &str,
) -> Result<Vec<FileVersion>> {
    let mut versions = vec![FileVersion {
        label: target_branch.to_string(),
        branch: target_branch.to_string(),
        content: show_file(repo_root, target_branch, path)?,
    }];
    for task in tasks {
        versions.push(FileVersion {
            label: task.slug.clone(),
            branch: task.branch.clone(),
            content: show_file(repo_root, &task.branch, path)?,
        });
    }
    Ok(versions)
}
