use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::{HiveError, Result};
use crate::registry::{add_task, find_task, remove_task, update_task};
use crate::slug::generate_slug;
use crate::task::{Task, TaskStatus, TaskUpdate};
use crate::worktree::{create_worktree, has_uncommitted_changes, remove_worktree, CreatedWorktree};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub task: Task,
    pub worktree: CreatedWorktree,
}

/// Create a task from a free-text description: derive the slug, create the
/// branch and worktree, then insert the registry record.
///
/// The two writes are not transactional. If the registry insert fails after
/// the worktree exists, the worktree is left orphaned and the reconcile scan
/// will pick it up.
pub fn create_task(
    repo_root: &Path,
    config: &HiveConfig,
    description: &str,
    base_branch: Option<&str>,
) -> Result<NewTask> {
    let description = description.trim();
    if description.is_empty() {
        return Err(HiveError::Validation(
            "task description must not be empty".to_string(),
        ));
    }
    let slug = generate_slug(description);
    if find_task(repo_root, &slug)?.is_some() {
        return Err(HiveError::DuplicateSlug(slug));
    }
    let worktree = create_worktree(repo_root, config, &slug, base_branch)?;
    let task = add_task(repo_root, Task::new(repo_root, config, &slug, description))?;
    Ok(NewTask { task, worktree })
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DropOptions {
    /// Discard uncommitted changes without failing.
    pub force: bool,
    /// Delete the registry record instead of marking it dropped.
    pub remove_record: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DropReport {
    pub slug: String,
    pub worktree_removed: bool,
    pub record_removed: bool,
}

/// Drop a task: remove its worktree (refusing when dirty unless forced) and
/// either mark the record dropped or delete it outright.
pub fn drop_task(repo_root: &Path, slug: &str, options: DropOptions) -> Result<DropReport> {
    let task = find_task(repo_root, slug)?.ok_or_else(|| HiveError::NotFound(slug.to_string()))?;

    let mut worktree_removed = false;
    if task.worktree_path.exists() {
        if !options.force && has_uncommitted_changes(repo_root, slug)? {
            return Err(HiveError::DirtyWorktree(slug.to_string()));
        }
        remove_worktree(repo_root, slug)?;
        worktree_removed = true;
    }

    let record_removed = if options.remove_record {
        remove_task(repo_root, slug)?
    } else {
        if task.status == TaskStatus::Active {
            update_task(
                repo_root,
                slug,
                &TaskUpdate {
                    status: Some(TaskStatus::Dropped),
                    ..TaskUpdate::default()
                },
            )?;
        }
        false
    };

    Ok(DropReport {
        slug: slug.to_string(),
        worktree_removed,
        record_removed,
    })
}
