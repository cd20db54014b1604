use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;
use crate::error::{HiveError, Result};
use crate::slug::{is_valid_slug, task_branch, worktree_path};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Merged,
    Dropped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Merged => "merged",
            TaskStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = HiveError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Ok(TaskStatus::Active),
            "merged" => Ok(TaskStatus::Merged),
            "dropped" => Ok(TaskStatus::Dropped),
            other => Err(HiveError::Validation(format!(
                "unknown status '{other}', expected active, merged, or dropped"
            ))),
        }
    }
}

/// One unit of work, bound 1:1 to a branch and an isolated worktree.
/// `branch` and `worktree_path` are derived from the slug at creation and
/// never independently mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub slug: String,
    pub description: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    pub created_at: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(repo_root: &Path, config: &HiveConfig, slug: &str, description: &str) -> Self {
        Self {
            slug: slug.to_string(),
            description: description.to_string(),
            branch: task_branch(slug),
            worktree_path: worktree_path(repo_root, config, slug),
            created_at: now_rfc3339(),
            status: TaskStatus::Active,
        }
    }

    /// Schema validation applied before any record is persisted.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_slug(&self.slug) {
            return Err(HiveError::Validation(format!(
                "slug '{}' must be lowercase alphanumeric-and-hyphen",
                self.slug
            )));
        }
        if self.description.trim().is_empty() {
            return Err(HiveError::Validation("description must not be empty".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(HiveError::Validation("branch must not be empty".to_string()));
        }
        if self.worktree_path.as_os_str().is_empty() {
            return Err(HiveError::Validation("worktree path must not be empty".to_string()));
        }
        if self.created_at.trim().is_empty() {
            return Err(HiveError::Validation("creation timestamp must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Caller-mutable subset of a task record. A `slug` value is accepted only
/// when it matches the stored slug; identity is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

pub fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}
