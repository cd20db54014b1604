use std::path::PathBuf;

use thiserror::Error;

use crate::task::TaskStatus;

/// Error taxonomy shared by every core operation. Merge conflicts are not
/// represented here: they are a structured `MergeOutcome`, not a failure.
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    #[error("no task or worktree found for '{0}'")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("task '{slug}' is {status}, expected active")]
    InvalidState { slug: String, status: TaskStatus },
    #[error("worktree for '{0}' has uncommitted changes")]
    DirtyWorktree(String),
    #[error("a task with slug '{0}' already exists")]
    DuplicateSlug(String),
    #[error("field '{0}' cannot be changed")]
    ImmutableField(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    AiUnavailable(String),
    #[error("{0}")]
    Git(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HiveError>;
