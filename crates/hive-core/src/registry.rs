use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::state_dir;
use crate::error::{HiveError, Result};
use crate::task::{Task, TaskStatus, TaskUpdate};

/// Persisted document: the full open set of tasks. Merged and dropped records
/// are kept for history until explicitly removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRegistry {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

pub fn registry_path(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("tasks.json")
}

/// Missing file reads as an empty registry; parse errors surface.
pub fn load_registry(repo_root: &Path) -> Result<TaskRegistry> {
    let path = registry_path(repo_root);
    if !path.exists() {
        return Ok(TaskRegistry::default());
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Atomic replace: the document is written to a sibling temp file and renamed
/// over the real one, so a reader never observes a torn write.
pub fn save_registry(repo_root: &Path, registry: &TaskRegistry) -> Result<PathBuf> {
    let path = registry_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(registry)?)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

pub fn tasks(repo_root: &Path) -> Result<Vec<Task>> {
    Ok(load_registry(repo_root)?.tasks)
}

pub fn find_task(repo_root: &Path, slug: &str) -> Result<Option<Task>> {
    Ok(load_registry(repo_root)?
        .tasks
        .into_iter()
        .find(|task| task.slug == slug))
}

pub fn tasks_by_status(repo_root: &Path, status: TaskStatus) -> Result<Vec<Task>> {
    let mut tasks = tasks(repo_root)?;
    tasks.retain(|task| task.status == status);
    Ok(tasks)
}

pub fn add_task(repo_root: &Path, task: Task) -> Result<Task> {
    task.validate()?;
    let mut registry = load_registry(repo_root)?;
    if registry.tasks.iter().any(|entry| entry.slug == task.slug) {
        return Err(HiveError::DuplicateSlug(task.slug));
    }
    registry.tasks.push(task.clone());
    save_registry(repo_root, &registry)?;
    Ok(task)
}

pub fn update_task(repo_root: &Path, slug: &str, update: &TaskUpdate) -> Result<Task> {
    if let Some(new_slug) = update.slug.as_deref() {
        if new_slug != slug {
            return Err(HiveError::ImmutableField("slug"));
        }
    }
    let mut registry = load_registry(repo_root)?;
    let index = registry
        .tasks
        .iter()
        .position(|task| task.slug == slug)
        .ok_or_else(|| HiveError::NotFound(slug.to_string()))?;
    let mut merged = registry.tasks[index].clone();
    if let Some(description) = update.description.as_ref() {
        merged.description = description.clone();
    }
    if let Some(status) = update.status {
        merged.status = status;
    }
    merged.validate()?;
    registry.tasks[index] = merged.clone();
    save_registry(repo_root, &registry)?;
    Ok(merged)
}

/// Returns whether a record was actually removed.
pub fn remove_task(repo_root: &Path, slug: &str) -> Result<bool> {
    let mut registry = load_registry(repo_root)?;
    let before = registry.tasks.len();
    registry.tasks.retain(|task| task.slug != slug);
    if registry.tasks.len() == before {
        return Ok(false);
    }
    save_registry(repo_root, &registry)?;
    Ok(true)
}
