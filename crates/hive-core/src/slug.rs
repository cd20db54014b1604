use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::HiveConfig;

pub const MAX_SLUG_LEN: usize = 50;

/// Reserved slug for the main working copy; never assigned to a task.
pub const MAIN_SLUG: &str = "main";

pub const BRANCH_PREFIX: &str = "hive/";

/// Derive the canonical task identifier from a free-text description.
///
/// Lowercase, non-alphanumeric runs collapse to single hyphens, trimmed of
/// leading/trailing hyphens. Slugs longer than 50 characters are cut back to
/// the last hyphen before the limit so the result never ends mid-word.
pub fn generate_slug(description: &str) -> String {
    static COLLAPSE: OnceLock<Regex> = OnceLock::new();
    let collapse = COLLAPSE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("regex"));
    let lowered = description.to_lowercase();
    let collapsed = collapse.replace_all(&lowered, "-").to_string();
    let mut slug = collapsed.trim_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        let cut = slug[..MAX_SLUG_LEN].rfind('-').unwrap_or(MAX_SLUG_LEN);
        slug.truncate(cut);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug
    }
}

/// Whether `value` has the canonical slug shape: lowercase
/// alphanumeric-and-hyphen, non-empty.
pub fn is_valid_slug(value: &str) -> bool {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE
        .get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("regex"))
        .is_match(value)
}

/// Branch name for a task; a pure function of the slug.
pub fn task_branch(slug: &str) -> String {
    format!("{BRANCH_PREFIX}{slug}")
}

/// Slug encoded in a hive-managed branch name, if any.
pub fn slug_from_branch(branch: &str) -> Option<&str> {
    branch.strip_prefix(BRANCH_PREFIX)
}

/// Worktree location for a task; a pure function of slug plus configuration.
pub fn worktree_path(repo_root: &Path, config: &HiveConfig, slug: &str) -> PathBuf {
    repo_root.join(&config.worktree_dir).join(slug)
}
