use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::HiveConfig;

/// One ecosystem signature: when every marker file is present at the
/// repository root the listed directories are worth sharing instead of
/// duplicating. An empty marker list applies to every repository.
struct Signature {
    markers: &'static [&'static str],
    dirs: &'static [&'static str],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        markers: &["package.json"],
        dirs: &["node_modules"],
    },
    Signature {
        markers: &["Cargo.toml"],
        dirs: &["target"],
    },
    Signature {
        markers: &["go.mod"],
        dirs: &["vendor"],
    },
    Signature {
        markers: &["requirements.txt"],
        dirs: &[".venv", "venv"],
    },
    Signature {
        markers: &["pyproject.toml"],
        dirs: &[".venv", "venv"],
    },
    Signature {
        markers: &["Gemfile"],
        dirs: &["vendor/bundle"],
    },
    Signature {
        markers: &["composer.json"],
        dirs: &["vendor"],
    },
    Signature {
        markers: &[],
        dirs: &[".cache"],
    },
];

/// Outcome of one sharing pass. Failures never escalate: a directory that
/// cannot be linked ends up in `skipped` with the reason attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShareReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub saved_bytes: u64,
}

/// Directories the sharing pass would consider for this repository:
/// signature matches unioned with the user-configured extras.
pub fn candidate_dirs(repo_root: &Path, config: &HiveConfig) -> Vec<String> {
    let mut candidates = BTreeSet::new();
    for signature in SIGNATURES {
        let matches = signature
            .markers
            .iter()
            .all(|marker| repo_root.join(marker).exists());
        if matches {
            for dir in signature.dirs {
                candidates.insert((*dir).to_string());
            }
        }
    }
    for extra in &config.custom_symlinks {
        let trimmed = extra.trim().trim_matches('/');
        if !trimmed.is_empty() {
            candidates.insert(trimmed.to_string());
        }
    }
    candidates.into_iter().collect()
}

/// Link heavy regenerable directories from the main working copy into a new
/// worktree. Best effort by contract: this never fails the caller, every
/// per-directory problem is recorded as skipped.
pub fn link_shared_dirs(repo_root: &Path, worktree: &Path, config: &HiveConfig) -> ShareReport {
    let mut report = ShareReport::default();
    for dir in candidate_dirs(repo_root, config) {
        let source = repo_root.join(&dir);
        let dest = worktree.join(&dir);
        if !source.exists() {
            report.skipped.push(format!("{dir} (source missing)"));
            continue;
        }
        // symlink_metadata so an existing dangling link still counts as present
        if dest.symlink_metadata().is_ok() {
            report.skipped.push(format!("{dir} (already present)"));
            continue;
        }
        match link_one(&source, &dest) {
            Ok(()) => {
                report.saved_bytes += dir_size(&source);
                report.created.push(dir);
            }
            Err(err) => {
                tracing::warn!(dir = %dir, error = %err, "skipping shared directory");
                report.skipped.push(format!("{dir} ({err})"));
            }
        }
    }
    report
}

#[cfg(unix)]
fn link_one(source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let target = match dest.parent() {
        Some(parent) => relative_path(parent, source),
        None => source.to_path_buf(),
    };
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn link_one(_source: &Path, _dest: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Relative path from `from` (a directory) to `to`. Both sides are walked
/// component-wise past their common prefix; no filesystem access.
fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component.as_os_str());
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Recursive on-disk size of a directory tree; unreadable entries count as
/// zero. Symlinks are not followed.
pub fn dir_size(path: &Path) -> u64 {
    let Ok(meta) = path.symlink_metadata() else {
        return 0;
    };
    if meta.is_symlink() {
        return 0;
    }
    if meta.is_file() {
        return meta.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| dir_size(&entry.path()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn candidates_follow_marker_files() {
        let temp = TempDir::new().expect("tempdir");
        let config = HiveConfig::default();

        // Only the universal signature matches an empty repo.
        assert_eq!(candidate_dirs(temp.path(), &config), vec![".cache"]);

        fs::write(temp.path().join("package.json"), "{}").expect("write");
        fs::write(temp.path().join("Cargo.toml"), "[package]").expect("write");
        let candidates = candidate_dirs(temp.path(), &config);
        assert!(candidates.contains(&"node_modules".to_string()));
        assert!(candidates.contains(&"target".to_string()));
        assert!(!candidates.contains(&"vendor".to_string()));
    }

    #[test]
    fn custom_symlinks_are_unioned_in() {
        let temp = TempDir::new().expect("tempdir");
        let config = HiveConfig {
            custom_symlinks: vec!["dist".to_string(), " build/ ".to_string()],
            ..HiveConfig::default()
        };
        let candidates = candidate_dirs(temp.path(), &config);
        assert!(candidates.contains(&"dist".to_string()));
        assert!(candidates.contains(&"build".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn links_existing_source_and_reports_savings() {
        let temp = TempDir::new().expect("tempdir");
        let repo = temp.path().join("repo");
        let worktree = temp.path().join("repo/.hive/worktrees/wt");
        fs::create_dir_all(repo.join("node_modules/dep")).expect("dirs");
        fs::create_dir_all(&worktree).expect("dirs");
        fs::write(repo.join("package.json"), "{}").expect("write");
        fs::write(repo.join("node_modules/dep/index.js"), "module.exports = 1;\n")
            .expect("write");

        let report = link_shared_dirs(&repo, &worktree, &HiveConfig::default());
        assert_eq!(report.created, vec!["node_modules".to_string()]);
        assert!(report.saved_bytes > 0);

        let link = worktree.join("node_modules");
        assert!(link.symlink_metadata().expect("meta").is_symlink());
        // The link must resolve back to the shared source.
        assert!(link.join("dep/index.js").exists());
        let target = fs::read_link(&link).expect("read link");
        assert!(target.is_relative(), "expected relative link, got {target:?}");
    }

    #[cfg(unix)]
    #[test]
    fn missing_source_and_existing_dest_are_skipped() {
        let temp = TempDir::new().expect("tempdir");
        let repo = temp.path().join("repo");
        let worktree = temp.path().join("wt");
        fs::create_dir_all(&repo).expect("dirs");
        fs::create_dir_all(worktree.join(".cache")).expect("dirs");
        fs::create_dir_all(repo.join(".cache")).expect("dirs");

        let report = link_shared_dirs(&repo, &worktree, &HiveConfig::default());
        assert!(report.created.is_empty());
        assert_eq!(report.skipped, vec![".cache (already present)".to_string()]);
    }

    #[test]
    fn relative_path_walks_up_past_the_common_prefix() {
        assert_eq!(
            relative_path(Path::new("/repo/.hive/worktrees/wt"), Path::new("/repo/target")),
            PathBuf::from("../../../target")
        );
        assert_eq!(
            relative_path(Path::new("/repo"), Path::new("/repo/target")),
            PathBuf::from("target")
        );
    }

    #[test]
    fn dir_size_sums_files() {
        let temp = TempDir::new().expect("tempdir");
        fs::create_dir_all(temp.path().join("nested")).expect("dirs");
        fs::write(temp.path().join("a.bin"), vec![0u8; 100]).expect("write");
        fs::write(temp.path().join("nested/b.bin"), vec![0u8; 50]).expect("write");
        assert_eq!(dir_size(temp.path()), 150);
    }
}
