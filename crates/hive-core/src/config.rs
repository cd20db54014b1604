use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HiveError, Result};

/// Project-local state directory holding the task registry and configuration.
pub fn state_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".hive")
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("config.json")
}

/// Validated provider settings for the external review service. Kept as a
/// separate sub-structure so credentials and feature gating stay in one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Configuration document persisted at `.hive/config.json`. Unknown keys in
/// the file are rejected at parse time instead of silently accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HiveConfig {
    #[serde(default = "default_base_branch")]
    pub default_base_branch: String,
    #[serde(default = "default_worktree_dir")]
    pub worktree_dir: String,
    #[serde(default = "default_auto_symlink")]
    pub auto_symlink: bool,
    #[serde(default)]
    pub custom_symlinks: Vec<String>,
    #[serde(default)]
    pub review: ReviewSettings,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            default_base_branch: default_base_branch(),
            worktree_dir: default_worktree_dir(),
            auto_symlink: default_auto_symlink(),
            custom_symlinks: Vec::new(),
            review: ReviewSettings::default(),
        }
    }
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_worktree_dir() -> String {
    ".hive/worktrees".to_string()
}

fn default_auto_symlink() -> bool {
    true
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

/// Load the configuration, writing the defaults on first touch so the file
/// always exists after one command has run.
pub fn load_or_init(repo_root: &Path) -> Result<HiveConfig> {
    let path = config_path(repo_root);
    if !path.exists() {
        let config = HiveConfig::default();
        save_config(repo_root, &config)?;
        return Ok(config);
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Atomic replace, same discipline as the task registry.
pub fn save_config(repo_root: &Path, config: &HiveConfig) -> Result<PathBuf> {
    let path = config_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(config)?)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// The fixed set of settable configuration keys. `set`/`get` go through this
/// enum so unknown key names are rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DefaultBaseBranch,
    WorktreeDir,
    AutoSymlink,
    CustomSymlinks,
    ReviewEnabled,
    ReviewProvider,
    ReviewModel,
    ReviewApiKeyEnv,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::DefaultBaseBranch,
        ConfigKey::WorktreeDir,
        ConfigKey::AutoSymlink,
        ConfigKey::CustomSymlinks,
        ConfigKey::ReviewEnabled,
        ConfigKey::ReviewProvider,
        ConfigKey::ReviewModel,
        ConfigKey::ReviewApiKeyEnv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::DefaultBaseBranch => "default-base-branch",
            ConfigKey::WorktreeDir => "worktree-dir",
            ConfigKey::AutoSymlink => "auto-symlink",
            ConfigKey::CustomSymlinks => "custom-symlinks",
            ConfigKey::ReviewEnabled => "review.enabled",
            ConfigKey::ReviewProvider => "review.provider",
            ConfigKey::ReviewModel => "review.model",
            ConfigKey::ReviewApiKeyEnv => "review.api-key-env",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = HiveError;

    fn from_str(value: &str) -> Result<Self> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
            .ok_or_else(|| {
                HiveError::Validation(format!(
                    "unknown config key '{}', expected one of: {}",
                    value.trim(),
                    ConfigKey::ALL
                        .iter()
                        .map(|key| key.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

pub fn get_value(config: &HiveConfig, key: ConfigKey) -> String {
    match key {
        ConfigKey::DefaultBaseBranch => config.default_base_branch.clone(),
        ConfigKey::WorktreeDir => config.worktree_dir.clone(),
        ConfigKey::AutoSymlink => config.auto_symlink.to_string(),
        ConfigKey::CustomSymlinks => config.custom_symlinks.join(","),
        ConfigKey::ReviewEnabled => config.review.enabled.to_string(),
        ConfigKey::ReviewProvider => config.review.provider.clone(),
        ConfigKey::ReviewModel => config.review.model.clone(),
        ConfigKey::ReviewApiKeyEnv => config.review.api_key_env.clone(),
    }
}

/// Parse and apply one value; values are validated per key before anything
/// is stored.
pub fn set_value(config: &mut HiveConfig, key: ConfigKey, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        ConfigKey::DefaultBaseBranch => {
            if value.is_empty() {
                return Err(HiveError::Validation(
                    "default-base-branch must not be empty".to_string(),
                ));
            }
            config.default_base_branch = value.to_string();
        }
        ConfigKey::WorktreeDir => {
            if value.is_empty() || Path::new(value).is_absolute() {
                return Err(HiveError::Validation(
                    "worktree-dir must be a non-empty path relative to the repository root"
                        .to_string(),
                ));
            }
            config.worktree_dir = value.to_string();
        }
        ConfigKey::AutoSymlink => config.auto_symlink = parse_bool(key, value)?,
        ConfigKey::CustomSymlinks => {
            config.custom_symlinks = value
                .split(',')
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect();
        }
        ConfigKey::ReviewEnabled => config.review.enabled = parse_bool(key, value)?,
        ConfigKey::ReviewProvider => {
            if value.is_empty() {
                return Err(HiveError::Validation(
                    "review.provider must not be empty".to_string(),
                ));
            }
            config.review.provider = value.to_string();
        }
        ConfigKey::ReviewModel => config.review.model = value.to_string(),
        ConfigKey::ReviewApiKeyEnv => {
            if value.is_empty() {
                return Err(HiveError::Validation(
                    "review.api-key-env must not be empty".to_string(),
                ));
            }
            config.review.api_key_env = value.to_string();
        }
    }
    Ok(())
}

fn parse_bool(key: ConfigKey, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(HiveError::Validation(format!(
            "{key} expects true or false, got '{other}'"
        ))),
    }
}
