use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analyze::{FileOverlap, FileVersion, TaskAnalysis};
use crate::config::HiveConfig;
use crate::error::{HiveError, Result};
use crate::worktree::FileDiff;

/// Review of one task's diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub slug: String,
    pub diff: String,
    pub files: Vec<FileDiff>,
    pub total_insertions: usize,
    pub total_deletions: usize,
}

/// Pre-merge review of several tasks together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchReviewRequest {
    pub summaries: Vec<TaskDiffSummary>,
    pub overlaps: Vec<FileOverlap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDiffSummary {
    pub slug: String,
    pub files: Vec<FileDiff>,
    pub total_insertions: usize,
    pub total_deletions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    pub path: String,
    pub versions: Vec<FileVersion>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Concern {
    pub severity: Severity,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    Approve,
    RequestChanges,
    Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub concerns: Vec<Concern>,
    pub positives: Vec<String>,
    pub summary: String,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskImpact {
    pub slug: String,
    pub summary: String,
    pub impact: ImpactLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPrediction {
    pub severity: Severity,
    pub kind: String,
    pub analysis: String,
    pub resolution: String,
    pub affected: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeOrder {
    pub slugs: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncReport {
    pub task_summaries: Vec<TaskImpact>,
    pub conflict_predictions: Vec<ConflictPrediction>,
    pub merge_order: MergeOrder,
    pub overall: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub analysis: String,
    pub resolution: String,
    /// 0 to 100.
    pub confidence: u8,
    pub reasoning: String,
}

/// Boundary to the external generative-review service. The core never talks
/// to a network itself; concrete clients implement this trait and register
/// with the engine.
pub trait ReviewProvider {
    fn name(&self) -> &str;
    fn review(&self, request: &ReviewRequest) -> Result<ReviewResult>;
    fn batch_review(&self, request: &BatchReviewRequest) -> Result<BatchSyncReport>;
    fn resolve_conflict(&self, request: &ResolutionRequest) -> Result<ConflictResolution>;
}

impl std::fmt::Debug for dyn ReviewProvider + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Provider registry, resolved per command invocation from the configured
/// provider name. Every way the service can be unusable (feature disabled,
/// unknown provider, missing credential) maps to the one `AiUnavailable`
/// error class so the caller can print remediation instead of a generic
/// failure.
#[derive(Default)]
pub struct ReviewEngine {
    providers: HashMap<String, Box<dyn ReviewProvider>>,
}

impl ReviewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ReviewProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resolve(&self, config: &HiveConfig) -> Result<&dyn ReviewProvider> {
        if !config.review.enabled {
            return Err(HiveError::AiUnavailable(
                "review is disabled; run `hive config set review.enabled true`".to_string(),
            ));
        }
        let provider = self
            .providers
            .get(&config.review.provider)
            .map(|provider| provider.as_ref())
            .ok_or_else(|| {
                HiveError::AiUnavailable(format!(
                    "no review provider named '{}' is available in this build",
                    config.review.provider
                ))
            })?;
        let key = std::env::var(&config.review.api_key_env).unwrap_or_default();
        if key.trim().is_empty() {
            return Err(HiveError::AiUnavailable(format!(
                "credential missing; set the {} environment variable",
                config.review.api_key_env
            )));
        }
        Ok(provider)
    }
}

/// Build a single-task review request from analyzer output.
pub fn review_request(analysis: &TaskAnalysis) -> ReviewRequest {
    ReviewRequest {
        slug: analysis.slug.clone(),
        diff: analysis.diff.clone(),
        files: analysis.stats.files.clone(),
        total_insertions: analysis.stats.total_insertions,
        total_deletions: analysis.stats.total_deletions,
    }
}

/// Build a batch review request from analyzer output plus the overlap set.
pub fn batch_review_request(
    analyses: &[TaskAnalysis],
    overlaps: &[FileOverlap],
) -> BatchReviewRequest {
    BatchReviewRequest {
        summaries: analyses
            .iter()
            .map(|analysis| TaskDiffSummary {
                slug: analysis.slug.clone(),
                files: analysis.stats.files.clone(),
                total_insertions: analysis.stats.total_insertions,
                total_deletions: analysis.stats.total_deletions,
            })
            .collect(),
        overlaps: overlaps.to_vec(),
    }
}
