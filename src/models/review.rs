//! Pull request review types
//!
//! The verdict shape doubles as the JSON schema the LLM is asked to produce,
//! so the serde names here are the single source of truth for the prompt.

use serde::{Deserialize, Serialize};

/// Outcome classification of a review cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Schema-valid and plausible; hand off to a human moderator
    ReadyForReview,
    /// Contributor action needed
    NeedsChanges,
    /// Signals of impersonation, scams, or dead URLs; needs human scrutiny
    Suspicious,
    /// Cannot proceed without contributor clarification
    NeedsInfo,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyForReview => "ready_for_review",
            Self::NeedsChanges => "needs_changes",
            Self::Suspicious => "suspicious",
            Self::NeedsInfo => "needs_info",
        }
    }
}

/// Structured judgment produced by the LLM for one review cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    pub summary: String,
    pub status: ReviewStatus,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub fixed_files: Vec<FixedFile>,
    #[serde(default)]
    pub needs_clarification: Vec<String>,
    #[serde(default)]
    pub suspicious_reasons: Vec<String>,
}

/// A complete replacement for one file, or a delete when content is absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedFile {
    pub filename: String,
    /// `None` or empty signals delete-intent for this file
    #[serde(default)]
    pub content: Option<String>,
}

impl FixedFile {
    pub fn is_delete(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}

/// One changed file in a PR, filtered to tracked content paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrFile {
    pub filename: String,
    pub status: String,
    pub contents: String,
}

/// Pull request metadata as returned by the REST API
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetails {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub user: GitHubUser,
}

/// Open PR entry from the list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub html_url: String,
    pub user: GitHubUser,
    pub head: PullRequestHead,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestHead {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// Issue-level comment on a PR
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub user: GitHubUser,
    pub body: String,
}

/// Head branch identity of a PR; the repo may be a contributor's fork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub sha: String,
}

/// Result of one review attempt
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub reviewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl ReviewOutcome {
    pub fn reviewed() -> Self {
        Self {
            reviewed: true,
            reason: None,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            reviewed: false,
            reason: Some(reason),
        }
    }
}

/// Why a PR was not reviewed this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The bot commented last; the ball is in the contributor's court
    WaitingForUser,
    /// No tracked content files changed
    NoContentFiles,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForUser => "waiting_for_user",
            Self::NoContentFiles => "no_content_files",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ReviewStatus::ReadyForReview).unwrap();
        assert_eq!(json, "\"ready_for_review\"");
        let back: ReviewStatus = serde_json::from_str("\"suspicious\"").unwrap();
        assert_eq!(back, ReviewStatus::Suspicious);
    }

    #[test]
    fn verdict_tolerates_missing_optional_lists() {
        let verdict: ReviewVerdict = serde_json::from_str(
            r#"{"summary": "Looks good!", "status": "ready_for_review"}"#,
        )
        .unwrap();
        assert!(verdict.validation_errors.is_empty());
        assert!(verdict.fixed_files.is_empty());
        assert!(verdict.suspicious_reasons.is_empty());
    }

    #[test]
    fn null_and_empty_content_mean_delete() {
        let del: FixedFile =
            serde_json::from_str(r#"{"filename": "content/projects/x.md", "content": null}"#)
                .unwrap();
        assert!(del.is_delete());

        let del: FixedFile =
            serde_json::from_str(r#"{"filename": "content/projects/x.md"}"#).unwrap();
        assert!(del.is_delete());

        let keep: FixedFile = serde_json::from_str(
            r#"{"filename": "content/projects/x.md", "content": "---\nname: X\n---"}"#,
        )
        .unwrap();
        assert!(!keep.is_delete());
    }
}
