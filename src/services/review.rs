//! Review engine
//!
//! Drives one review cycle over a single PR: gate, gather context, ask the
//! LLM for a verdict, push whatever fixes it produced to the PR's head
//! branch, and report back with exactly one comment.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::review::{
    FixedFile, IssueComment, ReviewOutcome, ReviewStatus, ReviewVerdict, SkipReason,
};
use crate::services::content::{self, ContentApi};
use crate::services::github::{GitHubApi, GitHubApiError};
use crate::services::llm::{self, LlmApi, LlmError};
use crate::services::prompts;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Outcome of pushing one fixed file
#[derive(Debug, Clone)]
pub struct AppliedFix {
    pub filename: String,
    pub deleted: bool,
    pub commit_url: Option<String>,
    pub error: Option<String>,
    /// Full content, rendered copyable when the push failed
    pub content: Option<String>,
}

impl AppliedFix {
    fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ReviewService {
    github: Arc<dyn GitHubApi>,
    llm: Arc<dyn LlmApi>,
    content: Arc<dyn ContentApi>,
    bot_login: String,
}

impl ReviewService {
    pub fn new(
        github: Arc<dyn GitHubApi>,
        llm: Arc<dyn LlmApi>,
        content: Arc<dyn ContentApi>,
        bot_login: String,
    ) -> Self {
        Self {
            github,
            llm,
            content,
            bot_login,
        }
    }

    /// Run one review cycle. `force` bypasses the waiting-for-user gate
    /// (used when a human explicitly pings the bot).
    pub async fn review_pr(&self, number: u64, force: bool) -> Result<ReviewOutcome, ReviewError> {
        let comments = self.github.pull_request_comments(number).await?;

        if !force && self.bot_commented_last(&comments) {
            info!(pr = number, "bot commented last; waiting for the contributor");
            return Ok(ReviewOutcome::skipped(SkipReason::WaitingForUser));
        }

        let (details, files) = tokio::try_join!(
            self.github.pull_request_details(number),
            self.github.pull_request_files(number)
        )?;

        if files.is_empty() {
            info!(pr = number, "no tracked content files changed");
            return Ok(ReviewOutcome::skipped(SkipReason::NoContentFiles));
        }

        let urls = content::extract_urls(&files);
        let url_checks = content::verify_urls(self.content.as_ref(), &urls).await;

        let prompt =
            prompts::review_prompt(&details, &files, &url_checks, &comments, &self.bot_login);
        let completion = self.llm.complete(&prompt).await?;
        let verdict: ReviewVerdict = llm::parse_verdict(&completion)?;

        info!(
            pr = number,
            status = verdict.status.as_str(),
            fixes = verdict.fixed_files.len(),
            "verdict received"
        );

        let fixes = if verdict.fixed_files.is_empty() {
            Vec::new()
        } else {
            self.apply_fixes(number, &verdict.fixed_files).await
        };

        let comment = format_review_comment(&verdict, &fixes);
        self.github.post_issue_comment(number, &comment).await?;

        Ok(ReviewOutcome::reviewed())
    }

    fn bot_commented_last(&self, comments: &[IssueComment]) -> bool {
        comments
            .last()
            .map(|c| c.user.login == self.bot_login)
            .unwrap_or(false)
    }

    /// Push each fixed file to the PR's head branch (fork-aware). Individual
    /// failures are collected; remaining files are still attempted so the
    /// report shows whatever did land.
    async fn apply_fixes(&self, number: u64, fixed_files: &[FixedFile]) -> Vec<AppliedFix> {
        let branch = match self.github.pull_request_branch(number).await {
            Ok(branch) => branch,
            Err(e) => {
                warn!(pr = number, error = %e, "could not resolve head branch; reporting fixes as copyable");
                return fixed_files
                    .iter()
                    .map(|f| AppliedFix {
                        filename: f.filename.clone(),
                        deleted: f.is_delete(),
                        commit_url: None,
                        error: Some(e.to_string()),
                        content: f.content.clone(),
                    })
                    .collect();
            }
        };

        let mut applied = Vec::with_capacity(fixed_files.len());
        for fix in fixed_files {
            let result = if fix.is_delete() {
                self.github
                    .delete_file(
                        &branch.owner,
                        &branch.repo,
                        &fix.filename,
                        &branch.branch,
                        &format!("Remove {} (PunkModBot)", fix.filename),
                    )
                    .await
                    .map(|_| None)
            } else {
                self.github
                    .create_or_update_file(
                        &branch.owner,
                        &branch.repo,
                        &fix.filename,
                        fix.content.as_deref().unwrap_or_default().as_bytes(),
                        &branch.branch,
                        &format!("Fix {} (PunkModBot)", fix.filename),
                    )
                    .await
                    .map(|commit| commit.html_url)
            };

            match result {
                Ok(commit_url) => applied.push(AppliedFix {
                    filename: fix.filename.clone(),
                    deleted: fix.is_delete(),
                    commit_url,
                    error: None,
                    content: None,
                }),
                Err(e) => {
                    warn!(pr = number, file = %fix.filename, error = %e, "failed to push fix");
                    applied.push(AppliedFix {
                        filename: fix.filename.clone(),
                        deleted: fix.is_delete(),
                        commit_url: None,
                        error: Some(e.to_string()),
                        content: fix.content.clone(),
                    });
                }
            }
        }
        applied
    }
}

fn status_badge(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::ReadyForReview => {
            "✅ **READY FOR HUMAN REVIEW** - A moderator can now review and merge"
        }
        ReviewStatus::NeedsChanges => "🔄 **NEEDS CHANGES** - Please update your submission",
        ReviewStatus::Suspicious => {
            "🚨 **FLAGGED** - This submission needs careful human verification"
        }
        ReviewStatus::NeedsInfo => "❓ **WAITING FOR INFO** - Please answer the questions below",
    }
}

/// Recover the status enum from a formatted comment's badge line
pub fn parse_status_badge(comment: &str) -> Option<ReviewStatus> {
    if comment.contains("**READY FOR HUMAN REVIEW**") {
        Some(ReviewStatus::ReadyForReview)
    } else if comment.contains("**NEEDS CHANGES**") {
        Some(ReviewStatus::NeedsChanges)
    } else if comment.contains("**FLAGGED**") {
        Some(ReviewStatus::Suspicious)
    } else if comment.contains("**WAITING FOR INFO**") {
        Some(ReviewStatus::NeedsInfo)
    } else {
        None
    }
}

/// Render the verdict plus fix outcomes as one human-readable comment
pub fn format_review_comment(verdict: &ReviewVerdict, fixes: &[AppliedFix]) -> String {
    let mut lines = vec![
        verdict.summary.clone(),
        String::new(),
        status_badge(verdict.status).to_string(),
        String::new(),
    ];

    if verdict.status == ReviewStatus::Suspicious && !verdict.suspicious_reasons.is_empty() {
        lines.push("### 🚨 Flags".to_string());
        lines.extend(verdict.suspicious_reasons.iter().map(|r| format!("- {r}")));
        lines.push(String::new());
    }
    if !verdict.validation_errors.is_empty() {
        lines.push("### ❌ Issues".to_string());
        lines.extend(verdict.validation_errors.iter().map(|e| format!("- {e}")));
        lines.push(String::new());
    }
    if !verdict.suggestions.is_empty() {
        lines.push("### 💡 Suggestions".to_string());
        lines.extend(verdict.suggestions.iter().map(|s| format!("- {s}")));
        lines.push(String::new());
    }
    if !verdict.needs_clarification.is_empty() {
        lines.push("### ❓ Questions".to_string());
        lines.extend(verdict.needs_clarification.iter().map(|q| format!("- {q}")));
        lines.push(String::new());
    }

    if !fixes.is_empty() {
        lines.push("### 🔧 Fixes".to_string());
        for fix in fixes {
            match (fix.succeeded(), fix.deleted) {
                (true, true) => lines.push(format!("- `{}` - removed from your branch", fix.filename)),
                (true, false) => match &fix.commit_url {
                    Some(url) => lines.push(format!(
                        "- `{}` - pushed to your branch ([commit]({url}))",
                        fix.filename
                    )),
                    None => lines.push(format!("- `{}` - pushed to your branch", fix.filename)),
                },
                (false, _) => {
                    lines.push(format!(
                        "- `{}` - couldn't push this one ({}). Copy it over manually:",
                        fix.filename,
                        fix.error.as_deref().unwrap_or("unknown error")
                    ));
                    if let Some(content) = &fix.content {
                        lines.push(String::new());
                        lines.push(format!(
                            "<details><summary><code>{}</code></summary>\n\n```markdown\n{content}\n```\n</details>",
                            fix.filename
                        ));
                    }
                    lines.push(String::new());
                }
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
