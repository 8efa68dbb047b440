//! PunkModBot - moderation service for the Made by Punks directory
//!
//! Receives GitHub webhooks, reviews directory submissions with an LLM,
//! pushes fixes back to contributor branches, and converses in GitHub
//! Discussions, opening PRs on contributors' behalf when a thread asks
//! for a directory addition.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;

// Re-export specific items to avoid ambiguous glob re-exports
pub use models::{
    DiscussionContext, DiscussionVerdict, ReviewOutcome, ReviewStatus, ReviewVerdict, SkipReason,
    WebhookEvent,
};

pub use services::{
    AnthropicClient, ContentApi, ContentFetcher, DiscussionService, GitHubApi, GitHubClient,
    LlmApi, ReviewService, TokenManager,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub github: Arc<dyn GitHubApi>,
    pub llm: Arc<dyn LlmApi>,
    pub content: Arc<dyn ContentApi>,
}
