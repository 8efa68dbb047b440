//! Discussion types
//!
//! GitHub Discussions allow exactly two comment levels: a top-level comment
//! and direct replies to it. Every comment therefore tracks whether it is
//! top-level or carries a parent, because a reply can never target a reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One comment in a discussion, flattened out of the two-level tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionComment {
    /// GraphQL node id
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Node id of the top-level comment this replies to; `None` if top-level
    pub parent_id: Option<String>,
}

impl DiscussionComment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The only valid reply target involving this comment
    pub fn top_level_ancestor_id(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.id)
    }
}

/// Full discussion state as re-derived from GitHub on every invocation
#[derive(Debug, Clone)]
pub struct DiscussionContext {
    /// GraphQL node id, needed for comment mutations
    pub id: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub category: String,
    /// All comments in thread order, replies carrying their `parent_id`
    pub comments: Vec<DiscussionComment>,
}

impl DiscussionContext {
    /// The chronologically newest comment. Thread order nests replies under
    /// their top-level parent, so the last element of `comments` can be an
    /// older comment than a late reply to an earlier thread.
    pub fn latest_comment(&self) -> Option<&DiscussionComment> {
        self.comments.iter().max_by_key(|c| c.created_at)
    }
}

/// Structured judgment for a discussion interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionVerdict {
    pub summary: String,
    pub should_reply: bool,
    #[serde(default)]
    pub reply: Option<String>,
    /// Spelled `createPR` in the response schema, not camel case
    #[serde(default, rename = "createPR")]
    pub create_pr: Option<CreatePrPlan>,
}

/// Optional instruction to author or update a PR from the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrPlan {
    pub title: String,
    #[serde(default)]
    pub files: Vec<VerdictFile>,
    /// Explicit thumbnail source chosen by the judgment, if any
    #[serde(default)]
    pub image_url: Option<String>,
    /// Slug of the project being added/updated, used for the thumbnail path
    #[serde(default)]
    pub project_slug: Option<String>,
}

/// A file the judgment wants committed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictFile {
    pub filename: String,
    pub content: String,
}
