//! Inbound webhook payloads
//!
//! The delivery's `x-github-event` header selects which payload shape to
//! decode, so the router never has to guess from the JSON structure.

use serde::Deserialize;

use crate::error::AppError;

/// A decoded webhook delivery
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PullRequest(PullRequestEvent),
    IssueComment(IssueCommentEvent),
    Discussion(DiscussionEvent),
    DiscussionComment(DiscussionCommentEvent),
    /// Acknowledged but never acted on
    Unsupported(String),
}

impl WebhookEvent {
    /// Decode the raw body according to the event-type header
    pub fn decode(event_type: &str, raw_body: &[u8]) -> Result<Self, AppError> {
        let decoded = match event_type {
            "pull_request" => Self::PullRequest(parse(raw_body)?),
            "issue_comment" => Self::IssueComment(parse(raw_body)?),
            "discussion" => Self::Discussion(parse(raw_body)?),
            "discussion_comment" => Self::DiscussionComment(parse(raw_body)?),
            other => Self::Unsupported(other.to_string()),
        };
        Ok(decoded)
    }
}

fn parse<'a, T: Deserialize<'a>>(raw: &'a [u8]) -> Result<T, AppError> {
    serde_json::from_slice(raw).map_err(|e| AppError::BadRequest(format!("invalid payload: {e}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: EventPullRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: EventIssue,
    pub comment: EventComment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventIssue {
    pub number: u64,
    /// Present only when the issue is a pull request
    pub pull_request: Option<serde_json::Value>,
}

impl EventIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventComment {
    pub body: String,
    pub user: EventUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionEvent {
    pub action: String,
    pub discussion: EventDiscussion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventDiscussion {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionCommentEvent {
    pub action: String,
    pub discussion: EventDiscussion,
    pub comment: EventComment,
}
