//! Webhook handler
//!
//! Single entry point for GitHub webhook deliveries. Every delivery is
//! authenticated with the shared HMAC secret before any payload byte is
//! trusted, then routed by the `x-github-event` header.

use actix_web::{HttpRequest, HttpResponse, web};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::info;

use crate::AppState;
use crate::error::AppError;
use crate::models::event::{
    DiscussionCommentEvent, DiscussionEvent, IssueCommentEvent, PullRequestEvent, WebhookEvent,
};
use crate::models::review::ReviewOutcome;
use crate::services::discussion::{DiscussionOutcome, DiscussionService};
use crate::services::review::ReviewService;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";

/// PR actions that trigger a review cycle
const REVIEWABLE_PR_ACTIONS: &[&str] = &["opened", "synchronize"];

/// POST /api/mod/webhook
///
/// Verify, decode, and dispatch one webhook delivery. Unsupported events
/// and actions are acknowledged with 200 so GitHub does not retry them.
pub async fn handle_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    verify_signature(
        state.config.webhook_secret.as_deref(),
        header(&req, SIGNATURE_HEADER),
        &body,
    )?;

    let event_type = header(&req, EVENT_HEADER)
        .ok_or_else(|| AppError::BadRequest(format!("missing {EVENT_HEADER} header")))?;

    let response = match WebhookEvent::decode(event_type, &body)? {
        WebhookEvent::PullRequest(ev) => pull_request(&state, ev).await?,
        WebhookEvent::IssueComment(ev) => issue_comment(&state, ev).await?,
        WebhookEvent::Discussion(ev) => discussion(&state, ev).await?,
        WebhookEvent::DiscussionComment(ev) => discussion_comment(&state, ev).await?,
        WebhookEvent::Unsupported(name) => {
            json!({"event": name, "skipped": true, "reason": "unsupported_event"})
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Constant-time verification of the delivery signature. Deliveries are
/// rejected outright when no secret is configured rather than let an
/// unauthenticated payload drive repo writes.
fn verify_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), AppError> {
    let secret = secret
        .ok_or_else(|| AppError::Unauthorized("webhook secret is not configured".to_string()))?;
    let signature = signature
        .ok_or_else(|| AppError::Unauthorized(format!("missing {SIGNATURE_HEADER} header")))?;
    let digest = signature
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::Unauthorized("malformed signature header".to_string()))?;
    let digest = hex::decode(digest)
        .map_err(|_| AppError::Unauthorized("malformed signature header".to_string()))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("invalid webhook secret".to_string()))?;
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| AppError::Unauthorized("signature mismatch".to_string()))
}

async fn pull_request(
    state: &AppState,
    ev: PullRequestEvent,
) -> Result<serde_json::Value, AppError> {
    if !REVIEWABLE_PR_ACTIONS.contains(&ev.action.as_str()) {
        return Ok(json!({
            "event": "pull_request",
            "action": ev.action,
            "pr": ev.pull_request.number,
            "skipped": true,
            "reason": "unsupported_action",
        }));
    }

    info!(
        pr = ev.pull_request.number,
        action = %ev.action,
        "pull request delivery"
    );
    let outcome = review_service(state)
        .review_pr(ev.pull_request.number, false)
        .await?;
    Ok(review_response("pull_request", &ev.action, ev.pull_request.number, &outcome))
}

/// A comment on a PR re-triggers review only when the commenter addressed
/// the bot, or the bot is already part of the conversation. The gate in
/// the review engine is bypassed because a human just spoke.
async fn issue_comment(
    state: &AppState,
    ev: IssueCommentEvent,
) -> Result<serde_json::Value, AppError> {
    let number = ev.issue.number;
    let skip = |reason: &str| {
        json!({
            "event": "issue_comment",
            "action": ev.action,
            "pr": number,
            "skipped": true,
            "reason": reason,
        })
    };

    if ev.action != "created" || !ev.issue.is_pull_request() {
        return Ok(skip("not_a_pr_comment"));
    }

    let bot_login = state.config.bot_login();
    if ev.comment.user.login == bot_login {
        return Ok(skip("own_comment"));
    }

    let slug = state.config.github_app_slug.to_lowercase();
    let mentioned = ev.comment.body.to_lowercase().contains(&slug);
    let engaged = mentioned || {
        let comments = state.github.pull_request_comments(number).await?;
        comments.iter().any(|c| c.user.login == bot_login)
    };
    if !engaged {
        return Ok(skip("not_addressed"));
    }

    info!(pr = number, mentioned, "comment re-triggered review");
    let outcome = review_service(state).review_pr(number, true).await?;
    Ok(review_response("issue_comment", &ev.action, number, &outcome))
}

async fn discussion(state: &AppState, ev: DiscussionEvent) -> Result<serde_json::Value, AppError> {
    if ev.action != "created" {
        return Ok(json!({
            "event": "discussion",
            "action": ev.action,
            "discussion": ev.discussion.number,
            "skipped": true,
            "reason": "unsupported_action",
        }));
    }

    info!(discussion = ev.discussion.number, title = %ev.discussion.title, "new discussion");
    let outcome = discussion_service(state)
        .handle_discussion(ev.discussion.number)
        .await?;
    Ok(discussion_response("discussion", &ev.action, ev.discussion.number, &outcome))
}

async fn discussion_comment(
    state: &AppState,
    ev: DiscussionCommentEvent,
) -> Result<serde_json::Value, AppError> {
    let number = ev.discussion.number;
    if ev.action != "created" {
        return Ok(json!({
            "event": "discussion_comment",
            "action": ev.action,
            "discussion": number,
            "skipped": true,
            "reason": "unsupported_action",
        }));
    }
    // The delivery for the bot's own reply comes right back here.
    if ev.comment.user.login == state.config.bot_login() {
        return Ok(json!({
            "event": "discussion_comment",
            "action": ev.action,
            "discussion": number,
            "skipped": true,
            "reason": "own_comment",
        }));
    }

    let outcome = discussion_service(state).handle_discussion(number).await?;
    Ok(discussion_response("discussion_comment", &ev.action, number, &outcome))
}

fn review_response(
    event: &str,
    action: &str,
    pr: u64,
    outcome: &ReviewOutcome,
) -> serde_json::Value {
    let mut body = json!({
        "event": event,
        "action": action,
        "pr": pr,
        "reviewed": outcome.reviewed,
    });
    if let (Some(map), Some(reason)) = (body.as_object_mut(), outcome.reason) {
        map.insert("skipped".to_string(), true.into());
        map.insert("reason".to_string(), reason.as_str().into());
    }
    body
}

fn discussion_response(
    event: &str,
    action: &str,
    number: u64,
    outcome: &DiscussionOutcome,
) -> serde_json::Value {
    let mut body = json!({
        "event": event,
        "action": action,
        "discussion": number,
        "replied": outcome.replied,
    });
    if let Some(map) = body.as_object_mut() {
        if let Some(pr) = outcome.pr {
            map.insert("pr".to_string(), pr.into());
        }
        if let Some(reason) = outcome.reason {
            map.insert("skipped".to_string(), true.into());
            map.insert("reason".to_string(), reason.as_str().into());
        }
    }
    body
}

pub(crate) fn review_service(state: &AppState) -> ReviewService {
    ReviewService::new(
        state.github.clone(),
        state.llm.clone(),
        state.content.clone(),
        state.config.bot_login(),
    )
}

pub(crate) fn discussion_service(state: &AppState) -> DiscussionService {
    DiscussionService::new(
        state.github.clone(),
        state.llm.clone(),
        state.content.clone(),
        state.config.bot_login(),
        state.config.github_app_slug.clone(),
        state.config.repo_owner.clone(),
        state.config.repo_name.clone(),
    )
}
