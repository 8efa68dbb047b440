//! Batch scan handler
//!
//! On-demand sweep of every open PR, for catching up after downtime or
//! missed deliveries. PRs are reviewed sequentially with a short pause
//! between them to stay inside API rate limits.

use actix_web::{HttpResponse, web};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::AppState;
use crate::error::AppError;
use crate::handlers::webhook::review_service;

const SCAN_PAUSE: Duration = Duration::from_secs(1);

/// GET /api/mod
///
/// Review all open PRs in sequence. Individual failures are reported in
/// the response rather than aborting the sweep.
pub async fn scan_open_prs(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let open = state.github.list_open_pull_requests().await.map_err(AppError::from)?;
    let total = open.len();
    info!(total, "scanning open pull requests");

    let review = review_service(&state);
    let mut reviewed: Vec<u64> = Vec::new();
    let mut skipped: Vec<serde_json::Value> = Vec::new();

    for (i, pr) in open.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(SCAN_PAUSE).await;
        }
        match review.review_pr(pr.number, false).await {
            Ok(outcome) if outcome.reviewed => reviewed.push(pr.number),
            Ok(outcome) => skipped.push(json!({
                "pr": pr.number,
                "reason": outcome.reason.map(|r| r.as_str()),
            })),
            Err(e) => {
                warn!(pr = pr.number, error = %e, "scan review failed");
                skipped.push(json!({
                    "pr": pr.number,
                    "reason": "error",
                    "error": e.to_string(),
                }));
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "reviewed": reviewed,
        "skipped": skipped,
        "total": total,
    })))
}
