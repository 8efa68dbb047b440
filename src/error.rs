use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// Application-level error type
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid credentials; raised before any network call
    Config(crate::config::ConfigError),
    /// Non-2xx response from the GitHub API
    GitHubApi {
        operation: String,
        status_code: u16,
        body: String,
    },
    /// The LLM completion contained no parseable verdict JSON
    MalformedLlmResponse(String),
    /// An attempted write targeted a protected branch
    ProtectedBranch(String),
    /// Webhook signature missing, invalid, or no secret configured
    Unauthorized(String),
    /// Malformed request payload
    BadRequest(String),
    /// Internal server error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
    meta: ErrorMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorMeta {
    request_id: String,
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::GitHubApi { .. } => "GITHUB_API_ERROR",
            Self::MalformedLlmResponse(_) => "MALFORMED_LLM_RESPONSE",
            Self::ProtectedBranch(_) => "PROTECTED_BRANCH",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::GitHubApi {
                operation,
                status_code,
                body,
            } => write!(f, "GitHub API error in {operation}: {status_code} {body}"),
            Self::MalformedLlmResponse(msg) => write!(f, "Malformed LLM response: {msg}"),
            Self::ProtectedBranch(branch) => {
                write!(f, "Refusing to write to protected branch: {branch}")
            }
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: ErrorBody {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
            meta: ErrorMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        };

        match self {
            Self::Config(_)
            | Self::GitHubApi { .. }
            | Self::MalformedLlmResponse(_)
            | Self::ProtectedBranch(_)
            | Self::Internal(_) => HttpResponse::InternalServerError().json(error_response),
            Self::Unauthorized(_) => HttpResponse::Unauthorized().json(error_response),
            Self::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<crate::services::github::GitHubApiError> for AppError {
    fn from(err: crate::services::github::GitHubApiError) -> Self {
        use crate::services::github::GitHubApiError;
        match err {
            GitHubApiError::Api {
                operation,
                status_code,
                body,
            } => Self::GitHubApi {
                operation,
                status_code,
                body,
            },
            GitHubApiError::ProtectedBranch(branch) => Self::ProtectedBranch(branch),
            GitHubApiError::Token(e) => Self::Internal(e.to_string()),
            GitHubApiError::Transport(msg) => Self::Internal(msg),
        }
    }
}

impl From<crate::services::review::ReviewError> for AppError {
    fn from(err: crate::services::review::ReviewError) -> Self {
        use crate::services::review::ReviewError;
        match err {
            ReviewError::GitHub(e) => e.into(),
            ReviewError::Llm(e) => e.into(),
        }
    }
}

impl From<crate::services::discussion::DiscussionError> for AppError {
    fn from(err: crate::services::discussion::DiscussionError) -> Self {
        use crate::services::discussion::DiscussionError;
        match err {
            DiscussionError::GitHub(e) => e.into(),
            DiscussionError::Llm(e) => e.into(),
        }
    }
}

impl From<crate::services::llm::LlmError> for AppError {
    fn from(err: crate::services::llm::LlmError) -> Self {
        use crate::services::llm::LlmError;
        match err {
            LlmError::MalformedResponse(msg) => Self::MalformedLlmResponse(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
