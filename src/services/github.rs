//! GitHub gateway
//!
//! Typed REST helpers against the directory repository, authenticated with
//! the installation token. Discussion queries/mutations go through the
//! GraphQL transport in `discussions.rs`.
//!
//! Every write that accepts a branch name refuses `main`/`master` before
//! any network call is made.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::discussion::DiscussionContext;
use crate::models::review::{
    BranchInfo, IssueComment, PrFile, PullRequestDetails, PullRequestSummary,
};
use crate::services::discussions;
use crate::services::token::{TokenError, TokenManager};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Branches the system must never write to
const PROTECTED_BRANCHES: [&str; 2] = ["main", "master"];

/// Errors raised by gateway operations
#[derive(Debug, Error)]
pub enum GitHubApiError {
    #[error("GitHub API error in {operation}: {status_code} {body}")]
    Api {
        operation: String,
        status_code: u16,
        body: String,
    },

    #[error("Refusing to write to protected branch: {0}")]
    ProtectedBranch(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Reject writes against the default/protected branches before any request
/// is built.
pub fn ensure_unprotected(branch: &str) -> Result<(), GitHubApiError> {
    if PROTECTED_BRANCHES.contains(&branch) {
        return Err(GitHubApiError::ProtectedBranch(branch.to_string()));
    }
    Ok(())
}

/// Result of a contents-API commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub sha: String,
    pub html_url: Option<String>,
}

/// Newly opened pull request
#[derive(Debug, Clone)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: String,
}

/// The gateway seam the engines work against; faked in tests
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, GitHubApiError>;
    async fn pull_request_details(&self, number: u64)
        -> Result<PullRequestDetails, GitHubApiError>;
    async fn pull_request_files(&self, number: u64) -> Result<Vec<PrFile>, GitHubApiError>;
    async fn pull_request_comments(&self, number: u64)
        -> Result<Vec<IssueComment>, GitHubApiError>;
    async fn pull_request_branch(&self, number: u64) -> Result<BranchInfo, GitHubApiError>;
    async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubApiError>;
    async fn create_or_update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        message: &str,
    ) -> Result<CommitInfo, GitHubApiError>;
    async fn delete_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
        message: &str,
    ) -> Result<(), GitHubApiError>;
    async fn post_issue_comment(&self, number: u64, body: &str) -> Result<(), GitHubApiError>;
    async fn create_branch(&self, name: &str) -> Result<(), GitHubApiError>;
    async fn create_pull_request(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPullRequest, GitHubApiError>;
    async fn discussion(&self, number: u64) -> Result<DiscussionContext, GitHubApiError>;
    async fn post_discussion_comment(
        &self,
        discussion_id: &str,
        body: &str,
        reply_to_id: Option<&str>,
    ) -> Result<(), GitHubApiError>;
}

/// Concrete gateway over the GitHub REST and GraphQL APIs
pub struct GitHubClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    owner: String,
    repo: String,
    default_branch: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>, config: &Config) -> Self {
        Self {
            http,
            tokens,
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
            default_branch: config.default_branch.clone(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{GITHUB_API_BASE}/repos/{}/{}{path}", self.owner, self.repo)
    }

    pub(crate) async fn token(&self) -> Result<String, GitHubApiError> {
        Ok(self.tokens.get().await?)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GitHubApiError> {
        let token = self.token().await?;
        let res = request
            .bearer_auth(token)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "punkmod")
            .send()
            .await
            .map_err(|e| GitHubApiError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(GitHubApiError::Api {
                operation: operation.to_string(),
                status_code: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        url: &str,
    ) -> Result<T, GitHubApiError> {
        let res = self.send(operation, self.http.get(url)).await?;
        res.json()
            .await
            .map_err(|e| GitHubApiError::Transport(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RawPrFile {
    filename: String,
    status: String,
    raw_url: String,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsCommitResponse {
    commit: ContentsCommit,
}

#[derive(Debug, Deserialize)]
struct ContentsCommit {
    sha: String,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchDetails {
    head: HeadRef,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
    repo: HeadRepo,
}

#[derive(Debug, Deserialize)]
struct HeadRepo {
    name: String,
    owner: crate::models::review::GitHubUser,
}

#[derive(Debug, Deserialize)]
struct CreatedPrResponse {
    number: u64,
    html_url: String,
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, GitHubApiError> {
        self.get_json("list_open_pull_requests", &self.repo_url("/pulls?state=open"))
            .await
    }

    async fn pull_request_details(
        &self,
        number: u64,
    ) -> Result<PullRequestDetails, GitHubApiError> {
        self.get_json("pull_request_details", &self.repo_url(&format!("/pulls/{number}")))
            .await
    }

    /// Changed files filtered to tracked content paths; contents fetched via
    /// each file's raw content URL with the installation token.
    async fn pull_request_files(&self, number: u64) -> Result<Vec<PrFile>, GitHubApiError> {
        let raw: Vec<RawPrFile> = self
            .get_json("pull_request_files", &self.repo_url(&format!("/pulls/{number}/files")))
            .await?;

        let mut files = Vec::new();
        for file in raw {
            if !crate::models::content::is_tracked_content_path(&file.filename)
                || file.status == "removed"
            {
                continue;
            }

            let res = self
                .send(
                    "pull_request_file_contents",
                    self.http.get(&file.raw_url),
                )
                .await?;
            let contents = res
                .text()
                .await
                .map_err(|e| GitHubApiError::Transport(e.to_string()))?;

            files.push(PrFile {
                filename: file.filename,
                status: file.status,
                contents,
            });
        }

        debug!(pr = number, files = files.len(), "fetched tracked content files");
        Ok(files)
    }

    async fn pull_request_comments(
        &self,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubApiError> {
        self.get_json(
            "pull_request_comments",
            &self.repo_url(&format!("/issues/{number}/comments")),
        )
        .await
    }

    /// Resolve the PR's head branch; the repo may be a contributor's fork.
    async fn pull_request_branch(&self, number: u64) -> Result<BranchInfo, GitHubApiError> {
        let details: BranchDetails = self
            .get_json("pull_request_branch", &self.repo_url(&format!("/pulls/{number}")))
            .await?;

        Ok(BranchInfo {
            owner: details.head.repo.owner.login,
            repo: details.head.repo.name,
            branch: details.head.branch,
            sha: details.head.sha,
        })
    }

    /// Existence probe; a 404 is `None`, not an error.
    async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubApiError> {
        let url = format!(
            "{GITHUB_API_BASE}/repos/{owner}/{repo}/contents/{path}?ref={branch}"
        );
        match self.get_json::<ContentsEntry>("file_sha", &url).await {
            Ok(entry) => Ok(Some(entry.sha)),
            Err(GitHubApiError::Api {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Upsert keyed on the presence/absence of the file's current sha.
    async fn create_or_update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        message: &str,
    ) -> Result<CommitInfo, GitHubApiError> {
        ensure_unprotected(branch)?;

        let sha = self.file_sha(owner, repo, path, branch).await?;
        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }

        let url = format!("{GITHUB_API_BASE}/repos/{owner}/{repo}/contents/{path}");
        let res = self
            .send("create_or_update_file", self.http.put(&url).json(&payload))
            .await?;
        let parsed: ContentsCommitResponse = res
            .json()
            .await
            .map_err(|e| GitHubApiError::Transport(e.to_string()))?;

        info!(path, branch, commit = %parsed.commit.sha, "committed file");
        Ok(CommitInfo {
            sha: parsed.commit.sha,
            html_url: parsed.commit.html_url,
        })
    }

    /// Deleting a file that does not exist is a success, not an error.
    async fn delete_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
        message: &str,
    ) -> Result<(), GitHubApiError> {
        ensure_unprotected(branch)?;

        let Some(sha) = self.file_sha(owner, repo, path, branch).await? else {
            debug!(path, branch, "delete requested for absent file; nothing to do");
            return Ok(());
        };

        let url = format!("{GITHUB_API_BASE}/repos/{owner}/{repo}/contents/{path}");
        let payload = json!({
            "message": message,
            "sha": sha,
            "branch": branch,
        });
        self.send("delete_file", self.http.delete(&url).json(&payload))
            .await?;

        info!(path, branch, "deleted file");
        Ok(())
    }

    async fn post_issue_comment(&self, number: u64, body: &str) -> Result<(), GitHubApiError> {
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        self.send(
            "post_issue_comment",
            self.http.post(&url).json(&json!({ "body": body })),
        )
        .await?;
        Ok(())
    }

    /// Create a branch from the default branch tip; an existing branch with
    /// the same name is treated as success.
    async fn create_branch(&self, name: &str) -> Result<(), GitHubApiError> {
        ensure_unprotected(name)?;

        let tip: RefResponse = self
            .get_json(
                "default_branch_tip",
                &self.repo_url(&format!("/git/ref/heads/{}", self.default_branch)),
            )
            .await?;

        let payload = json!({
            "ref": format!("refs/heads/{name}"),
            "sha": tip.object.sha,
        });
        match self
            .send("create_branch", self.http.post(&self.repo_url("/git/refs")).json(&payload))
            .await
        {
            Ok(_) => Ok(()),
            Err(GitHubApiError::Api {
                status_code: 422, ..
            }) => {
                warn!(branch = name, "branch already exists; reusing it");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_pull_request(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPullRequest, GitHubApiError> {
        ensure_unprotected(branch)?;

        let payload = json!({
            "title": title,
            "body": body,
            "head": branch,
            "base": self.default_branch,
        });
        let res = self
            .send("create_pull_request", self.http.post(&self.repo_url("/pulls")).json(&payload))
            .await?;
        let parsed: CreatedPrResponse = res
            .json()
            .await
            .map_err(|e| GitHubApiError::Transport(e.to_string()))?;

        info!(pr = parsed.number, branch, "opened pull request");
        Ok(CreatedPullRequest {
            number: parsed.number,
            url: parsed.html_url,
        })
    }

    async fn discussion(&self, number: u64) -> Result<DiscussionContext, GitHubApiError> {
        discussions::fetch_discussion(self, &self.owner, &self.repo, number).await
    }

    async fn post_discussion_comment(
        &self,
        discussion_id: &str,
        body: &str,
        reply_to_id: Option<&str>,
    ) -> Result<(), GitHubApiError> {
        discussions::add_discussion_comment(self, discussion_id, body, reply_to_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn client() -> GitHubClient {
        let config = test_config();
        let tokens = Arc::new(TokenManager::new(reqwest::Client::new(), &config));
        GitHubClient::new(reqwest::Client::new(), tokens, &config)
    }

    #[tokio::test]
    async fn gateway_writes_to_protected_branches_fail_before_any_request() {
        // The unsignable test key makes any token mint fail as InvalidKey,
        // so getting ProtectedBranch means no request was even attempted.
        let client = client();

        let err = client
            .create_or_update_file(
                "madebypunks",
                "directory",
                "content/projects/x.md",
                b"data",
                "main",
                "add x",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubApiError::ProtectedBranch(b) if b == "main"));

        let err = client
            .delete_file("madebypunks", "directory", "content/projects/x.md", "master", "remove x")
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubApiError::ProtectedBranch(_)));

        let err = client.create_branch("main").await.unwrap_err();
        assert!(matches!(err, GitHubApiError::ProtectedBranch(_)));

        let err = client.create_pull_request("master", "t", "b").await.unwrap_err();
        assert!(matches!(err, GitHubApiError::ProtectedBranch(_)));
    }

    #[test]
    fn main_and_master_are_protected() {
        assert!(matches!(
            ensure_unprotected("main"),
            Err(GitHubApiError::ProtectedBranch(b)) if b == "main"
        ));
        assert!(matches!(
            ensure_unprotected("master"),
            Err(GitHubApiError::ProtectedBranch(_))
        ));
    }

    #[test]
    fn feature_branches_pass_the_guard() {
        assert!(ensure_unprotected("punkmod/discussion-12-1700000000").is_ok());
        assert!(ensure_unprotected("my-fork-branch").is_ok());
    }
}
