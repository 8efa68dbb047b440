//! In-memory fakes for the gateway, LLM, and content-fetch seams.
//! Test-only; every write is recorded so tests can assert on side effects.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::discussion::DiscussionContext;
use crate::models::review::{
    BranchInfo, GitHubUser, IssueComment, PrFile, PullRequestDetails, PullRequestHead,
    PullRequestSummary,
};
use crate::services::content::{ContentApi, ImagePayload, UrlCheckResult, UrlCheckStatus};
use crate::services::github::{
    CommitInfo, CreatedPullRequest, GitHubApi, GitHubApiError, ensure_unprotected,
};
use crate::services::llm::{LlmApi, LlmError};

#[derive(Default)]
struct GitHubState {
    comments: HashMap<u64, Vec<IssueComment>>,
    files: HashMap<u64, Vec<PrFile>>,
    discussion: Option<DiscussionContext>,
    open_prs: Vec<PullRequestSummary>,
    committed: Vec<(String, Vec<u8>, String)>,
    deleted: Vec<String>,
    issue_comments_posted: Vec<(u64, String)>,
    discussion_comments_posted: Vec<(String, String, Option<String>)>,
    created_branches: Vec<String>,
    created_prs: Vec<(String, String, String)>,
    fail_commit_paths: HashSet<String>,
    fail_pr_creation: bool,
    write_calls: usize,
}

#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<GitHubState>,
}

impl FakeGitHub {
    pub fn set_comments(&self, pr: u64, comments: &[(&str, &str)]) {
        let comments = comments
            .iter()
            .map(|(login, body)| IssueComment {
                user: GitHubUser {
                    login: login.to_string(),
                },
                body: body.to_string(),
            })
            .collect();
        self.state.lock().unwrap().comments.insert(pr, comments);
    }

    pub fn set_content_files(&self, pr: u64, files: &[(&str, &str)]) {
        let files = files
            .iter()
            .map(|(name, contents)| PrFile {
                filename: name.to_string(),
                status: "added".to_string(),
                contents: contents.to_string(),
            })
            .collect();
        self.state.lock().unwrap().files.insert(pr, files);
    }

    pub fn set_discussion(&self, ctx: DiscussionContext) {
        self.state.lock().unwrap().discussion = Some(ctx);
    }

    pub fn add_open_pr(&self, number: u64, login: &str, branch: &str, body: &str) {
        self.state.lock().unwrap().open_prs.push(PullRequestSummary {
            number,
            title: format!("PR #{number}"),
            body: Some(body.to_string()),
            html_url: format!("https://github.com/madebypunks/directory/pull/{number}"),
            user: GitHubUser {
                login: login.to_string(),
            },
            head: PullRequestHead {
                branch: branch.to_string(),
            },
        });
    }

    pub fn fail_commits_for(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_commit_paths
            .insert(path.to_string());
    }

    pub fn fail_pr_creation(&self) {
        self.state.lock().unwrap().fail_pr_creation = true;
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }

    pub fn posted_comments(&self, pr: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .issue_comments_posted
            .iter()
            .filter(|(n, _)| *n == pr)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn committed_files(&self) -> Vec<(String, Vec<u8>, String)> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn discussion_comments(&self) -> Vec<(String, String, Option<String>)> {
        self.state.lock().unwrap().discussion_comments_posted.clone()
    }

    pub fn created_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().created_branches.clone()
    }

    pub fn created_prs(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().created_prs.clone()
    }
}

fn api_error(operation: &str, status_code: u16, body: &str) -> GitHubApiError {
    GitHubApiError::Api {
        operation: operation.to_string(),
        status_code,
        body: body.to_string(),
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, GitHubApiError> {
        Ok(self.state.lock().unwrap().open_prs.clone())
    }

    async fn pull_request_details(
        &self,
        number: u64,
    ) -> Result<PullRequestDetails, GitHubApiError> {
        Ok(PullRequestDetails {
            number,
            title: "Add my project".to_string(),
            body: None,
            user: GitHubUser {
                login: "alice".to_string(),
            },
        })
    }

    async fn pull_request_files(&self, number: u64) -> Result<Vec<PrFile>, GitHubApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn pull_request_comments(
        &self,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn pull_request_branch(&self, _number: u64) -> Result<BranchInfo, GitHubApiError> {
        Ok(BranchInfo {
            owner: "alice".to_string(),
            repo: "directory".to_string(),
            branch: "add-my-project".to_string(),
            sha: "abc123".to_string(),
        })
    }

    async fn file_sha(
        &self,
        _owner: &str,
        _repo: &str,
        _path: &str,
        _branch: &str,
    ) -> Result<Option<String>, GitHubApiError> {
        Ok(None)
    }

    async fn create_or_update_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        _message: &str,
    ) -> Result<CommitInfo, GitHubApiError> {
        ensure_unprotected(branch)?;
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        if state.fail_commit_paths.contains(path) {
            return Err(api_error("create_or_update_file", 500, "injected failure"));
        }
        state
            .committed
            .push((path.to_string(), content.to_vec(), branch.to_string()));
        Ok(CommitInfo {
            sha: format!("sha-{}", state.committed.len()),
            html_url: Some(format!(
                "https://github.com/madebypunks/directory/commit/sha-{}",
                state.committed.len()
            )),
        })
    }

    async fn delete_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        branch: &str,
        _message: &str,
    ) -> Result<(), GitHubApiError> {
        ensure_unprotected(branch)?;
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.deleted.push(path.to_string());
        Ok(())
    }

    async fn post_issue_comment(&self, number: u64, body: &str) -> Result<(), GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.issue_comments_posted.push((number, body.to_string()));
        Ok(())
    }

    async fn create_branch(&self, name: &str) -> Result<(), GitHubApiError> {
        ensure_unprotected(name)?;
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.created_branches.push(name.to_string());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPullRequest, GitHubApiError> {
        ensure_unprotected(branch)?;
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        if state.fail_pr_creation {
            return Err(api_error("create_pull_request", 422, "injected failure"));
        }
        state
            .created_prs
            .push((branch.to_string(), title.to_string(), body.to_string()));
        Ok(CreatedPullRequest {
            number: 99,
            url: "https://github.com/madebypunks/directory/pull/99".to_string(),
        })
    }

    async fn discussion(&self, number: u64) -> Result<DiscussionContext, GitHubApiError> {
        self.state
            .lock()
            .unwrap()
            .discussion
            .clone()
            .ok_or_else(|| api_error("get_discussion", 404, &format!("discussion {number} not found")))
    }

    async fn post_discussion_comment(
        &self,
        discussion_id: &str,
        body: &str,
        reply_to_id: Option<&str>,
    ) -> Result<(), GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        state.discussion_comments_posted.push((
            discussion_id.to_string(),
            body.to_string(),
            reply_to_id.map(str::to_string),
        ));
        Ok(())
    }
}

/// Fake LLM returning a canned completion, recording calls and prompts
pub struct FakeLlm {
    completion: String,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeLlm {
    pub fn new(completion: &str) -> Self {
        Self {
            completion: completion.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LlmApi for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.completion.clone())
    }
}

/// Fake content fetcher with canned summaries and downloadable images
#[derive(Default)]
pub struct FakeContent {
    summaries: HashMap<String, UrlCheckResult>,
    images: HashMap<String, (Vec<u8>, &'static str)>,
    og_images: HashMap<String, String>,
}

impl FakeContent {
    pub fn with_summary(mut self, url: &str, title: &str) -> Self {
        self.summaries.insert(
            url.to_string(),
            UrlCheckResult {
                url: url.to_string(),
                status: UrlCheckStatus::Ok,
                title: Some(title.to_string()),
                description: None,
                content: None,
                error: None,
            },
        );
        self
    }

    pub fn with_image(mut self, url: &str, bytes: Vec<u8>, extension: &'static str) -> Self {
        self.images.insert(url.to_string(), (bytes, extension));
        self
    }

    pub fn with_og_image(mut self, page_url: &str, image_url: &str) -> Self {
        self.og_images
            .insert(page_url.to_string(), image_url.to_string());
        self
    }
}

#[async_trait]
impl ContentApi for FakeContent {
    async fn url_summary(&self, url: &str) -> UrlCheckResult {
        self.summaries.get(url).cloned().unwrap_or(UrlCheckResult {
            url: url.to_string(),
            status: UrlCheckStatus::Error,
            title: None,
            description: None,
            content: None,
            error: Some("unreachable".to_string()),
        })
    }

    async fn og_image(&self, url: &str) -> Option<String> {
        self.og_images.get(url).cloned()
    }

    async fn download_image(&self, url: &str) -> Option<ImagePayload> {
        let (bytes, extension) = self.images.get(url)?;
        Some(ImagePayload {
            bytes: bytes.clone(),
            mime_type: format!("image/{extension}"),
            extension: *extension,
        })
    }
}
