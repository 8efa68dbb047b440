//! Discussion engine
//!
//! Handles new discussions and discussion comments: decides whether the bot
//! should speak, asks the LLM for a conversational verdict, and when the
//! thread asks for a directory addition, authors (or updates) a PR on the
//! requester's behalf. Replies always target a top-level comment because
//! GitHub Discussions only support two comment levels.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::content::{
    ProjectFrontmatter, PunkFrontmatter, is_valid_project_slug, patch_thumbnail,
    project_slug_from_path, punk_id_from_path, split_frontmatter,
};
use crate::models::discussion::{CreatePrPlan, DiscussionContext, DiscussionVerdict, VerdictFile};
use crate::services::content::{self, ContentApi};
use crate::services::github::{GitHubApi, GitHubApiError};
use crate::services::llm::{self, LlmApi, LlmError};
use crate::services::prompts;

/// Branch prefix that ties a bot PR back to its source discussion
const DISCUSSION_BRANCH_PREFIX: &str = "punkmod/discussion-";

#[derive(Debug, Error)]
pub enum DiscussionError {
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Result of handling one discussion event
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiscussionOutcome {
    pub replied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DiscussionSkipReason>,
}

impl DiscussionOutcome {
    fn skipped(reason: DiscussionSkipReason) -> Self {
        Self {
            replied: false,
            pr: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionSkipReason {
    /// The bot spoke last; wait for a human
    BotRepliedLast,
    /// Not a fresh thread, not mentioned, never participated
    NotEngaged,
    /// The judgment decided no reply was warranted
    DeclinedToReply,
}

impl DiscussionSkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotRepliedLast => "bot_replied_last",
            Self::NotEngaged => "not_engaged",
            Self::DeclinedToReply => "declined_to_reply",
        }
    }
}

struct AuthoredPr {
    number: u64,
    url: String,
}

/// The judgment's file list is untrusted input. Only well-formed tracked
/// content files may reach a commit: project entries need a valid slug and
/// parseable project frontmatter, punk profiles an in-range numeric id and
/// parseable profile frontmatter. Everything else is dropped.
fn file_is_committable(file: &VerdictFile) -> bool {
    let Some((yaml, _)) = split_frontmatter(&file.content) else {
        return false;
    };
    if let Some(slug) = project_slug_from_path(&file.filename) {
        return is_valid_project_slug(slug)
            && serde_yaml::from_str::<ProjectFrontmatter>(yaml).is_ok();
    }
    if punk_id_from_path(&file.filename).is_some() {
        return serde_yaml::from_str::<PunkFrontmatter>(yaml).is_ok();
    }
    false
}

pub struct DiscussionService {
    github: Arc<dyn GitHubApi>,
    llm: Arc<dyn LlmApi>,
    content: Arc<dyn ContentApi>,
    bot_login: String,
    bot_slug: String,
    repo_owner: String,
    repo_name: String,
}

impl DiscussionService {
    pub fn new(
        github: Arc<dyn GitHubApi>,
        llm: Arc<dyn LlmApi>,
        content: Arc<dyn ContentApi>,
        bot_login: String,
        bot_slug: String,
        repo_owner: String,
        repo_name: String,
    ) -> Self {
        Self {
            github,
            llm,
            content,
            bot_login,
            bot_slug,
            repo_owner,
            repo_name,
        }
    }

    pub async fn handle_discussion(
        &self,
        number: u64,
    ) -> Result<DiscussionOutcome, DiscussionError> {
        let ctx = self.github.discussion(number).await?;

        if let Some(latest) = ctx.latest_comment() {
            if latest.author == self.bot_login {
                info!(discussion = number, "bot replied last; staying quiet");
                return Ok(DiscussionOutcome::skipped(DiscussionSkipReason::BotRepliedLast));
            }
        }

        if !self.should_engage(&ctx) {
            info!(discussion = number, "not engaged and not mentioned; staying quiet");
            return Ok(DiscussionOutcome::skipped(DiscussionSkipReason::NotEngaged));
        }

        let prompt = prompts::discussion_prompt(&ctx, &self.bot_login);
        let completion = self.llm.complete(&prompt).await?;
        let verdict: DiscussionVerdict = llm::parse_verdict(&completion)?;

        info!(
            discussion = number,
            should_reply = verdict.should_reply,
            creates_pr = verdict.create_pr.is_some(),
            "discussion verdict received"
        );

        let pr_attempt = match verdict
            .create_pr
            .as_ref()
            .filter(|p| p.files.iter().any(file_is_committable))
        {
            Some(plan) => Some(self.author_pr(&ctx, plan).await),
            None => None,
        };

        if !verdict.should_reply {
            return Ok(DiscussionOutcome::skipped(DiscussionSkipReason::DeclinedToReply));
        }

        let mut reply = verdict.reply.clone().unwrap_or_default();
        let mut pr_number = None;
        match &pr_attempt {
            Some(Ok(pr)) => {
                pr_number = Some(pr.number);
                reply.push_str(&format!(
                    "\n\nI've opened a PR for this: {} - a human moderator will review it before it goes live.",
                    pr.url
                ));
            }
            Some(Err(e)) => {
                warn!(discussion = number, error = %e, "PR creation failed; replying anyway");
                reply.push_str(&format!(
                    "\n\nI tried to open a PR for this but ran into an error ({e}). A moderator will take a look - sorry about that!"
                ));
            }
            None => {}
        }

        // Replies can only target a top-level comment; for a reply-to-a-reply
        // we target its top-level ancestor instead.
        let reply_to = ctx
            .latest_comment()
            .map(|c| c.top_level_ancestor_id().to_string());

        self.github
            .post_discussion_comment(&ctx.id, &reply, reply_to.as_deref())
            .await?;

        Ok(DiscussionOutcome {
            replied: true,
            pr: pr_number,
            reason: None,
        })
    }

    /// Engage on fresh threads, on explicit mentions, or anywhere the bot
    /// has already participated.
    fn should_engage(&self, ctx: &DiscussionContext) -> bool {
        if ctx.comments.is_empty() {
            return true;
        }

        let slug = self.bot_slug.to_lowercase();
        let mentioned_in = |text: &str| text.to_lowercase().contains(&slug);

        if mentioned_in(&ctx.body) {
            return true;
        }
        if let Some(latest) = ctx.latest_comment() {
            if mentioned_in(&latest.body) {
                return true;
            }
        }

        ctx.comments.iter().any(|c| c.author == self.bot_login)
    }

    /// Create or update the PR a verdict asked for. An existing open bot PR
    /// for this discussion is updated in place instead of duplicated.
    async fn author_pr(
        &self,
        ctx: &DiscussionContext,
        plan: &CreatePrPlan,
    ) -> Result<AuthoredPr, DiscussionError> {
        let branch_prefix = format!("{DISCUSSION_BRANCH_PREFIX}{}-", ctx.number);
        let existing = self.find_existing_pr(&branch_prefix, ctx.number).await?;

        let (branch, existing_pr) = match existing {
            Some((number, url, branch)) => {
                info!(discussion = ctx.number, pr = number, "updating existing bot PR");
                (branch, Some(AuthoredPr { number, url }))
            }
            None => {
                let branch = format!("{branch_prefix}{}", Utc::now().timestamp());
                self.github.create_branch(&branch).await?;
                (branch, None)
            }
        };

        let slug = plan
            .project_slug
            .clone()
            .or_else(|| {
                plan.files
                    .iter()
                    .find_map(|f| project_slug_from_path(&f.filename).map(str::to_string))
            })
            .unwrap_or_else(|| format!("discussion-{}", ctx.number));

        let thumbnail = self.resolve_thumbnail(ctx, plan).await;

        let mut files: Vec<VerdictFile> = plan
            .files
            .iter()
            .filter(|f| {
                let keep = file_is_committable(f);
                if !keep {
                    warn!(filename = %f.filename, "dropping file the directory does not accept");
                }
                keep
            })
            .cloned()
            .collect();
        if let Some((image, payload)) = thumbnail {
            let image_path = format!("public/projects/{slug}.{}", payload.extension);
            let thumbnail_ref = format!("/projects/{slug}.{}", payload.extension);

            match self
                .github
                .create_or_update_file(
                    &self.repo_owner,
                    &self.repo_name,
                    &image_path,
                    &payload.bytes,
                    &branch,
                    &format!("Add thumbnail for {slug} (PunkModBot)"),
                )
                .await
            {
                Ok(_) => {
                    for file in &mut files {
                        if project_slug_from_path(&file.filename).is_some() {
                            if let Some(patched) = patch_thumbnail(&file.content, &thumbnail_ref) {
                                file.content = patched;
                            }
                        }
                    }
                }
                // A missing thumbnail never blocks the submission itself.
                Err(e) => warn!(image, error = %e, "failed to commit thumbnail"),
            }
        }

        for file in &files {
            self.github
                .create_or_update_file(
                    &self.repo_owner,
                    &self.repo_name,
                    &file.filename,
                    file.content.as_bytes(),
                    &branch,
                    &format!("Add {} (requested in discussion #{})", file.filename, ctx.number),
                )
                .await?;
        }

        if let Some(pr) = existing_pr {
            return Ok(pr);
        }

        let body = format!(
            "Adds a directory entry requested by @{author} in discussion #{number}.\n\n\
             ---\n*Opened by PunkModBot. A human moderator reviews every submission before it merges.*",
            author = ctx.author,
            number = ctx.number,
        );
        let created = self
            .github
            .create_pull_request(&branch, &plan.title, &body)
            .await?;

        Ok(AuthoredPr {
            number: created.number,
            url: created.url,
        })
    }

    async fn find_existing_pr(
        &self,
        branch_prefix: &str,
        discussion_number: u64,
    ) -> Result<Option<(u64, String, String)>, DiscussionError> {
        let open = self.github.list_open_pull_requests().await?;
        let marker = format!("discussion #{discussion_number}");

        Ok(open.into_iter().find_map(|pr| {
            let ours = pr.user.login == self.bot_login;
            let matches_branch = pr.head.branch.starts_with(branch_prefix);
            let matches_body = pr
                .body
                .as_deref()
                .map(|b| b.contains(&marker))
                .unwrap_or(false);
            if ours && (matches_branch || matches_body) {
                Some((pr.number, pr.html_url, pr.head.branch))
            } else {
                None
            }
        }))
    }

    /// Thumbnail source priority: explicit image from the verdict, then an
    /// image URL found in the conversation, then the project URL's OG image.
    /// Returns the source URL and downloaded payload, or `None` - a missing
    /// thumbnail is acceptable, not an error.
    async fn resolve_thumbnail(
        &self,
        ctx: &DiscussionContext,
        plan: &CreatePrPlan,
    ) -> Option<(String, content::ImagePayload)> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(explicit) = &plan.image_url {
            candidates.push(explicit.clone());
        }

        let mut conversation = ctx.body.clone();
        for comment in &ctx.comments {
            conversation.push('\n');
            conversation.push_str(&comment.body);
        }
        candidates.extend(content::extract_image_urls(&conversation));

        for candidate in &candidates {
            if let Some(payload) = self.content.download_image(candidate).await {
                return Some((candidate.clone(), payload));
            }
        }

        // No explicit or attached image anywhere; fall back to the project
        // page's representative image.
        let project_url = plan.files.iter().find_map(|f| {
            let (yaml, _) = split_frontmatter(&f.content)?;
            let fm: ProjectFrontmatter = serde_yaml::from_str(yaml).ok()?;
            Some(fm.url)
        })?;
        let og = self.content.og_image(&project_url).await?;
        let payload = self.content.download_image(&og).await?;
        Some((og, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::discussion::DiscussionComment;
    use crate::services::fakes::{FakeContent, FakeGitHub, FakeLlm};

    fn service(github: Arc<FakeGitHub>, llm: FakeLlm, content: FakeContent) -> DiscussionService {
        DiscussionService::new(
            github,
            Arc::new(llm),
            Arc::new(content),
            "punkmodbot[bot]".to_string(),
            "punkmodbot".to_string(),
            "madebypunks".to_string(),
            "directory".to_string(),
        )
    }

    fn ctx(number: u64, body: &str, comments: Vec<DiscussionComment>) -> DiscussionContext {
        DiscussionContext {
            id: format!("D_{number}"),
            number,
            title: "add my project".to_string(),
            body: body.to_string(),
            author: "alice".to_string(),
            category: "Submissions".to_string(),
            comments,
        }
    }

    fn comment(
        id: &str,
        author: &str,
        body: &str,
        parent: Option<&str>,
        at: i64,
    ) -> DiscussionComment {
        DiscussionComment {
            id: id.to_string(),
            author: author.to_string(),
            body: body.to_string(),
            created_at: chrono::DateTime::from_timestamp(at, 0).unwrap(),
            parent_id: parent.map(str::to_string),
        }
    }

    fn reply_verdict() -> &'static str {
        r#"{"summary": "greeting", "shouldReply": true, "reply": "gm punk!"}"#
    }

    #[tokio::test]
    async fn bot_never_replies_to_itself() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            1,
            "hello",
            vec![comment("DC_1", "punkmodbot[bot]", "welcome!", None, 100)],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(1).await.unwrap();
        assert_eq!(
            outcome,
            DiscussionOutcome::skipped(DiscussionSkipReason::BotRepliedLast)
        );
        assert!(github.discussion_comments().is_empty());
    }

    #[tokio::test]
    async fn fresh_discussion_gets_a_top_level_reply() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(2, "what is this place?", vec![]));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(2).await.unwrap();
        assert!(outcome.replied);

        let posted = github.discussion_comments();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].2, None, "fresh thread reply must be top-level");
    }

    #[tokio::test]
    async fn unmentioned_thread_without_participation_is_ignored() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            3,
            "chatting about punks",
            vec![comment("DC_1", "alice", "nice day", None, 100)],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(3).await.unwrap();
        assert_eq!(
            outcome,
            DiscussionOutcome::skipped(DiscussionSkipReason::NotEngaged)
        );
    }

    #[tokio::test]
    async fn mention_in_latest_comment_engages_case_insensitively() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            4,
            "chatting",
            vec![comment("DC_1", "alice", "hey @PunkModBot can you help?", None, 100)],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(4).await.unwrap();
        assert!(outcome.replied);
    }

    #[tokio::test]
    async fn prior_participation_keeps_the_bot_engaged() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            5,
            "no mention here",
            vec![
                comment("DC_1", "punkmodbot[bot]", "happy to help", None, 100),
                comment("DC_2", "alice", "actually one more thing", None, 200),
            ],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        assert!(svc.handle_discussion(5).await.unwrap().replied);
    }

    #[tokio::test]
    async fn reply_to_a_second_level_comment_targets_its_top_level_ancestor() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            6,
            "thread",
            vec![
                comment("DC_top", "alice", "hey @punkmodbot", None, 100),
                comment("DC_reply", "bob", "@punkmodbot same question", Some("DC_top"), 200),
            ],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        svc.handle_discussion(6).await.unwrap();

        let posted = github.discussion_comments();
        assert_eq!(posted[0].2.as_deref(), Some("DC_top"));
    }

    #[tokio::test]
    async fn late_reply_in_an_earlier_thread_counts_as_the_latest_comment() {
        // Flattened thread order ends on DC_b, but the bot's reply under
        // DC_a is chronologically newest, so the bot spoke last.
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            12,
            "hey @punkmodbot",
            vec![
                comment("DC_a", "alice", "first question", None, 100),
                comment("DC_a1", "punkmodbot[bot]", "answered", Some("DC_a"), 300),
                comment("DC_b", "alice", "separate note", None, 200),
            ],
        ));

        let svc = service(github.clone(), FakeLlm::new(reply_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(12).await.unwrap();
        assert_eq!(
            outcome,
            DiscussionOutcome::skipped(DiscussionSkipReason::BotRepliedLast)
        );
        assert!(github.discussion_comments().is_empty());
    }

    #[tokio::test]
    async fn should_reply_false_posts_nothing() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(7, "", vec![]));

        let svc = service(
            github.clone(),
            FakeLlm::new(r#"{"summary": "spam", "shouldReply": false}"#),
            FakeContent::default(),
        );
        let outcome = svc.handle_discussion(7).await.unwrap();
        assert_eq!(
            outcome,
            DiscussionOutcome::skipped(DiscussionSkipReason::DeclinedToReply)
        );
        assert!(github.discussion_comments().is_empty());
    }

    fn create_pr_verdict() -> &'static str {
        r#"{
            "summary": "project submission",
            "shouldReply": true,
            "reply": "Love it - opening a PR now!",
            "createPR": {
                "title": "Add Example for punk 42",
                "files": [{
                    "filename": "content/projects/example.md",
                    "content": "---\nname: Example\ndescription: A thing.\nurl: https://example.com\nlaunchDate: 2024-01-01\ntags:\n  - Tool\ncreators:\n  - 42\n---\n"
                }],
                "projectSlug": "example"
            }
        }"#
    }

    #[tokio::test]
    async fn discussion_submission_creates_branch_commits_and_pr() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(
            8,
            "please add my project at https://example.com by punk 42, I attached a screenshot ![img](https://github.com/user-attachments/assets/abc.png)",
            vec![],
        ));
        let content = FakeContent::default().with_image(
            "https://github.com/user-attachments/assets/abc.png",
            b"\x89PNG this is a perfectly plausible png body with enough bytes in it to pass validation......".to_vec(),
            "png",
        );

        let svc = service(github.clone(), FakeLlm::new(create_pr_verdict()), content);
        let outcome = svc.handle_discussion(8).await.unwrap();
        assert!(outcome.replied);
        assert!(outcome.pr.is_some());

        // Branch off default, never the default branch itself.
        let branches = github.created_branches();
        assert_eq!(branches.len(), 1);
        assert!(branches[0].starts_with("punkmod/discussion-8-"));

        // The attached screenshot becomes the thumbnail, not an OG fallback.
        let commits = github.committed_files();
        let image_commit = commits
            .iter()
            .find(|(path, _, _)| path == "public/projects/example.png")
            .expect("image committed");
        assert!(image_commit.1.starts_with(b"\x89PNG"));

        let project_commit = commits
            .iter()
            .find(|(path, _, _)| path == "content/projects/example.md")
            .expect("project file committed");
        let text = String::from_utf8_lossy(&project_commit.1);
        assert!(text.contains("thumbnail: /projects/example.png"));
        assert!(text.contains("creators:\n  - 42"));

        let prs = github.created_prs();
        assert_eq!(prs.len(), 1);
        assert!(prs[0].0.starts_with("punkmod/discussion-8-"));

        let reply = &github.discussion_comments()[0].1;
        assert!(reply.contains("I've opened a PR"));
    }

    #[tokio::test]
    async fn og_image_is_the_thumbnail_of_last_resort() {
        let github = Arc::new(FakeGitHub::default());
        // No screenshot anywhere in the conversation.
        github.set_discussion(ctx(11, "please add my project at https://example.com", vec![]));
        let content = FakeContent::default()
            .with_og_image("https://example.com", "https://example.com/og.jpg")
            .with_image(
                "https://example.com/og.jpg",
                b"\xff\xd8\xff jpeg body long enough to clear the minimum size check...............".to_vec(),
                "jpg",
            );

        let svc = service(github.clone(), FakeLlm::new(create_pr_verdict()), content);
        svc.handle_discussion(11).await.unwrap();

        let commits = github.committed_files();
        assert!(commits.iter().any(|(path, _, _)| path == "public/projects/example.jpg"));
        let project = commits
            .iter()
            .find(|(path, _, _)| path == "content/projects/example.md")
            .unwrap();
        assert!(String::from_utf8_lossy(&project.1).contains("thumbnail: /projects/example.jpg"));
    }

    #[tokio::test]
    async fn files_the_directory_does_not_accept_are_never_committed() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(13, "please add my stuff @punkmodbot", vec![]));

        // The judgment asks for a workflow file, a badly named project, a
        // valid project entry, and a valid punk profile.
        let verdict = r#"{
            "summary": "mixed submission",
            "shouldReply": true,
            "reply": "on it",
            "createPR": {
                "title": "Add Example",
                "files": [
                    {"filename": ".github/workflows/ci.yml", "content": "---\nname: evil\n---\n"},
                    {"filename": "content/projects/My Project.md", "content": "---\nname: Example\ndescription: A thing.\nurl: https://example.com\nlaunchDate: 2024-01-01\ntags:\n  - Tool\ncreators:\n  - 42\n---\n"},
                    {"filename": "content/projects/example.md", "content": "---\nname: Example\ndescription: A thing.\nurl: https://example.com\nlaunchDate: 2024-01-01\ntags:\n  - Tool\ncreators:\n  - 42\n---\n"},
                    {"filename": "content/punks/42.md", "content": "---\nname: Punk 42\n---\n"}
                ]
            }
        }"#;

        let svc = service(github.clone(), FakeLlm::new(verdict), FakeContent::default());
        let outcome = svc.handle_discussion(13).await.unwrap();
        assert!(outcome.pr.is_some());

        let commits = github.committed_files();
        let committed: Vec<&str> = commits.iter().map(|(path, _, _)| path.as_str()).collect();
        assert!(committed.contains(&"content/projects/example.md"));
        assert!(committed.contains(&"content/punks/42.md"));
        assert!(!committed.iter().any(|p| p.starts_with(".github/")));
        assert!(!committed.iter().any(|p| p.contains("My Project")));
    }

    #[tokio::test]
    async fn plan_with_only_rejected_files_opens_no_pr() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(14, "hey @punkmodbot", vec![]));

        let verdict = r#"{
            "summary": "bad submission",
            "shouldReply": true,
            "reply": "hm, let me look",
            "createPR": {
                "title": "Add page",
                "files": [{"filename": "src/app/page.tsx", "content": "export default 1"}]
            }
        }"#;

        let svc = service(github.clone(), FakeLlm::new(verdict), FakeContent::default());
        let outcome = svc.handle_discussion(14).await.unwrap();
        assert!(outcome.replied);
        assert_eq!(outcome.pr, None);

        assert!(github.created_branches().is_empty());
        assert!(github.created_prs().is_empty());
        assert!(github.committed_files().is_empty());
    }

    #[tokio::test]
    async fn existing_bot_pr_is_updated_not_duplicated() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(9, "one more tweak please @punkmodbot", vec![]));
        github.add_open_pr(
            31,
            "punkmodbot[bot]",
            "punkmod/discussion-9-1700000000",
            "Adds a directory entry requested by @alice in discussion #9.",
        );

        let svc = service(github.clone(), FakeLlm::new(create_pr_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(9).await.unwrap();
        assert_eq!(outcome.pr, Some(31));

        assert!(github.created_branches().is_empty(), "no new branch");
        assert!(github.created_prs().is_empty(), "no duplicate PR");

        let commits = github.committed_files();
        assert!(commits
            .iter()
            .all(|(_, _, branch)| branch == "punkmod/discussion-9-1700000000"));
    }

    #[tokio::test]
    async fn pr_failure_still_replies_with_an_apology() {
        let github = Arc::new(FakeGitHub::default());
        github.set_discussion(ctx(10, "please add my project", vec![]));
        github.fail_pr_creation();

        let svc = service(github.clone(), FakeLlm::new(create_pr_verdict()), FakeContent::default());
        let outcome = svc.handle_discussion(10).await.unwrap();
        assert!(outcome.replied);
        assert_eq!(outcome.pr, None);

        let reply = &github.discussion_comments()[0].1;
        assert!(reply.contains("ran into an error"));
    }
}
