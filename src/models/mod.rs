pub mod content;
pub mod discussion;
pub mod event;
pub mod review;

pub use content::{ProjectFrontmatter, PunkFrontmatter};
pub use discussion::{
    CreatePrPlan, DiscussionComment, DiscussionContext, DiscussionVerdict, VerdictFile,
};
pub use event::{
    DiscussionCommentEvent, DiscussionEvent, IssueCommentEvent, PullRequestEvent, WebhookEvent,
};
pub use review::{
    BranchInfo, FixedFile, GitHubUser, IssueComment, PrFile, PullRequestDetails,
    PullRequestSummary, ReviewOutcome, ReviewStatus, ReviewVerdict, SkipReason,
};
