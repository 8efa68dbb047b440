pub mod content;
pub mod discussion;
pub mod discussions;
pub mod github;
pub mod llm;
pub mod prompts;
pub mod review;
pub mod token;

#[cfg(test)]
pub mod fakes;

pub use content::{ContentApi, ContentFetcher};
pub use discussion::DiscussionService;
pub use github::{GitHubApi, GitHubClient};
pub use llm::{AnthropicClient, LlmApi};
pub use review::ReviewService;
pub use token::TokenManager;
