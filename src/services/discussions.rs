//! Discussion transport
//!
//! GitHub Discussions are only reachable over GraphQL. Queries pull the
//! discussion plus its two-level comment tree; mutations add a top-level
//! comment or a reply to a top-level comment.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::models::discussion::{DiscussionComment, DiscussionContext};
use crate::services::github::{GitHubApiError, GitHubClient};

const GRAPHQL_URL: &str = "https://api.github.com/graphql";

const DISCUSSION_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    discussion(number: $number) {
      id
      number
      title
      body
      author { login }
      category { name }
      comments(first: 100) {
        nodes {
          id
          author { login }
          body
          createdAt
          replies(first: 100) {
            nodes {
              id
              author { login }
              body
              createdAt
            }
          }
        }
      }
    }
  }
}
"#;

const ADD_COMMENT_MUTATION: &str = r#"
mutation($discussionId: ID!, $body: String!, $replyToId: ID) {
  addDiscussionComment(input: {discussionId: $discussionId, body: $body, replyToId: $replyToId}) {
    comment { id }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DiscussionData {
    repository: RepositoryNode,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    discussion: Option<DiscussionNode>,
}

#[derive(Debug, Deserialize)]
struct DiscussionNode {
    id: String,
    number: u64,
    title: String,
    body: String,
    author: Option<AuthorNode>,
    category: CategoryNode,
    comments: CommentConnection,
}

#[derive(Debug, Deserialize)]
struct AuthorNode {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CategoryNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommentConnection {
    nodes: Vec<CommentNode>,
}

#[derive(Debug, Deserialize)]
struct CommentNode {
    id: String,
    author: Option<AuthorNode>,
    body: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    replies: Option<ReplyConnection>,
}

#[derive(Debug, Deserialize)]
struct ReplyConnection {
    nodes: Vec<ReplyNode>,
}

#[derive(Debug, Deserialize)]
struct ReplyNode {
    id: String,
    author: Option<AuthorNode>,
    body: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

async fn execute<T: for<'de> Deserialize<'de>>(
    client: &GitHubClient,
    operation: &str,
    query: &str,
    variables: serde_json::Value,
) -> Result<T, GitHubApiError> {
    let token = client.token().await?;
    let res = client
        .http()
        .post(GRAPHQL_URL)
        .bearer_auth(token)
        .header("User-Agent", "punkmod")
        .json(&json!({ "query": query, "variables": variables }))
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

    let parsed: GraphQlResponse<T> = res
        .json()
        .await
        .map_err(|e| GitHubApiError::Transport(e.to_string()))?;

    if let Some(err) = parsed.errors.first() {
        return Err(GitHubApiError::Api {
            operation: operation.to_string(),
            status_code: status.as_u16(),
            body: err.message.clone(),
        });
    }

    parsed.data.ok_or_else(|| GitHubApiError::Api {
        operation: operation.to_string(),
        status_code: status.as_u16(),
        body: "empty GraphQL response".to_string(),
    })
}

pub(crate) async fn fetch_discussion(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    number: u64,
) -> Result<DiscussionContext, GitHubApiError> {
    let data: DiscussionData = execute(
        client,
        "get_discussion",
        DISCUSSION_QUERY,
        json!({ "owner": owner, "repo": repo, "number": number }),
    )
    .await?;

    let node = data
        .repository
        .discussion
        .ok_or_else(|| GitHubApiError::Api {
            operation: "get_discussion".to_string(),
            status_code: 404,
            body: format!("discussion {number} not found"),
        })?;

    Ok(flatten(node))
}

/// Flatten the two-level tree into thread order, replies carrying the id of
/// their top-level parent.
fn flatten(node: DiscussionNode) -> DiscussionContext {
    let mut comments = Vec::new();
    for top in node.comments.nodes {
        let top_id = top.id.clone();
        comments.push(DiscussionComment {
            id: top.id,
            author: login_or_ghost(top.author),
            body: top.body,
            created_at: top.created_at,
            parent_id: None,
        });
        if let Some(replies) = top.replies {
            for reply in replies.nodes {
                comments.push(DiscussionComment {
                    id: reply.id,
                    author: login_or_ghost(reply.author),
                    body: reply.body,
                    created_at: reply.created_at,
                    parent_id: Some(top_id.clone()),
                });
            }
        }
    }

    DiscussionContext {
        id: node.id,
        number: node.number,
        title: node.title,
        body: node.body,
        author: login_or_ghost(node.author),
        category: node.category.name,
        comments,
    }
}

/// Deleted accounts come back as a null author
fn login_or_ghost(author: Option<AuthorNode>) -> String {
    author.map(|a| a.login).unwrap_or_else(|| "ghost".to_string())
}

pub(crate) async fn add_discussion_comment(
    client: &GitHubClient,
    discussion_id: &str,
    body: &str,
    reply_to_id: Option<&str>,
) -> Result<(), GitHubApiError> {
    let _: serde_json::Value = execute(
        client,
        "post_discussion_comment",
        ADD_COMMENT_MUTATION,
        json!({
            "discussionId": discussion_id,
            "body": body,
            "replyToId": reply_to_id,
        }),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_preserves_thread_order_and_parent_linkage() {
        let node: DiscussionNode = serde_json::from_value(serde_json::json!({
            "id": "D_1",
            "number": 5,
            "title": "add my project",
            "body": "please add it",
            "author": {"login": "alice"},
            "category": {"name": "Submissions"},
            "comments": {
                "nodes": [
                    {
                        "id": "DC_a",
                        "author": {"login": "bot"},
                        "body": "on it",
                        "createdAt": "2024-05-01T10:00:00Z",
                        "replies": {
                            "nodes": [
                                {
                                    "id": "DC_a1",
                                    "author": {"login": "alice"},
                                    "body": "thanks",
                                    "createdAt": "2024-05-01T12:00:00Z"
                                }
                            ]
                        }
                    },
                    {
                        "id": "DC_b",
                        "author": null,
                        "body": "orphaned",
                        "createdAt": "2024-05-01T11:00:00Z",
                        "replies": {"nodes": []}
                    }
                ]
            }
        }))
        .unwrap();

        let ctx = flatten(node);
        assert_eq!(ctx.comments.len(), 3);
        assert_eq!(ctx.comments[0].parent_id, None);
        assert_eq!(ctx.comments[1].parent_id.as_deref(), Some("DC_a"));
        assert_eq!(ctx.comments[1].top_level_ancestor_id(), "DC_a");
        assert_eq!(ctx.comments[2].author, "ghost");
        assert_eq!(ctx.category, "Submissions");
        // Thread order ends on DC_b, but the reply under DC_a is newest.
        assert_eq!(ctx.latest_comment().unwrap().id, "DC_a1");
    }
}
