//! LLM completion client
//!
//! One request per judgment. The completion is untrusted free text expected
//! to contain exactly one JSON object; the parser extracts the first
//! balanced `{...}` block and fails closed on any structural mismatch.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {status} {body}")]
    Api { status: u16, body: String },

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("No parseable JSON in LLM response: {0}")]
    MalformedResponse(String),
}

/// The judgment seam; faked in tests
#[async_trait]
pub trait LlmApi: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Concrete client against the Anthropic messages API
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[async_trait]
impl LlmApi for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let res = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = res
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| LlmError::MalformedResponse("no text block".to_string()))?;

        debug!(chars = text.len(), "received completion");
        Ok(text)
    }
}

/// Extract the first balanced `{...}` block, string/escape aware
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the verdict JSON out of a free-text completion, failing closed
pub fn parse_verdict<T: for<'de> Deserialize<'de>>(completion: &str) -> Result<T, LlmError> {
    let block = extract_json_object(completion)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object found".to_string()))?;
    serde_json::from_str(block).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}
