//! Content extraction and verification
//!
//! Pulls URLs and images out of submitted files and comments, fetches
//! reader-friendly renderings of external pages, and downloads images.
//! Everything here is best-effort: fetch failures fold into the returned
//! value instead of raising, so callers are forced to handle "unavailable".

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::review::PrFile;
use crate::services::token::TokenManager;

/// Page fetches give up after this long
const URL_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Image downloads give up after this long
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Only the first few URLs are verified, in parallel
const MAX_URL_CHECKS: usize = 5;
/// Page content handed to the LLM is capped at this many characters
const MAX_PAGE_CONTENT_CHARS: usize = 1500;
/// Payloads smaller than this are not plausible images
const MIN_IMAGE_BYTES: usize = 100;
/// Uploaded attachments live on this host and need the installation token
const GITHUB_ASSET_HOST: &str = "github.com";

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("url regex"));

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)\)").expect("markdown image regex"));

static BARE_IMAGE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"'\)\]]+\.(?:png|jpe?g|gif|webp)"#).expect("bare image regex")
});

static OG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<meta[^>]*(?:property|name)=["']og:image["'][^>]*content=["']([^"']+)["']|<meta[^>]*content=["']([^"']+)["'][^>]*(?:property|name)=["']og:image["']"#,
    )
    .expect("og:image regex")
});

/// Result of probing one submitted URL; cached only for the duration of one
/// review call
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrlCheckResult {
    pub url: String,
    pub status: UrlCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UrlCheckStatus {
    Ok,
    Error,
    Timeout,
}

/// A downloaded image ready to be committed
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: &'static str,
}

/// Scan file contents for `http(s)://` tokens; trailing punctuation trimmed,
/// order preserved, duplicates removed.
pub fn extract_urls(files: &[PrFile]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for file in files {
        for found in URL_RE.find_iter(&file.contents) {
            let url = trim_trailing_punctuation(found.as_str());
            if seen.insert(url.to_string()) {
                urls.push(url.to_string());
            }
        }
    }
    urls
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'])
}

/// Markdown image references plus bare image-file URLs in free text; used to
/// detect uploaded attachments in discussion bodies and comments.
pub fn extract_image_urls(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for cap in MARKDOWN_IMAGE_RE.captures_iter(text) {
        let url = cap[1].to_string();
        if url.starts_with("http") && seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    for found in BARE_IMAGE_URL_RE.find_iter(text) {
        let url = found.as_str().to_string();
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

/// Map an image content-type to a file extension; unknown subtypes fall back
/// to png.
fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        m if m.contains("jpeg") || m.contains("jpg") => "jpg",
        m if m.contains("gif") => "gif",
        m if m.contains("webp") => "webp",
        _ => "png",
    }
}

/// Derive title/description/truncated content from a reader-rendered page
fn summarize_markdown(url: &str, markdown: &str) -> UrlCheckResult {
    let mut lines = markdown.lines().filter(|l| !l.trim().is_empty());

    let title = lines
        .next()
        .map(|l| l.trim_start_matches('#').trim().to_string());

    let description = lines.next().map(|l| l.trim().to_string());

    let content = if markdown.chars().count() > MAX_PAGE_CONTENT_CHARS {
        let truncated: String = markdown.chars().take(MAX_PAGE_CONTENT_CHARS).collect();
        format!("{truncated}… [truncated]")
    } else {
        markdown.to_string()
    };

    UrlCheckResult {
        url: url.to_string(),
        status: UrlCheckStatus::Ok,
        title,
        description,
        content: Some(content),
        error: None,
    }
}

/// Scan reader-rendered markdown for the first image reference
fn first_image_in_markdown(markdown: &str) -> Option<String> {
    extract_image_urls(markdown).into_iter().next()
}

/// Pull the `og:image` URL out of raw HTML, resolving relative URLs against
/// the page origin.
fn og_image_from_html(page_url: &str, html: &str) -> Option<String> {
    let cap = OG_IMAGE_RE.captures(html)?;
    let image = cap.get(1).or_else(|| cap.get(2))?.as_str();

    if image.starts_with("http") {
        return Some(image.to_string());
    }
    let base = url::Url::parse(page_url).ok()?;
    base.join(image).ok().map(|u| u.to_string())
}

/// The content-fetch seam the engines work against; faked in tests
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn url_summary(&self, url: &str) -> UrlCheckResult;
    async fn og_image(&self, url: &str) -> Option<String>;
    async fn download_image(&self, url: &str) -> Option<ImagePayload>;
}

/// Verify at most the first [`MAX_URL_CHECKS`] URLs, in parallel
pub async fn verify_urls(content: &dyn ContentApi, urls: &[String]) -> Vec<UrlCheckResult> {
    let checks = urls
        .iter()
        .take(MAX_URL_CHECKS)
        .map(|url| content.url_summary(url));
    join_all(checks).await
}

/// Concrete fetcher over the reader proxy and direct HTTP
pub struct ContentFetcher {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    reader_base: String,
}

impl ContentFetcher {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>, reader_base: String) -> Self {
        Self {
            http,
            tokens,
            reader_base: reader_base.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_reader_markdown(&self, url: &str) -> Result<String, UrlCheckResult> {
        let reader_url = format!("{}/{url}", self.reader_base);
        let res = self
            .http
            .get(&reader_url)
            .timeout(URL_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| fetch_failure(url, e))?;

        if !res.status().is_success() {
            return Err(UrlCheckResult {
                url: url.to_string(),
                status: UrlCheckStatus::Error,
                title: None,
                description: None,
                content: None,
                error: Some(format!("HTTP {}", res.status().as_u16())),
            });
        }

        res.text().await.map_err(|e| fetch_failure(url, e))
    }
}

fn fetch_failure(url: &str, err: reqwest::Error) -> UrlCheckResult {
    let status = if err.is_timeout() {
        UrlCheckStatus::Timeout
    } else {
        UrlCheckStatus::Error
    };
    UrlCheckResult {
        url: url.to_string(),
        status,
        title: None,
        description: None,
        content: None,
        error: Some(err.to_string()),
    }
}

#[async_trait]
impl ContentApi for ContentFetcher {
    async fn url_summary(&self, url: &str) -> UrlCheckResult {
        match self.fetch_reader_markdown(url).await {
            Ok(markdown) => summarize_markdown(url, &markdown),
            Err(result) => result,
        }
    }

    /// Representative image for a page: reader-markdown scan first, raw
    /// HTML `og:image` as fallback. `None` on any failure.
    async fn og_image(&self, url: &str) -> Option<String> {
        if let Ok(markdown) = self.fetch_reader_markdown(url).await {
            if let Some(image) = first_image_in_markdown(&markdown) {
                return Some(image);
            }
        }

        let res = self
            .http
            .get(url)
            .timeout(URL_FETCH_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !res.status().is_success() {
            return None;
        }
        let html = res.text().await.ok()?;
        og_image_from_html(url, &html)
    }

    /// Download and validate an image. The installation token is attached
    /// only when the URL points at the GitHub asset domain. `None` on any
    /// validation or network failure.
    async fn download_image(&self, url: &str) -> Option<ImagePayload> {
        let auth = if is_github_asset_url(url) {
            self.tokens.get().await.ok()
        } else {
            None
        };
        download_image_as_binary(&self.http, url, auth.as_deref()).await
    }
}

fn is_github_asset_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == GITHUB_ASSET_HOST))
        .unwrap_or(false)
}

/// Fetch an image with validation; never errors, only `None`
pub async fn download_image_as_binary(
    http: &reqwest::Client,
    url: &str,
    auth_token: Option<&str>,
) -> Option<ImagePayload> {
    let mut request = http.get(url).timeout(IMAGE_FETCH_TIMEOUT);
    if let Some(token) = auth_token {
        request = request.bearer_auth(token);
    }

    let res = request.send().await.ok()?;
    if !res.status().is_success() {
        debug!(url, status = res.status().as_u16(), "image fetch failed");
        return None;
    }

    let mime_type = res
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !mime_type.starts_with("image/") {
        debug!(url, mime_type, "response is not an image");
        return None;
    }

    let bytes = res.bytes().await.ok()?;
    if bytes.len() < MIN_IMAGE_BYTES {
        debug!(url, len = bytes.len(), "payload too small to be a real image");
        return None;
    }

    let extension = extension_for_mime(&mime_type);
    Some(ImagePayload {
        bytes: bytes.to_vec(),
        mime_type,
        extension,
    })
}
