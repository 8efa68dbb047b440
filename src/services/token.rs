//! Installation token manager
//!
//! Mints a short-lived GitHub App installation token from a signed RS256
//! assertion and caches it in process memory. One instance per process,
//! shared behind an `Arc`; the cache is the only mutable state in the
//! system.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Errors raised while minting or exchanging the app assertion
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid app private key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign app assertion: {0}")]
    Signing(String),

    #[error("Token exchange failed: {status} {body}")]
    Exchange { status: u16, body: String },

    #[error("Token exchange transport error: {0}")]
    Transport(String),
}

/// Claims of the app-level assertion
#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide installation token cache
pub struct TokenManager {
    http: reqwest::Client,
    app_id: String,
    installation_id: String,
    private_key: String,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            app_id: config.github_app_id.clone(),
            installation_id: config.github_app_installation_id.clone(),
            private_key: config.github_app_private_key.clone(),
            cache: Mutex::new(None),
        }
    }

    /// Return a valid installation token, refreshing when under 5 minutes of
    /// validity remain.
    pub async fn get(&self) -> Result<String, TokenError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now() + Duration::minutes(5) {
                return Ok(cached.token.clone());
            }
        }

        let jwt = self.sign_assertion()?;
        let fresh = self.exchange(&jwt).await?;
        debug!(expires_at = %fresh.expires_at, "minted fresh installation token");

        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// Build the signed app assertion: issued-at backdated 60s for clock
    /// drift, 10-minute expiry, issuer = app id.
    fn sign_assertion(&self) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - 60,
            exp: now + 600,
            iss: self.app_id.clone(),
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    async fn exchange(&self, jwt: &str) -> Result<CachedToken, TokenError> {
        let url = format!(
            "{GITHUB_API_BASE}/app/installations/{}/access_tokens",
            self.installation_id
        );

        let res = self
            .http
            .post(&url)
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "punkmod")
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TokenError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AccessTokenResponse = res
            .json()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        Ok(CachedToken {
            token: parsed.token,
            expires_at: parsed.expires_at,
        })
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, token: &str, expires_at: DateTime<Utc>) {
        *self.cache.lock().await = Some(CachedToken {
            token: token.to_string(),
            expires_at,
        });
    }
}
