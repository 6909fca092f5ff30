use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::http::read_json;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Exchanges a stored refresh token for short-lived access tokens.
///
/// The consent flow that produces the refresh token happens elsewhere; this only
/// refreshes and caches.
pub struct GoogleAuth {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<AccessToken>>,
}

impl GoogleAuth {
    pub fn new(client: Client, client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id,
            client_secret,
            refresh_token,
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Seed with a token persisted by an earlier run
    pub fn with_cached_token(self, token: AccessToken) -> Self {
        Self {
            cached: Mutex::new(Some(token)),
            ..self
        }
    }

    /// Token currently held, for persisting between runs
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.cached.lock().await.clone()
    }

    pub async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.token.clone());
            }
            debug!("Google access token expires at {}, refreshing", token.expires_at);
        }

        let token = self.refresh().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn refresh(&self) -> Result<AccessToken, SourceError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;

        // invalid_grant comes back as 400; surface it as an auth failure
        if response.status().as_u16() == 400 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "Google token refresh rejected: {}. Store a new refresh token with 'sheetsync config google'",
                error_text
            )));
        }

        let token_response: TokenResponse = read_json(response).await?;
        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);
        info!("Refreshed Google access token (expires at {})", expires_at);

        Ok(AccessToken {
            token: token_response.access_token,
            expires_at,
        })
    }
}
