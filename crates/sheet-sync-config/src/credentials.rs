use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Access tokens this close to expiry are treated as expired
const ACCESS_TOKEN_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_token_expires: Option<DateTime<Utc>>,
}

/// Google tokens kept in `credentials.toml`.
///
/// The refresh token is long-lived and set once through `sheetsync config google`;
/// the access token and its expiry are rewritten after every run.
pub struct CredentialStore {
    path: PathBuf,
    tokens: StoredTokens,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            tokens: StoredTokens::default(),
        }
    }

    /// A missing file leaves the store empty
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        self.tokens = toml::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(&self.tokens)?)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    pub fn get_google_refresh_token(&self) -> Option<&String> {
        self.tokens.google_refresh_token.as_ref()
    }

    /// A new refresh token invalidates any cached access token
    pub fn set_google_refresh_token(&mut self, token: String) {
        self.tokens = StoredTokens {
            google_refresh_token: Some(token),
            ..StoredTokens::default()
        };
    }

    pub fn get_google_access_token(&self) -> Option<&String> {
        self.tokens.google_access_token.as_ref()
    }

    pub fn set_google_access_token(&mut self, token: String, expires: DateTime<Utc>) {
        self.tokens.google_access_token = Some(token);
        self.tokens.google_token_expires = Some(expires);
    }

    pub fn get_google_token_expires(&self) -> Option<DateTime<Utc>> {
        self.tokens.google_token_expires
    }

    /// Cached access token that is still valid for at least a minute
    pub fn valid_google_access_token(&self, now: DateTime<Utc>) -> Option<&String> {
        let expires = self.tokens.google_token_expires?;
        if expires - Duration::seconds(ACCESS_TOKEN_MARGIN_SECS) > now {
            self.get_google_access_token()
        } else {
            None
        }
    }
}
