use anyhow::Result;

pub const LASTFM_API_KEY: &str = "LASTFM_API_KEY";
pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Secrets read from the environment at startup
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    pub lastfm_api_key: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            lastfm_api_key: read(LASTFM_API_KEY),
            google_client_id: read(GOOGLE_CLIENT_ID),
            google_client_secret: read(GOOGLE_CLIENT_SECRET),
        }
    }

    pub fn require_lastfm_api_key(&self) -> Result<String> {
        self.lastfm_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} environment variable is not set", LASTFM_API_KEY))
    }

    pub fn require_google(&self) -> Result<GoogleClientCredentials> {
        let missing: Vec<&str> = [
            (GOOGLE_CLIENT_ID, &self.google_client_id),
            (GOOGLE_CLIENT_SECRET, &self.google_client_secret),
        ]
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(anyhow::anyhow!(
                "Missing environment variable(s): {}",
                missing.join(", ")
            ));
        }

        Ok(GoogleClientCredentials {
            client_id: self.google_client_id.clone().unwrap_or_default(),
            client_secret: self.google_client_secret.clone().unwrap_or_default(),
        })
    }
}
