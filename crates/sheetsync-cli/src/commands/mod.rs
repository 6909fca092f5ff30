pub mod clear;
pub mod config;
pub mod reset;
pub mod status;
pub mod sync;
pub mod sync_ui;

use chrono::Utc;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use sheet_sync_config::{Config, CredentialStore, GoogleClientCredentials, PathManager};
use sheet_sync_core::{RetryExecutor, RetryPolicy, SheetWriter, StateStore};
use sheet_sync_sources::{
    build_http_client, AccessToken, GoogleAuth, GoogleSheetsClient, PlaylistSource, SpreadsheetClient,
    YouTubeClient,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a command ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Completed,
    /// Cancelled by Ctrl-C after saving a checkpoint
    Interrupted,
}

/// Paths, config and state shared by the commands that touch remote services
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    pub store: StateStore,
    pub cancel: CancellationToken,
}

/// Google clients sharing one token cache
pub struct GoogleServices {
    pub auth: Arc<GoogleAuth>,
    pub youtube: Arc<dyn PlaylistSource>,
    pub sheets: Arc<dyn SpreadsheetClient>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = PathManager::default();
        paths
            .ensure_directories()
            .map_err(|e| eyre!("Failed to create sheetsync directories under {}: {}", paths.config_dir().display(), e))?;

        let config_file = paths.config_file();
        let config = Config::load_or_default(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;

        Ok(Self {
            store: StateStore::from_paths(&paths),
            paths,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// First Ctrl-C cancels the token; the running step finishes and saves a checkpoint
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(operation = "interrupt", "Interrupt received, saving progress before exiting");
                token.cancel();
            }
        });
    }

    pub fn retry(&self) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::from_config(&self.config.retry), self.cancel.clone())
    }

    pub fn credentials(&self) -> Result<CredentialStore> {
        let file = self.paths.credentials_file();
        let mut store = CredentialStore::new(file.clone());
        store
            .load()
            .map_err(|e| eyre!("Failed to load credentials from {}: {}", file.display(), e))?;
        Ok(store)
    }

    pub fn google_services(&self, google: &GoogleClientCredentials) -> Result<GoogleServices> {
        let credentials = self.credentials()?;
        let refresh_token = credentials.get_google_refresh_token().cloned().ok_or_else(|| {
            eyre!("No Google refresh token stored. Run 'sheetsync config google --refresh-token <TOKEN>'")
        })?;

        let client = build_http_client(self.config.retry.http_timeout()).wrap_err("Failed to build HTTP client")?;
        let mut auth = GoogleAuth::new(
            client.clone(),
            google.client_id.clone(),
            google.client_secret.clone(),
            refresh_token,
        );
        if let (Some(token), Some(expires_at)) = (
            credentials.valid_google_access_token(Utc::now()).cloned(),
            credentials.get_google_token_expires(),
        ) {
            tracing::debug!(%expires_at, "Reusing cached Google access token");
            auth = auth.with_cached_token(AccessToken { token, expires_at });
        }
        let auth = Arc::new(auth);

        Ok(GoogleServices {
            youtube: Arc::new(YouTubeClient::new(client.clone(), auth.clone())),
            sheets: Arc::new(GoogleSheetsClient::new(client, auth.clone())),
            auth,
        })
    }

    pub fn sheet_writer(&self, services: &GoogleServices) -> SheetWriter {
        SheetWriter::new(services.sheets.clone(), self.retry())
    }

    /// Saves the access token the run ended with so the next run can skip a refresh
    pub async fn persist_google_token(&self, auth: &GoogleAuth) -> Result<()> {
        let Some(token) = auth.current_token().await else {
            return Ok(());
        };
        let mut credentials = self.credentials()?;
        if credentials.get_google_access_token() == Some(&token.token) {
            return Ok(());
        }
        credentials.set_google_access_token(token.token, token.expires_at);
        credentials
            .save()
            .map_err(|e| eyre!("Failed to save credentials: {}", e))?;
        tracing::debug!("Persisted Google access token");
        Ok(())
    }
}

pub fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}", spreadsheet_id)
}
