use sheet_sync_sources::SourceError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State file {path} is corrupt: {source}. Remove it or run 'sheetsync clear --local-only'")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Daily quota exceeded for {service}. Try again tomorrow.")]
    DailyQuotaExceeded { service: String, message: String },

    #[error("{operation} failed after {attempts} retries ({} total wait). Last error: {last_error}", format_wait(.total_wait))]
    RetryExhausted {
        operation: String,
        attempts: u32,
        total_wait: Duration,
        last_error: String,
    },

    #[error("{operation} failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: SourceError,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("No playlist matches '{0}' (use a playlist ID or its exact title)")]
    PlaylistNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// `HH:MM:SS`
pub fn format_wait(wait: &Duration) -> String {
    let secs = wait.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
