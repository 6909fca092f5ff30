use thiserror::Error;

/// How a failed remote call should be treated by the retry layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Per-day quota is spent; retrying today is pointless
    DailyQuota,
    /// Per-minute quota, throttling or a transient backend failure
    RateLimited,
    Other,
}

impl ErrorCategory {
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("daily limit")
            || lower.contains("quota exceeded")
            || (lower.contains("quota") && lower.contains("day"))
        {
            return ErrorCategory::DailyQuota;
        }

        if matches!(status, Some(429) | Some(503)) {
            return ErrorCategory::RateLimited;
        }

        const TRANSIENT: [&str; 7] = [
            "quota",
            "rate limit",
            "too many requests",
            "backend service failed",
            "429",
            "503",
            "timeout",
        ];
        if TRANSIENT.iter().any(|needle| lower.contains(needle)) {
            return ErrorCategory::RateLimited;
        }

        ErrorCategory::Other
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        category: ErrorCategory,
        message: String,
    },

    #[error("Request failed: {message}")]
    Transport {
        category: ErrorCategory,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl SourceError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let category = ErrorCategory::classify(Some(status), &message);
        SourceError::Http {
            status,
            category,
            message,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SourceError::Http { category, .. } | SourceError::Transport { category, .. } => {
                *category
            }
            SourceError::Decode(_) | SourceError::Auth(_) => ErrorCategory::Other,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        let category = if err.is_timeout() {
            ErrorCategory::RateLimited
        } else {
            ErrorCategory::classify(err.status().map(|s| s.as_u16()), &message)
        };

        if err.is_decode() {
            return SourceError::Decode(message);
        }
        SourceError::Transport { category, message }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}
