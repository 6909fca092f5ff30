use sheet_sync_config::RetryConfig;
use sheet_sync_sources::{ErrorCategory, SourceError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{format_wait, Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Pause after every successful call
    pub throttle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(3),
            throttle: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            throttle: config.throttle(),
        }
    }

    /// `base_delay * 2^(attempt-1)` for the wait after failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Runs remote calls with classified retries, cancellable waits and a
/// fixed throttle after each success
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>>,
    {
        self.execute_with(operation, action, |_| {}).await
    }

    /// `operation` is a dotted label; the part before the first dot names the
    /// service in quota errors
    pub async fn execute_with<T, F, Fut, P>(
        &self,
        operation: &str,
        mut action: F,
        post_action: P,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SourceError>>,
        P: FnOnce(&T),
    {
        let service = operation.split('.').next().unwrap_or(operation);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut total_wait = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let error = match action().await {
                Ok(value) => {
                    post_action(&value);
                    self.throttle().await;
                    return Ok(value);
                }
                Err(error) => error,
            };

            match error.category() {
                ErrorCategory::DailyQuota => {
                    warn!(operation, "Daily quota exhausted: {}", error);
                    return Err(SyncError::DailyQuotaExceeded {
                        service: service.to_string(),
                        message: error.to_string(),
                    });
                }
                ErrorCategory::Other => {
                    return Err(SyncError::Operation {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
                ErrorCategory::RateLimited => {}
            }

            if attempt >= max_attempts {
                return Err(SyncError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    total_wait,
                    last_error: error.to_string(),
                });
            }

            let wait = self.policy.delay_for(attempt);
            total_wait += wait;
            warn!(
                operation,
                attempt,
                max_attempts,
                "{} failed (attempt {}/{}): {}",
                operation,
                attempt,
                max_attempts,
                error
            );
            info!("Waiting {} before retrying {}", format_wait(&wait), operation);

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(operation, "Retry wait interrupted by cancellation");
                    return Err(SyncError::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn throttle(&self) {
        if self.policy.throttle.is_zero() {
            return;
        }
        // the call already succeeded; cancellation only cuts the pause short
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.policy.throttle) => {}
        }
    }
}
