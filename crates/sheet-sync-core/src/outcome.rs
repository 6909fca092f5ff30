use serde::Serialize;

use crate::error::{Result, SyncError};

/// Result of a sync run that was not aborted by an error.
///
/// `Interrupted` means the run stopped on cancellation after checkpointing;
/// running the same sync again resumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome<S> {
    Completed { summary: S },
    Interrupted { progress: String },
}

impl<S> SyncOutcome<S> {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }

    pub fn completed(self) -> Option<S> {
        match self {
            SyncOutcome::Completed { summary } => Some(summary),
            SyncOutcome::Interrupted { .. } => None,
        }
    }
}

/// Turns a `Cancelled` error into `Interrupted`, describing saved progress
pub(crate) fn interrupted_on_cancel<S>(
    result: Result<SyncOutcome<S>>,
    progress: impl FnOnce() -> String,
) -> Result<SyncOutcome<S>> {
    match result {
        Err(SyncError::Cancelled) => Ok(SyncOutcome::Interrupted {
            progress: progress(),
        }),
        other => other,
    }
}
