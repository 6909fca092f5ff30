pub mod diff;
pub mod error;
pub mod outcome;
pub mod playlists;
pub mod progress;
pub mod retry;
pub mod scrobbles;
pub mod sheets;
pub mod store;

#[cfg(test)]
mod test_support;

pub use diff::{append_preserves_order, detect, detect_optimized, detect_playlist_changes};
pub use error::{format_wait, Result, StoreError, SyncError};
pub use outcome::SyncOutcome;
pub use playlists::{PlaylistSyncMode, PlaylistSyncOptions, PlaylistSyncOrchestrator, PlaylistSyncSummary};
pub use progress::{PlaylistTally, ProgressCallback, ProgressEvent, ProgressReporter, SyncPhase};
pub use retry::{RetryExecutor, RetryPolicy};
pub use scrobbles::{FetchMode, ScrobbleSyncOptions, ScrobbleSyncOrchestrator, ScrobbleSyncSummary};
pub use sheets::{SheetWriter, SCROBBLES_SHEET};
pub use store::StateStore;
