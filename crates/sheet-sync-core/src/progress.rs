use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Phase of a sync run, in the order a run moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    DeterminingFetchStart,
    Fetching,
    FetchComplete,
    Diffing,
    Writing,
    Done,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase(SyncPhase),
    ScrobblePage {
        page: u32,
        total_fetched: usize,
        elapsed: Duration,
    },
    PlaylistsListed {
        count: usize,
    },
    VideoIdsFetched {
        index: usize,
        total: usize,
        title: String,
        count: usize,
    },
    VideoDetails {
        title: String,
        fetched: usize,
        total: usize,
    },
    PlaylistWritten {
        title: String,
        rows: usize,
    },
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Forwards events to an optional UI callback
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }

    pub fn phase(&self, phase: SyncPhase) {
        self.emit(ProgressEvent::Phase(phase));
    }
}

/// Per-playlist outcome counts for one YouTube run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaylistTally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub deleted: usize,
    pub rows_written: usize,
}

/// Counts playlist outcomes and logs periodic progress plus a final summary
pub struct PlaylistTracker {
    total: usize,
    tally: PlaylistTally,
    start_time: Instant,
    progress_interval: usize,
    processed: usize,
}

impl PlaylistTracker {
    pub fn new(total: usize, progress_interval: usize) -> Self {
        if total > 0 {
            info!("Starting playlist sync: {} playlists to check", total);
        }
        Self {
            total,
            tally: PlaylistTally::default(),
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
            processed: 0,
        }
    }

    pub fn record_created(&mut self, rows: usize) {
        self.tally.created += 1;
        self.tally.rows_written += rows;
        self.advance();
    }

    pub fn record_updated(&mut self, rows: usize) {
        self.tally.updated += 1;
        self.tally.rows_written += rows;
        self.advance();
    }

    pub fn record_unchanged(&mut self) {
        self.tally.unchanged += 1;
        self.advance();
    }

    /// Renames and deletions happen alongside other outcomes and do not advance progress
    pub fn record_renamed(&mut self) {
        self.tally.renamed += 1;
    }

    pub fn record_deleted(&mut self) {
        self.tally.deleted += 1;
    }

    fn advance(&mut self) {
        self.processed += 1;
        if self.processed % self.progress_interval == 0 && self.processed < self.total {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            info!(
                "Progress: {}/{} playlists ({:.1}s elapsed)",
                self.processed, self.total, elapsed
            );
        }
    }

    pub fn log_summary(&self) {
        let t = &self.tally;
        info!(
            "Playlist sync finished in {:.1}s: {} created, {} updated, {} unchanged, {} renamed, {} deleted, {} rows written",
            self.start_time.elapsed().as_secs_f64(),
            t.created,
            t.updated,
            t.unchanged,
            t.renamed,
            t.deleted,
            t.rows_written
        );
    }

    pub fn into_tally(self) -> PlaylistTally {
        self.tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reporter_forwards_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |event: &ProgressEvent| {
            if let ProgressEvent::Phase(phase) = event {
                sink.lock().unwrap().push(*phase);
            }
        }));

        reporter.phase(SyncPhase::Fetching);
        reporter.phase(SyncPhase::Done);
        assert_eq!(*seen.lock().unwrap(), vec![SyncPhase::Fetching, SyncPhase::Done]);
    }

    #[test]
    fn test_tracker_tally() {
        let mut tracker = PlaylistTracker::new(3, 1);
        tracker.record_created(10);
        tracker.record_updated(2);
        tracker.record_unchanged();
        tracker.record_renamed();
        tracker.log_summary();

        let tally = tracker.into_tally();
        assert_eq!(tally.created, 1);
        assert_eq!(tally.updated, 1);
        assert_eq!(tally.unchanged, 1);
        assert_eq!(tally.renamed, 1);
        assert_eq!(tally.rows_written, 12);
    }
}
