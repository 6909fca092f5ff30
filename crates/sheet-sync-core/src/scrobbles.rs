use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sheet_sync_models::{FetchState, Scrobble};
use sheet_sync_sources::{ScrobbleSource, SpreadsheetClient};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{Result, SyncError};
use crate::outcome::{interrupted_on_cancel, SyncOutcome};
use crate::progress::{ProgressEvent, ProgressReporter, SyncPhase};
use crate::retry::RetryExecutor;
use crate::sheets::{SheetWriter, SCROBBLES_SHEET, SCROBBLE_HEADER};
use crate::store::{StateStore, SCROBBLES_KEY, SCROBBLE_STATE_KEY};

#[derive(Debug, Clone)]
pub struct ScrobbleSyncOptions {
    /// Re-sync everything played on or after this date
    pub force_from: Option<NaiveDate>,
    pub page_size: u32,
    pub spreadsheet_title: String,
    pub default_spreadsheet_id: Option<String>,
}

impl Default for ScrobbleSyncOptions {
    fn default() -> Self {
        Self {
            force_from: None,
            page_size: 200,
            spreadsheet_title: "last.fm scrobbles".to_string(),
            default_spreadsheet_id: None,
        }
    }
}

/// Where a run starts fetching
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchMode {
    Full,
    Resume { from_page: u32 },
    Incremental { after: DateTime<Utc> },
    Forced { from: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrobbleSyncSummary {
    pub spreadsheet_id: String,
    pub mode: FetchMode,
    /// New scrobbles fetched during this run
    pub fetched: usize,
    pub last_page: u32,
    pub rows_written: usize,
}

struct FetchPlan {
    mode: FetchMode,
    start_page: u32,
    start_total: usize,
    after: Option<DateTime<Utc>>,
}

pub struct ScrobbleSyncOrchestrator {
    source: Arc<dyn ScrobbleSource>,
    sheets: SheetWriter,
    store: StateStore,
    retry: RetryExecutor,
    progress: ProgressReporter,
}

impl ScrobbleSyncOrchestrator {
    pub fn new(
        source: Arc<dyn ScrobbleSource>,
        sheets: Arc<dyn SpreadsheetClient>,
        store: StateStore,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            source,
            sheets: SheetWriter::new(sheets, retry.clone()),
            store,
            retry,
            progress: ProgressReporter::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    #[instrument(skip(self, options), fields(force_from = ?options.force_from))]
    pub async fn run(&self, options: &ScrobbleSyncOptions) -> Result<SyncOutcome<ScrobbleSyncSummary>> {
        interrupted_on_cancel(self.run_inner(options).await, || self.interrupted_progress())
    }

    fn interrupted_progress(&self) -> String {
        match self.store.load::<FetchState>(SCROBBLE_STATE_KEY) {
            Ok(state) => format!(
                "stopped after page {} ({} scrobbles fetched); run sync again to resume",
                state.last_page, state.total_fetched
            ),
            Err(_) => "stopped; run sync again to resume".to_string(),
        }
    }

    async fn run_inner(&self, options: &ScrobbleSyncOptions) -> Result<SyncOutcome<ScrobbleSyncSummary>> {
        let page_size = options.page_size.clamp(1, 200);
        let mut state: FetchState = self.store.load(SCROBBLE_STATE_KEY)?;

        let spreadsheet_id = self
            .sheets
            .resolve_spreadsheet(
                state.spreadsheet_id.as_deref(),
                options.default_spreadsheet_id.as_deref(),
                &options.spreadsheet_title,
            )
            .await?;
        self.sheets
            .ensure_sheet(&spreadsheet_id, SCROBBLES_SHEET, &SCROBBLE_HEADER)
            .await?;
        if state.spreadsheet_id.as_deref() != Some(spreadsheet_id.as_str()) {
            state.spreadsheet_id = Some(spreadsheet_id.clone());
            self.store.save(SCROBBLE_STATE_KEY, &state)?;
        }

        self.progress.phase(SyncPhase::DeterminingFetchStart);
        let plan = self.plan_fetch(&mut state, &spreadsheet_id, options).await?;
        info!(mode = ?plan.mode, "Starting scrobble fetch at page {}", plan.start_page);

        self.progress.phase(SyncPhase::Fetching);
        let fetched = match self.fetch(&mut state, &plan, page_size).await? {
            Some(fetched) => fetched,
            None => return Ok(SyncOutcome::Interrupted {
                progress: self.interrupted_progress(),
            }),
        };
        self.progress.phase(SyncPhase::FetchComplete);

        self.progress.phase(SyncPhase::Diffing);
        let latest_in_sheet = self.sheets.latest_scrobble_time(&spreadsheet_id).await?;
        let cached: Vec<Scrobble> = self.store.load(SCROBBLES_KEY)?;
        let mut pending: Vec<Scrobble> = cached
            .into_iter()
            .filter(|s| match (latest_in_sheet, s.played_at) {
                (None, _) => true,
                (Some(latest), Some(played_at)) => played_at > latest,
                (Some(_), None) => false,
            })
            .collect();
        pending.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        debug!(pending = pending.len(), latest = ?latest_in_sheet, "Scrobbles to write");

        if self.retry.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.progress.phase(SyncPhase::Writing);
        let rows: Vec<Vec<String>> = pending.iter().map(Scrobble::to_row).collect();
        self.sheets
            .insert_below_header(&spreadsheet_id, SCROBBLES_SHEET, &rows)
            .await?;
        info!("Wrote {} scrobbles to '{}'", rows.len(), SCROBBLES_SHEET);

        self.progress.phase(SyncPhase::Done);
        Ok(SyncOutcome::Completed {
            summary: ScrobbleSyncSummary {
                spreadsheet_id,
                mode: plan.mode,
                fetched,
                last_page: state.last_page,
                rows_written: rows.len(),
            },
        })
    }

    async fn plan_fetch(
        &self,
        state: &mut FetchState,
        spreadsheet_id: &str,
        options: &ScrobbleSyncOptions,
    ) -> Result<FetchPlan> {
        if let Some(date) = options.force_from {
            let from = date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .ok_or_else(|| SyncError::Config(format!("Invalid date {}", date)))?;

            let deleted = self.sheets.delete_scrobbles_on_or_after(spreadsheet_id, from).await?;
            info!("Forced re-sync from {}: removed {} sheet rows", date, deleted);

            *state = FetchState::new(Some(spreadsheet_id.to_string()));
            self.store.save(SCROBBLE_STATE_KEY, &*state)?;
            self.store.delete(SCROBBLES_KEY)?;

            return Ok(FetchPlan {
                mode: FetchMode::Forced { from },
                start_page: 1,
                start_total: 0,
                after: Some(from - Duration::seconds(1)),
            });
        }

        if !state.fetch_complete && state.last_page > 0 {
            let from_page = state.last_page + 1;
            info!(
                "Resuming interrupted fetch at page {} ({} scrobbles so far)",
                from_page, state.total_fetched
            );
            return Ok(FetchPlan {
                mode: FetchMode::Resume { from_page },
                start_page: from_page,
                start_total: state.total_fetched,
                after: None,
            });
        }

        let cached: Vec<Scrobble> = self.store.load(SCROBBLES_KEY)?;
        let newest_cached = cached.iter().filter_map(|s| s.played_at).max();
        let after = match newest_cached {
            Some(newest) => Some(newest),
            None => self.sheets.latest_scrobble_time(spreadsheet_id).await?,
        };

        *state = FetchState::new(Some(spreadsheet_id.to_string()));
        self.store.save(SCROBBLE_STATE_KEY, &*state)?;

        Ok(match after {
            Some(after) => FetchPlan {
                mode: FetchMode::Incremental { after },
                start_page: 1,
                start_total: 0,
                after: Some(after),
            },
            None => FetchPlan {
                mode: FetchMode::Full,
                start_page: 1,
                start_total: 0,
                after: None,
            },
        })
    }

    /// Page loop; returns scrobbles fetched this run, or `None` when cancelled.
    /// Each page is merged into the cache and checkpointed before the next request.
    async fn fetch(&self, state: &mut FetchState, plan: &FetchPlan, page_size: u32) -> Result<Option<usize>> {
        let started = Instant::now();
        let mut page = plan.start_page;
        let mut total = plan.start_total;
        let mut fetched = 0;

        loop {
            if self.retry.is_cancelled() {
                return Ok(None);
            }

            let batch = self
                .retry
                .execute("lastfm.recent_tracks", || self.source.recent_tracks_page(page, page_size))
                .await?;

            if self.retry.is_cancelled() {
                return Ok(None);
            }

            if batch.is_empty() {
                debug!(page, "Empty page, fetch complete");
                break;
            }

            let fresh: Vec<Scrobble> = match plan.after {
                Some(after) => batch
                    .iter()
                    .filter(|s| s.played_at.map_or(false, |played_at| played_at > after))
                    .cloned()
                    .collect(),
                None => batch.clone(),
            };
            if fresh.is_empty() {
                debug!(page, "No scrobbles newer than cutoff, fetch complete");
                break;
            }

            self.merge_into_cache(&fresh)?;
            total += fresh.len();
            fetched += fresh.len();

            let oldest = fresh.iter().filter_map(|s| s.played_at).min();
            let newest = fresh.iter().filter_map(|s| s.played_at).max();
            state.update(page, total, oldest, newest);
            self.store.save(SCROBBLE_STATE_KEY, &*state)?;

            self.progress.emit(ProgressEvent::ScrobblePage {
                page,
                total_fetched: total,
                elapsed: started.elapsed(),
            });
            debug!(page, total, "Checkpointed scrobble page");

            if fresh.len() < batch.len() || batch.len() < page_size as usize {
                break;
            }
            page += 1;
        }

        state.fetch_complete = true;
        self.store.save(SCROBBLE_STATE_KEY, &*state)?;
        info!("Fetch complete: {} new scrobbles (last page {})", fetched, state.last_page);
        Ok(Some(fetched))
    }

    /// New scrobbles go in front of the cache; entries whose timestamp is
    /// already cached are dropped
    fn merge_into_cache(&self, fresh: &[Scrobble]) -> Result<()> {
        let existing: Vec<Scrobble> = self.store.load(SCROBBLES_KEY)?;
        let known: HashSet<Option<DateTime<Utc>>> = existing.iter().map(|s| s.played_at).collect();

        let mut merged: Vec<Scrobble> = fresh
            .iter()
            .filter(|s| !known.contains(&s.played_at))
            .cloned()
            .collect();
        merged.extend(existing);
        self.store.save(SCROBBLES_KEY, &merged)?;
        Ok(())
    }
}

/// Deletes the scrobble spreadsheet and forgets it; returns the deleted ID
pub async fn clear_remote(sheets: &SheetWriter, store: &StateStore) -> Result<Option<String>> {
    let mut state: FetchState = store.load(SCROBBLE_STATE_KEY)?;
    let Some(spreadsheet_id) = state.spreadsheet_id.take() else {
        return Ok(None);
    };
    sheets.delete_spreadsheet(&spreadsheet_id).await?;
    if store.exists(SCROBBLE_STATE_KEY) {
        store.save(SCROBBLE_STATE_KEY, &state)?;
    }
    Ok(Some(spreadsheet_id))
}

/// Removes the fetch state and the scrobble cache
pub fn clear_local(store: &StateStore) -> Result<()> {
    store.delete_lastfm_state()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_retry, scrobble, FakeScrobbleSource, FakeSheets};
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const BASE_TS: i64 = 1_700_000_000;

    /// `count` scrobbles, newest first, starting `offset` minutes before BASE_TS
    fn page(offset: i64, count: i64) -> Vec<Scrobble> {
        (0..count)
            .map(|i| scrobble(BASE_TS - (offset + i) * 60, &format!("Track {}", offset + i)))
            .collect()
    }

    fn orchestrator(
        source: Arc<FakeScrobbleSource>,
        sheets: Arc<FakeSheets>,
        store: StateStore,
        cancel: CancellationToken,
    ) -> ScrobbleSyncOrchestrator {
        ScrobbleSyncOrchestrator::new(source, sheets, store, fast_retry(cancel))
    }

    #[tokio::test]
    async fn test_full_sync_writes_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let source = Arc::new(FakeScrobbleSource::new(vec![(1, page(0, 200)), (2, page(200, 50))]));
        let sheets = Arc::new(FakeSheets::default());

        let outcome = orchestrator(source.clone(), sheets.clone(), store.clone(), CancellationToken::new())
            .run(&ScrobbleSyncOptions::default())
            .await
            .unwrap();

        let summary = outcome.completed().unwrap();
        assert_eq!(summary.mode, FetchMode::Full);
        assert_eq!(summary.fetched, 250);
        assert_eq!(summary.rows_written, 250);
        // short second page ends the fetch without requesting page 3
        assert_eq!(source.requested_pages(), vec![1, 2]);

        let rows = sheets.rows(&summary.spreadsheet_id, SCROBBLES_SHEET);
        assert_eq!(rows[0], SCROBBLE_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        assert_eq!(rows.len(), 251);
        assert_eq!(rows[1][1], "Track 0");
        assert_eq!(rows[250][1], "Track 249");

        let state: FetchState = store.load(SCROBBLE_STATE_KEY).unwrap();
        assert!(state.fetch_complete);
        assert_eq!(state.last_page, 2);
        assert_eq!(state.spreadsheet_id.as_deref(), Some(summary.spreadsheet_id.as_str()));
    }

    #[tokio::test]
    async fn test_resume_continues_after_last_page() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());
        let spreadsheet_id = sheets.create_with_sheet("last.fm scrobbles", SCROBBLES_SHEET, &SCROBBLE_HEADER);

        let mut state = FetchState::new(Some(spreadsheet_id.clone()));
        state.update(3, 600, None, None);
        store.save(SCROBBLE_STATE_KEY, &state).unwrap();
        store.save(SCROBBLES_KEY, &page(0, 600)).unwrap();

        let source = Arc::new(FakeScrobbleSource::new(vec![
            (4, page(600, 200)),
            (5, page(800, 200)),
            (6, Vec::new()),
        ]));

        let outcome = orchestrator(source.clone(), sheets.clone(), store.clone(), CancellationToken::new())
            .run(&ScrobbleSyncOptions::default())
            .await
            .unwrap();

        assert_eq!(source.requested_pages(), vec![4, 5, 6]);
        let state: FetchState = store.load(SCROBBLE_STATE_KEY).unwrap();
        assert_eq!(state.last_page, 5);
        assert_eq!(state.total_fetched, 1000);
        assert!(state.fetch_complete);

        let cache: Vec<Scrobble> = store.load(SCROBBLES_KEY).unwrap();
        assert_eq!(cache.len(), 1000);

        let summary = outcome.completed().unwrap();
        assert_eq!(summary.mode, FetchMode::Resume { from_page: 4 });
        assert_eq!(summary.fetched, 400);
    }

    #[tokio::test]
    async fn test_incremental_writes_only_newer_than_sheet() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());
        let spreadsheet_id = sheets.create_with_sheet("last.fm scrobbles", SCROBBLES_SHEET, &SCROBBLE_HEADER);

        // sheet already holds everything up to Track 2
        let existing: Vec<Vec<String>> = page(2, 3).iter().map(Scrobble::to_row).collect();
        sheets.append_rows(&spreadsheet_id, SCROBBLES_SHEET, existing);

        let source = Arc::new(FakeScrobbleSource::new(vec![(1, page(0, 200))]));
        let outcome = orchestrator(source.clone(), sheets.clone(), store.clone(), CancellationToken::new())
            .run(&ScrobbleSyncOptions {
                default_spreadsheet_id: Some(spreadsheet_id.clone()),
                ..ScrobbleSyncOptions::default()
            })
            .await
            .unwrap();

        let summary = outcome.completed().unwrap();
        assert!(matches!(summary.mode, FetchMode::Incremental { .. }));
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.rows_written, 2);

        let rows = sheets.rows(&spreadsheet_id, SCROBBLES_SHEET);
        let titles: Vec<&str> = rows[1..].iter().map(|r| r[1].as_str()).collect();
        assert_eq!(titles, vec!["Track 0", "Track 1", "Track 2", "Track 3", "Track 4"]);
    }

    #[tokio::test]
    async fn test_cached_scrobbles_set_incremental_cutoff() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());

        let mut state = FetchState::default();
        state.fetch_complete = true;
        state.last_page = 9;
        store.save(SCROBBLE_STATE_KEY, &state).unwrap();
        store.save(SCROBBLES_KEY, &page(5, 10)).unwrap();

        let source = Arc::new(FakeScrobbleSource::new(vec![(1, page(0, 200))]));
        let outcome = orchestrator(source, sheets, store.clone(), CancellationToken::new())
            .run(&ScrobbleSyncOptions::default())
            .await
            .unwrap();

        let summary = outcome.completed().unwrap();
        let newest_cached = Utc.timestamp_opt(BASE_TS - 5 * 60, 0).unwrap();
        assert_eq!(summary.mode, FetchMode::Incremental { after: newest_cached });
        assert_eq!(summary.fetched, 5);
        // new sheet: the whole cache is written
        assert_eq!(summary.rows_written, 15);
    }

    #[tokio::test]
    async fn test_cancel_mid_fetch_keeps_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());
        let cancel = CancellationToken::new();

        let source = Arc::new(
            FakeScrobbleSource::new(vec![(1, page(0, 200)), (2, page(200, 200)), (3, page(400, 200))])
                .cancel_after_page(2, cancel.clone()),
        );

        let outcome = orchestrator(source.clone(), sheets, store.clone(), cancel)
            .run(&ScrobbleSyncOptions::default())
            .await
            .unwrap();

        assert!(matches!(outcome, SyncOutcome::Interrupted { .. }));
        let state: FetchState = store.load(SCROBBLE_STATE_KEY).unwrap();
        // page 2 arrived after cancellation and is not checkpointed
        assert_eq!(state.last_page, 1);
        assert_eq!(state.total_fetched, 200);
        assert!(!state.fetch_complete);
        assert_eq!(source.requested_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_force_from_replaces_rows_on_or_after_date() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());
        let spreadsheet_id = sheets.create_with_sheet("last.fm scrobbles", SCROBBLES_SHEET, &SCROBBLE_HEADER);

        let day = |d: u32, h: u32| scrobble(Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap().timestamp(), &format!("{}-{}", d, h));
        let existing = vec![day(3, 9), day(2, 9), day(1, 9)];
        sheets.append_rows(&spreadsheet_id, SCROBBLES_SHEET, existing.iter().map(Scrobble::to_row).collect());
        store.save(SCROBBLES_KEY, &existing).unwrap();

        let source = Arc::new(FakeScrobbleSource::new(vec![(1, vec![day(3, 10), day(3, 9), day(2, 9), day(1, 9)])]));
        let outcome = orchestrator(source, sheets.clone(), store.clone(), CancellationToken::new())
            .run(&ScrobbleSyncOptions {
                force_from: NaiveDate::from_ymd_opt(2024, 3, 2),
                default_spreadsheet_id: Some(spreadsheet_id.clone()),
                ..ScrobbleSyncOptions::default()
            })
            .await
            .unwrap();

        let summary = outcome.completed().unwrap();
        assert_eq!(summary.fetched, 3);

        let rows = sheets.rows(&spreadsheet_id, SCROBBLES_SHEET);
        let titles: Vec<&str> = rows[1..].iter().map(|r| r[1].as_str()).collect();
        assert_eq!(titles, vec!["3-10", "3-9", "2-9", "1-9"]);
    }

    #[tokio::test]
    async fn test_clear_remote_forgets_spreadsheet() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let sheets = Arc::new(FakeSheets::default());
        let spreadsheet_id = sheets.create_with_sheet("last.fm scrobbles", SCROBBLES_SHEET, &SCROBBLE_HEADER);
        store.save(SCROBBLE_STATE_KEY, &FetchState::new(Some(spreadsheet_id.clone()))).unwrap();

        let writer = SheetWriter::new(sheets.clone(), fast_retry(CancellationToken::new()));
        assert_eq!(clear_remote(&writer, &store).await.unwrap(), Some(spreadsheet_id.clone()));
        assert!(!sheets.exists(&spreadsheet_id));

        let state: FetchState = store.load(SCROBBLE_STATE_KEY).unwrap();
        assert!(state.spreadsheet_id.is_none());
    }
}
