use chrono::Utc;
use serde::Serialize;
use sheet_sync_models::{
    PlaylistRename, PlaylistSnapshot, PlaylistSummary, YouTubeFetchState, YouTubePlaylist,
    YouTubeVideo,
};
use sheet_sync_sources::{PlaylistSource, SpreadsheetClient};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::diff;
use crate::error::{Result, SyncError};
use crate::outcome::{interrupted_on_cancel, SyncOutcome};
use crate::progress::{PlaylistTally, PlaylistTracker, ProgressEvent, ProgressReporter, SyncPhase};
use crate::retry::RetryExecutor;
use crate::sheets::{sanitize_sheet_name, SheetWriter, PLAYLIST_HEADER};
use crate::store::{StateStore, YOUTUBE_STATE_KEY};

/// Largest ID batch the videos endpoint accepts
const VIDEO_BATCH_SIZE: usize = 50;
const PROGRESS_INTERVAL: usize = 10;
const PLAYLIST_ID_PREFIXES: [&str; 3] = ["PL", "UU", "FL"];

#[derive(Debug, Clone)]
pub struct PlaylistSyncOptions {
    pub spreadsheet_title: String,
    pub default_spreadsheet_id: Option<String>,
    /// Playlist IDs or titles; empty syncs everything
    pub selected: Vec<String>,
}

impl Default for PlaylistSyncOptions {
    fn default() -> Self {
        Self {
            spreadsheet_title: "YouTube Playlists".to_string(),
            default_spreadsheet_id: None,
            selected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistSyncMode {
    /// Fetch every playlist's video IDs, resumable per playlist
    Full,
    /// Compare cheap summaries against snapshots and touch only what changed
    Optimized,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSyncSummary {
    pub mode: PlaylistSyncMode,
    pub spreadsheet_id: String,
    pub playlists_seen: usize,
    pub tally: PlaylistTally,
}

/// How a playlist's sheet was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetUpdate {
    Created { rows: usize },
    Rewritten { rows: usize },
    Patched { appended: usize },
    Unchanged,
}

impl SheetUpdate {
    fn record(self, tracker: &mut PlaylistTracker) {
        match self {
            SheetUpdate::Created { rows } => tracker.record_created(rows),
            SheetUpdate::Rewritten { rows } => tracker.record_updated(rows),
            SheetUpdate::Patched { appended } => tracker.record_updated(appended),
            SheetUpdate::Unchanged => tracker.record_unchanged(),
        }
    }
}

pub struct PlaylistSyncOrchestrator {
    source: Arc<dyn PlaylistSource>,
    sheets: SheetWriter,
    store: StateStore,
    retry: RetryExecutor,
    progress: ProgressReporter,
}

impl PlaylistSyncOrchestrator {
    pub fn new(
        source: Arc<dyn PlaylistSource>,
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

    #[instrument(skip(self, options), fields(selected = options.selected.len()))]
    pub async fn run(&self, options: &PlaylistSyncOptions) -> Result<SyncOutcome<PlaylistSyncSummary>> {
        interrupted_on_cancel(self.run_inner(options).await, || self.interrupted_progress())
    }

    fn interrupted_progress(&self) -> String {
        let Ok(state) = self.store.load::<YouTubeFetchState>(YOUTUBE_STATE_KEY) else {
            return "stopped; run sync again to resume".to_string();
        };
        match (&state.cached_playlists, &state.current_playlist_id) {
            (_, Some(playlist_id)) => format!(
                "stopped in playlist {} after {} videos; run sync again to resume",
                playlist_id, state.current_playlist_videos_fetched
            ),
            (Some(playlists), None) => format!(
                "video IDs fetched for {}/{} playlists; run sync again to resume",
                state.video_id_fetch_index,
                playlists.len()
            ),
            (None, None) => format!(
                "{} playlists synced; run sync again to continue",
                state.playlist_snapshots.len()
            ),
        }
    }

    async fn run_inner(&self, options: &PlaylistSyncOptions) -> Result<SyncOutcome<PlaylistSyncSummary>> {
        let mut state: YouTubeFetchState = self.store.load(YOUTUBE_STATE_KEY)?;

        let spreadsheet_id = self
            .sheets
            .resolve_spreadsheet(
                state.spreadsheet_id.as_deref(),
                options.default_spreadsheet_id.as_deref(),
                &options.spreadsheet_title,
            )
            .await?;
        if state.spreadsheet_id.as_deref() != Some(spreadsheet_id.as_str()) {
            if !state.playlist_snapshots.is_empty() || state.fetch_complete {
                // snapshots describe sheets in the old spreadsheet
                warn!(
                    "Spreadsheet changed to {}; discarding {} playlist snapshots",
                    spreadsheet_id,
                    state.playlist_snapshots.len()
                );
                state = YouTubeFetchState::default();
            }
            state.spreadsheet_id = Some(spreadsheet_id.clone());
            self.save(&state)?;
        }

        let (mode, (tally, playlists_seen)) = if !options.selected.is_empty() {
            let result = self
                .run_selected(&mut state, &spreadsheet_id, &options.selected)
                .await?;
            (PlaylistSyncMode::Selected, result)
        } else if state.fetch_complete && !state.playlist_snapshots.is_empty() {
            let result = self.run_optimized(&mut state, &spreadsheet_id).await?;
            (PlaylistSyncMode::Optimized, result)
        } else {
            let result = self.run_full(&mut state, &spreadsheet_id).await?;
            (PlaylistSyncMode::Full, result)
        };

        self.progress.phase(SyncPhase::Done);
        Ok(SyncOutcome::Completed {
            summary: PlaylistSyncSummary {
                mode,
                spreadsheet_id,
                playlists_seen,
                tally,
            },
        })
    }

    /// Summary-based pass used once a full sync has completed
    async fn run_optimized(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
    ) -> Result<(PlaylistTally, usize)> {
        self.progress.phase(SyncPhase::Fetching);
        let summaries = self.list_playlists().await?;
        self.progress.emit(ProgressEvent::PlaylistsListed {
            count: summaries.len(),
        });

        self.progress.phase(SyncPhase::Diffing);
        let changes = diff::detect_optimized(&summaries, &state.playlist_snapshots);
        let mut tracker = PlaylistTracker::new(summaries.len(), PROGRESS_INTERVAL);

        if !changes.has_any_changes() {
            info!("No playlist changes since {}", state.last_checked);
            for _ in &summaries {
                tracker.record_unchanged();
            }
            state.last_checked = Utc::now();
            self.save(state)?;
            return Ok((tracker.into_tally(), summaries.len()));
        }
        info!(
            "Detected {} playlist changes: {} new, {} modified, {} renamed, {} deleted",
            changes.total(),
            changes.new_ids.len(),
            changes.modified_ids.len(),
            changes.renamed.len(),
            changes.deleted_ids.len()
        );

        self.progress.phase(SyncPhase::Writing);
        for playlist_id in &changes.deleted_ids {
            self.check_cancelled()?;
            self.delete_playlist(state, spreadsheet_id, playlist_id).await?;
            tracker.record_deleted();
        }

        for rename in &changes.renamed {
            self.check_cancelled()?;
            self.rename_playlist(state, spreadsheet_id, rename).await?;
            tracker.record_renamed();
        }

        let to_process: HashSet<&str> = changes
            .new_ids
            .iter()
            .chain(changes.modified_ids.iter())
            .map(String::as_str)
            .collect();

        for summary in &summaries {
            if !to_process.contains(summary.id.as_str()) {
                tracker.record_unchanged();
                continue;
            }
            self.check_cancelled()?;
            let mut playlist = YouTubePlaylist::from(summary.clone());
            playlist.video_ids = self.fetch_video_ids(&playlist.id).await?;
            self.process_playlist(state, spreadsheet_id, &playlist)
                .await?
                .record(&mut tracker);
        }

        if !changes.new_ids.is_empty() || !changes.renamed.is_empty() {
            self.sheets.reorder_alphabetically(spreadsheet_id).await?;
        }

        state.last_checked = Utc::now();
        self.save(state)?;
        tracker.log_summary();
        Ok((tracker.into_tally(), summaries.len()))
    }

    /// Two-phase sync: video IDs for every playlist (checkpointed per playlist),
    /// then diff and write only new or changed playlists
    async fn run_full(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
    ) -> Result<(PlaylistTally, usize)> {
        self.progress.phase(SyncPhase::Fetching);
        let mut playlists = match state.cached_playlists.clone() {
            Some(cached) => {
                info!(
                    "Resuming playlist fetch at {}/{}",
                    state.video_id_fetch_index,
                    cached.len()
                );
                cached
            }
            None => {
                let summaries = self.list_playlists().await?;
                self.check_cancelled()?;
                let playlists: Vec<YouTubePlaylist> =
                    summaries.into_iter().map(YouTubePlaylist::from).collect();
                state.cached_playlists = Some(playlists.clone());
                state.video_id_fetch_index = 0;
                self.save(state)?;
                playlists
            }
        };
        let total = playlists.len();
        self.progress.emit(ProgressEvent::PlaylistsListed { count: total });

        for index in state.video_id_fetch_index.min(total)..total {
            self.check_cancelled()?;
            let video_ids = self.fetch_video_ids(&playlists[index].id).await?;
            self.check_cancelled()?;

            debug!(
                playlist = %playlists[index].id,
                "Fetched {} video IDs for '{}'",
                video_ids.len(),
                playlists[index].title
            );
            playlists[index].video_ids = video_ids;
            state.cached_playlists = Some(playlists.clone());
            state.video_id_fetch_index = index + 1;
            self.save(state)?;

            self.progress.emit(ProgressEvent::VideoIdsFetched {
                index: index + 1,
                total,
                title: playlists[index].title.clone(),
                count: playlists[index].video_ids.len(),
            });
        }
        self.progress.phase(SyncPhase::FetchComplete);

        self.progress.phase(SyncPhase::Diffing);
        let changes = diff::detect_playlist_changes(&playlists, &state.playlist_snapshots);
        let renames: Vec<PlaylistRename> = playlists
            .iter()
            .filter_map(|playlist| {
                let snapshot = state.playlist_snapshots.get(&playlist.id)?;
                (snapshot.title != playlist.title).then(|| PlaylistRename {
                    playlist_id: playlist.id.clone(),
                    old_title: snapshot.title.clone(),
                    new_title: playlist.title.clone(),
                })
            })
            .collect();

        let mut to_write: HashSet<String> = changes
            .new_playlist_ids
            .iter()
            .chain(changes.modified_playlist_ids.iter())
            .cloned()
            .collect();
        // a playlist interrupted mid-write is finished even if its IDs match the snapshot
        if let Some(current) = &state.current_playlist_id {
            to_write.insert(current.clone());
        }

        self.progress.phase(SyncPhase::Writing);
        let mut tracker = PlaylistTracker::new(total, PROGRESS_INTERVAL);
        for playlist_id in &changes.deleted_playlist_ids {
            self.check_cancelled()?;
            self.delete_playlist(state, spreadsheet_id, playlist_id).await?;
            tracker.record_deleted();
        }
        for rename in &renames {
            self.check_cancelled()?;
            self.rename_playlist(state, spreadsheet_id, rename).await?;
            tracker.record_renamed();
        }

        for playlist in &playlists {
            if to_write.contains(&playlist.id) {
                self.check_cancelled()?;
                self.process_playlist(state, spreadsheet_id, playlist)
                    .await?
                    .record(&mut tracker);
            } else {
                // keep ETags current so the next optimized pass compares against them
                if let Some(snapshot) = state.playlist_snapshots.get_mut(&playlist.id) {
                    snapshot.etag = playlist.etag.clone();
                    snapshot.reported_video_count = playlist.video_count;
                }
                tracker.record_unchanged();
            }
        }

        self.sheets.cleanup_default_sheet(spreadsheet_id).await?;
        self.sheets.reorder_alphabetically(spreadsheet_id).await?;

        state.fetch_complete = true;
        state.cached_playlists = None;
        state.video_id_fetch_index = 0;
        state.clear_current_progress();
        state.last_checked = Utc::now();
        self.save(state)?;

        tracker.log_summary();
        Ok((tracker.into_tally(), total))
    }

    async fn run_selected(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
        identifiers: &[String],
    ) -> Result<(PlaylistTally, usize)> {
        let playlist_ids = resolve_identifiers(state, identifiers)?;
        let mut tracker = PlaylistTracker::new(playlist_ids.len(), 1);
        let mut reorder = false;

        self.progress.phase(SyncPhase::Fetching);
        for playlist_id in &playlist_ids {
            self.check_cancelled()?;
            let summary = self
                .retry
                .execute("youtube.playlist", || self.source.playlist_summary(playlist_id))
                .await?
                .ok_or_else(|| SyncError::PlaylistNotFound(playlist_id.clone()))?;

            let previous_title = state
                .playlist_snapshots
                .get(&summary.id)
                .map(|snapshot| snapshot.title.clone());
            match previous_title {
                Some(old_title) if old_title != summary.title => {
                    let rename = PlaylistRename {
                        playlist_id: summary.id.clone(),
                        old_title,
                        new_title: summary.title.clone(),
                    };
                    self.rename_playlist(state, spreadsheet_id, &rename).await?;
                    tracker.record_renamed();
                    reorder = true;
                }
                Some(_) => {}
                None => reorder = true,
            }

            let mut playlist = YouTubePlaylist::from(summary);
            playlist.video_ids = self.fetch_video_ids(&playlist.id).await?;
            self.progress.phase(SyncPhase::Writing);
            self.process_playlist(state, spreadsheet_id, &playlist)
                .await?
                .record(&mut tracker);
        }

        if reorder {
            self.sheets.reorder_alphabetically(spreadsheet_id).await?;
        }
        self.save(state)?;
        tracker.log_summary();
        Ok((tracker.into_tally(), playlist_ids.len()))
    }

    /// Fetches missing video details (resuming a checkpointed playlist), then
    /// brings the sheet in line with `playlist.video_ids` and replaces the snapshot
    async fn process_playlist(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
        playlist: &YouTubePlaylist,
    ) -> Result<SheetUpdate> {
        let ids = &playlist.video_ids;
        let sheet = sanitize_sheet_name(&playlist.title);

        let mut details: HashMap<String, YouTubeVideo> = self
            .store
            .load_playlist_cache(&playlist.title)?
            .into_iter()
            .map(|video| (video.video_id.clone(), video))
            .collect();

        let resume_from = if state.current_playlist_id.as_deref() == Some(playlist.id.as_str()) {
            let fetched = state.current_playlist_videos_fetched.min(ids.len());
            info!(
                "Resuming '{}' at video {}/{}",
                playlist.title,
                fetched,
                ids.len()
            );
            fetched
        } else {
            0
        };

        let mut position = resume_from;
        while position < ids.len() {
            let end = (position + VIDEO_BATCH_SIZE).min(ids.len());
            let missing: Vec<String> = ids[position..end]
                .iter()
                .filter(|id| !details.contains_key(*id))
                .cloned()
                .collect();

            if !missing.is_empty() {
                self.check_cancelled()?;
                let videos = self
                    .retry
                    .execute("youtube.videos", || self.source.videos(&missing))
                    .await?;
                self.check_cancelled()?;
                if videos.len() < missing.len() {
                    debug!(
                        playlist = %playlist.id,
                        "{} videos returned no details",
                        missing.len() - videos.len()
                    );
                }
                details.extend(videos.into_iter().map(|video| (video.video_id.clone(), video)));
            }

            position = end;
            self.store
                .save_playlist_cache(&playlist.title, &ordered_details(ids, &details))?;
            state.update_playlist_progress(&playlist.id, position);
            self.save(state)?;
            self.progress.emit(ProgressEvent::VideoDetails {
                title: playlist.title.clone(),
                fetched: position,
                total: ids.len(),
            });
        }

        let row_for = |id: &String| match details.get(id) {
            Some(video) => video.to_row(),
            None => YouTubeVideo::unavailable_row(id),
        };

        self.check_cancelled()?;
        let titles = self.sheets.sheet_titles(spreadsheet_id).await?;
        let sheet_exists = titles.iter().any(|t| *t == sheet);
        let stored_ids = state
            .playlist_snapshots
            .get(&playlist.id)
            .map(|snapshot| snapshot.video_ids.clone());

        let update = match stored_ids {
            Some(stored) if sheet_exists => {
                let changes = diff::detect(ids, &stored);
                if !changes.has_changes() {
                    SheetUpdate::Unchanged
                } else if changes.requires_full_rewrite
                    || !diff::append_preserves_order(ids, &stored, &changes)
                {
                    let rows: Vec<Vec<String>> = ids.iter().map(row_for).collect();
                    self.sheets
                        .rewrite(spreadsheet_id, &sheet, &PLAYLIST_HEADER, &rows)
                        .await?;
                    SheetUpdate::Rewritten { rows: rows.len() }
                } else {
                    self.sheets
                        .delete_rows(spreadsheet_id, &sheet, &changes.removed_row_indices)
                        .await?;
                    if !changes.removed_video_ids.is_empty() {
                        // the sheet no longer mirrors `stored`; a failed append must not
                        // replay the deletes. The old ETag keeps the playlist marked modified.
                        let removed: HashSet<&str> =
                            changes.removed_video_ids.iter().map(String::as_str).collect();
                        if let Some(snapshot) = state.playlist_snapshots.get_mut(&playlist.id) {
                            snapshot.video_ids.retain(|id| !removed.contains(id.as_str()));
                        }
                        self.save(state)?;
                    }
                    let added: Vec<Vec<String>> =
                        changes.added_video_ids.iter().map(row_for).collect();
                    self.sheets.append(spreadsheet_id, &sheet, &added).await?;
                    debug!(
                        playlist = %playlist.id,
                        "Removed {} rows, appended {}",
                        changes.removed_row_indices.len(),
                        added.len()
                    );
                    SheetUpdate::Patched {
                        appended: added.len(),
                    }
                }
            }
            _ => {
                let rows: Vec<Vec<String>> = ids.iter().map(row_for).collect();
                self.sheets
                    .rewrite(spreadsheet_id, &sheet, &PLAYLIST_HEADER, &rows)
                    .await?;
                SheetUpdate::Created { rows: rows.len() }
            }
        };

        state
            .playlist_snapshots
            .insert(playlist.id.clone(), PlaylistSnapshot::from_playlist(playlist));
        state.clear_current_progress();
        self.save(state)?;
        self.store
            .save_playlist_cache(&playlist.title, &ordered_details(ids, &details))?;

        if update != SheetUpdate::Unchanged {
            info!(playlist = %playlist.id, "Synced '{}' ({} videos)", playlist.title, ids.len());
        }
        self.progress.emit(ProgressEvent::PlaylistWritten {
            title: playlist.title.clone(),
            rows: ids.len(),
        });
        Ok(update)
    }

    /// Archives the local cache before removing the sheet and snapshot
    async fn delete_playlist(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
        playlist_id: &str,
    ) -> Result<()> {
        let Some(snapshot) = state.playlist_snapshots.get(playlist_id).cloned() else {
            return Ok(());
        };

        if let Some(archived) = self.store.archive_playlist_cache(&snapshot.title)? {
            debug!("Archived cache for '{}' at {}", snapshot.title, archived.display());
        }
        self.sheets
            .delete_sheet(spreadsheet_id, &sanitize_sheet_name(&snapshot.title))
            .await?;

        state.playlist_snapshots.remove(playlist_id);
        self.save(state)?;
        info!("Removed deleted playlist '{}'", snapshot.title);
        Ok(())
    }

    async fn rename_playlist(
        &self,
        state: &mut YouTubeFetchState,
        spreadsheet_id: &str,
        rename: &PlaylistRename,
    ) -> Result<()> {
        let old_sheet = sanitize_sheet_name(&rename.old_title);
        let new_sheet = sanitize_sheet_name(&rename.new_title);

        if old_sheet != new_sheet {
            let titles = self.sheets.sheet_titles(spreadsheet_id).await?;
            let has_old = titles.iter().any(|t| *t == old_sheet);
            let has_new = titles.iter().any(|t| *t == new_sheet);
            if has_old && !has_new {
                self.sheets
                    .rename_sheet(spreadsheet_id, &old_sheet, &new_sheet)
                    .await?;
            } else {
                warn!(
                    "Cannot rename sheet '{}' to '{}' (source missing or target exists)",
                    old_sheet, new_sheet
                );
            }
        }

        self.store
            .rename_playlist_cache(&rename.old_title, &rename.new_title)?;
        if let Some(snapshot) = state.playlist_snapshots.get_mut(&rename.playlist_id) {
            snapshot.title = rename.new_title.clone();
        }
        self.save(state)?;
        info!("Renamed playlist '{}' -> '{}'", rename.old_title, rename.new_title);
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            self.check_cancelled()?;
            let page = self
                .retry
                .execute("youtube.playlists", || {
                    self.source.playlists_page(page_token.as_deref())
                })
                .await?;
            playlists.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!("Listed {} playlists", playlists.len());
        Ok(playlists)
    }

    async fn fetch_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            self.check_cancelled()?;
            let page = self
                .retry
                .execute("youtube.playlist_items", || {
                    self.source
                        .playlist_items_page(playlist_id, page_token.as_deref())
                })
                .await?;
            video_ids.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(video_ids)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.retry.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn save(&self, state: &YouTubeFetchState) -> Result<()> {
        self.store.save(YOUTUBE_STATE_KEY, state)?;
        Ok(())
    }
}

/// Deletes the playlist spreadsheet; snapshots are reset since their sheets are gone
pub async fn clear_remote(sheets: &SheetWriter, store: &StateStore) -> Result<Option<String>> {
    let state: YouTubeFetchState = store.load(YOUTUBE_STATE_KEY)?;
    let Some(spreadsheet_id) = state.spreadsheet_id else {
        return Ok(None);
    };
    sheets.delete_spreadsheet(&spreadsheet_id).await?;
    if store.exists(YOUTUBE_STATE_KEY) {
        store.save(YOUTUBE_STATE_KEY, &YouTubeFetchState::default())?;
    }
    Ok(Some(spreadsheet_id))
}

/// Removes the fetch state and every playlist cache, archived ones included
pub fn clear_local(store: &StateStore) -> Result<()> {
    store.delete_youtube_state()?;
    Ok(())
}

/// Cached details in playlist order, one entry per distinct known video
fn ordered_details(ids: &[String], details: &HashMap<String, YouTubeVideo>) -> Vec<YouTubeVideo> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| details.get(id).cloned())
        .collect()
}

/// Maps user-supplied identifiers to playlist IDs: snapshot ID, title
/// (case-insensitive) or a raw playlist ID
fn resolve_identifiers(state: &YouTubeFetchState, identifiers: &[String]) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = Vec::new();
    for identifier in identifiers {
        let identifier = identifier.trim();
        let wanted = identifier.to_lowercase();

        let by_title = state
            .playlist_snapshots
            .values()
            .find(|snapshot| snapshot.title.to_lowercase() == wanted)
            .map(|snapshot| snapshot.playlist_id.clone())
            .or_else(|| {
                state
                    .cached_playlists
                    .iter()
                    .flatten()
                    .find(|playlist| playlist.title.to_lowercase() == wanted)
                    .map(|playlist| playlist.id.clone())
            });

        let playlist_id = if state.playlist_snapshots.contains_key(identifier) {
            identifier.to_string()
        } else if let Some(id) = by_title {
            id
        } else if PLAYLIST_ID_PREFIXES.iter().any(|p| identifier.starts_with(p)) {
            identifier.to_string()
        } else {
            return Err(SyncError::PlaylistNotFound(identifier.to_string()));
        };

        if !resolved.contains(&playlist_id) {
            resolved.push(playlist_id);
        }
    }
    Ok(resolved)
}
