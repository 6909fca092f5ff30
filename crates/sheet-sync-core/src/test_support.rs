//! In-memory sources and spreadsheet used by the orchestrator tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sheet_sync_models::{PlaylistSummary, Scrobble, YouTubeVideo};
use sheet_sync_sources::{
    Page, PlaylistSource, ScrobbleSource, SourceError, SpreadsheetClient,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryExecutor, RetryPolicy};

pub fn fast_retry(cancel: CancellationToken) -> RetryExecutor {
    RetryExecutor::new(
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            throttle: Duration::ZERO,
        },
        cancel,
    )
}

pub fn scrobble(timestamp: i64, track: &str) -> Scrobble {
    Scrobble {
        track_name: track.to_string(),
        artist_name: "Artist".to_string(),
        album_name: "Album".to_string(),
        played_at: Utc.timestamp_opt(timestamp, 0).single(),
    }
}

pub fn video(id: &str) -> YouTubeVideo {
    YouTubeVideo {
        title: format!("Video {}", id),
        description: String::new(),
        duration_secs: 61,
        channel_name: "Channel".to_string(),
        video_id: id.to_string(),
        channel_id: "UC1".to_string(),
    }
}

pub fn daily_quota_error() -> SourceError {
    SourceError::http(403, "The request cannot be completed because you have exceeded your quota. Daily Limit Exceeded")
}

pub struct FakeScrobbleSource {
    pages: HashMap<u32, Vec<Scrobble>>,
    requested: Mutex<Vec<u32>>,
    cancel_after: Option<(u32, CancellationToken)>,
}

impl FakeScrobbleSource {
    /// Pages not listed come back empty
    pub fn new(pages: Vec<(u32, Vec<Scrobble>)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            requested: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    /// Cancels `token` right after serving `page`, like Ctrl-C mid-request
    pub fn cancel_after_page(mut self, page: u32, token: CancellationToken) -> Self {
        self.cancel_after = Some((page, token));
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrobbleSource for FakeScrobbleSource {
    async fn recent_tracks_page(&self, page: u32, _limit: u32) -> Result<Vec<Scrobble>, SourceError> {
        self.requested.lock().unwrap().push(page);
        if let Some((cancel_page, token)) = &self.cancel_after {
            if *cancel_page == page {
                token.cancel();
            }
        }
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct FakePlaylist {
    pub summary: PlaylistSummary,
    pub video_ids: Vec<String>,
}

pub fn playlist(id: &str, title: &str, etag: &str, video_ids: &[&str]) -> FakePlaylist {
    FakePlaylist {
        summary: PlaylistSummary {
            id: id.to_string(),
            title: title.to_string(),
            video_count: video_ids.len(),
            etag: Some(etag.to_string()),
        },
        video_ids: video_ids.iter().map(|v| v.to_string()).collect(),
    }
}

#[derive(Default)]
struct PlaylistSourceState {
    playlists: Vec<FakePlaylist>,
    unavailable: HashSet<String>,
    video_batches: Vec<Vec<String>>,
    items_requests: Vec<String>,
    fail_videos_on_call: Option<usize>,
}

/// Item pages hold `page_size` IDs; page tokens are stringified offsets
pub struct FakePlaylistSource {
    state: Mutex<PlaylistSourceState>,
    page_size: usize,
}

impl FakePlaylistSource {
    pub fn new(playlists: Vec<FakePlaylist>) -> Self {
        Self {
            state: Mutex::new(PlaylistSourceState {
                playlists,
                ..PlaylistSourceState::default()
            }),
            page_size: 50,
        }
    }

    pub fn set_playlists(&self, playlists: Vec<FakePlaylist>) {
        self.state.lock().unwrap().playlists = playlists;
    }

    /// Videos that exist in playlists but return no details (private or deleted)
    pub fn mark_unavailable(&self, video_id: &str) {
        self.state.lock().unwrap().unavailable.insert(video_id.to_string());
    }

    /// The `n`-th call to `videos` (1-based) fails with a daily quota error
    pub fn fail_videos_on_call(&self, n: usize) {
        self.state.lock().unwrap().fail_videos_on_call = Some(n);
    }

    pub fn video_batches(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().video_batches.clone()
    }

    pub fn items_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().items_requests.clone()
    }
}

#[async_trait]
impl PlaylistSource for FakePlaylistSource {
    async fn playlists_page(
        &self,
        _page_token: Option<&str>,
    ) -> Result<Page<PlaylistSummary>, SourceError> {
        let state = self.state.lock().unwrap();
        Ok(Page::last(state.playlists.iter().map(|p| p.summary.clone()).collect()))
    }

    async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.items_requests.push(playlist_id.to_string());
        let Some(playlist) = state.playlists.iter().find(|p| p.summary.id == playlist_id) else {
            return Err(SourceError::http(404, "playlistNotFound"));
        };

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(playlist.video_ids.len());
        let items = playlist.video_ids[offset.min(end)..end].to_vec();
        let next_page_token = (end < playlist.video_ids.len()).then(|| end.to_string());
        Ok(Page { items, next_page_token })
    }

    async fn videos(&self, video_ids: &[String]) -> Result<Vec<YouTubeVideo>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.video_batches.push(video_ids.to_vec());
        if state.fail_videos_on_call == Some(state.video_batches.len()) {
            return Err(daily_quota_error());
        }
        Ok(video_ids
            .iter()
            .filter(|id| !state.unavailable.contains(*id))
            .map(|id| video(id))
            .collect())
    }

    async fn playlist_summary(
        &self,
        playlist_id: &str,
    ) -> Result<Option<PlaylistSummary>, SourceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .playlists
            .iter()
            .find(|p| p.summary.id == playlist_id)
            .map(|p| p.summary.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct FakeSheet {
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct SheetsState {
    spreadsheets: HashMap<String, Vec<FakeSheet>>,
    created: usize,
    calls: Vec<String>,
    fail_next_append: bool,
}

/// Spreadsheet store with just enough A1 handling for the ranges the writer uses
#[derive(Default)]
pub struct FakeSheets {
    state: Mutex<SheetsState>,
}

impl FakeSheets {
    /// New spreadsheet holding one sheet with a header row
    pub fn create_with_sheet(&self, title: &str, sheet: &str, header: &[&str]) -> String {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        let id = format!("{}-{}", title.replace(' ', "-"), state.created);
        state.spreadsheets.insert(
            id.clone(),
            vec![FakeSheet {
                title: sheet.to_string(),
                rows: vec![header.iter().map(|h| h.to_string()).collect()],
            }],
        );
        id
    }

    pub fn append_rows(&self, spreadsheet_id: &str, sheet: &str, rows: Vec<Vec<String>>) {
        let mut state = self.state.lock().unwrap();
        if let Some(target) = find_sheet(&mut state, spreadsheet_id, sheet) {
            target.rows.extend(rows);
        }
    }

    pub fn rows(&self, spreadsheet_id: &str, sheet: &str) -> Vec<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        find_sheet(&mut state, spreadsheet_id, sheet)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    pub fn titles(&self, spreadsheet_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .spreadsheets
            .get(spreadsheet_id)
            .map(|sheets| sheets.iter().map(|s| s.title.clone()).collect())
            .unwrap_or_default()
    }

    pub fn exists(&self, spreadsheet_id: &str) -> bool {
        self.state.lock().unwrap().spreadsheets.contains_key(spreadsheet_id)
    }

    /// Mutating calls so far, as `op:sheet`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// The next append fails with a daily-quota error
    pub fn fail_next_append(&self) {
        self.state.lock().unwrap().fail_next_append = true;
    }
}

fn find_sheet<'a>(state: &'a mut SheetsState, spreadsheet_id: &str, sheet: &str) -> Option<&'a mut FakeSheet> {
    state
        .spreadsheets
        .get_mut(spreadsheet_id)?
        .iter_mut()
        .find(|s| s.title == sheet)
}

fn sheet_mut<'a>(
    state: &'a mut SheetsState,
    spreadsheet_id: &str,
    sheet: &str,
) -> Result<&'a mut FakeSheet, SourceError> {
    find_sheet(state, spreadsheet_id, sheet)
        .ok_or_else(|| SourceError::http(400, format!("Unable to parse range: {}", sheet)))
}

/// Parsed A1 range; rows and columns are 0-based, `None` end means unbounded
struct A1Range {
    sheet: String,
    start_row: usize,
    end_row: Option<usize>,
    start_col: usize,
    end_col: Option<usize>,
}

fn parse_cell(cell: &str) -> (Option<usize>, Option<usize>) {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &cell[letters.len()..];
    let col = letters
        .chars()
        .fold(None, |acc: Option<usize>, c| {
            Some(acc.map_or(0, |v| (v + 1) * 26) + (c.to_ascii_uppercase() as usize - 'A' as usize))
        });
    let row = digits.parse::<usize>().ok().map(|r| r - 1);
    (col, row)
}

fn parse_range(range: &str) -> A1Range {
    let (sheet, cells) = range.rsplit_once('!').unwrap_or((range, "A:Z"));
    let sheet = sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(sheet)
        .replace("''", "'");

    let (start, end) = match cells.split_once(':') {
        Some((start, end)) => {
            let (start_col, start_row) = parse_cell(start);
            let (end_col, end_row) = parse_cell(end);
            ((start_col, start_row), (end_col, end_row))
        }
        None => {
            let (col, row) = parse_cell(cells);
            ((col, row), (col, Some(row.unwrap_or(0))))
        }
    };

    A1Range {
        sheet,
        start_row: start.1.unwrap_or(0),
        end_row: end.1,
        start_col: start.0.unwrap_or(0),
        end_col: end.0,
    }
}

fn in_bounds(value: usize, start: usize, end: Option<usize>) -> bool {
    value >= start && end.map_or(true, |end| value <= end)
}

/// Drops trailing blank cells and rows, matching what the API returns
fn normalize(rows: &mut Vec<Vec<String>>) {
    for row in rows.iter_mut() {
        while row.last().map_or(false, String::is_empty) {
            row.pop();
        }
    }
    while rows.last().map_or(false, Vec::is_empty) {
        rows.pop();
    }
}

#[async_trait]
impl SpreadsheetClient for FakeSheets {
    async fn spreadsheet_exists(&self, spreadsheet_id: &str) -> Result<bool, SourceError> {
        Ok(self.exists(spreadsheet_id))
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<String, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        let id = format!("{}-{}", title.replace(' ', "-"), state.created);
        state.spreadsheets.insert(
            id.clone(),
            vec![FakeSheet {
                title: "Sheet1".to_string(),
                rows: Vec::new(),
            }],
        );
        state.calls.push(format!("create:{}", title));
        Ok(id)
    }

    async fn delete_spreadsheet(&self, spreadsheet_id: &str) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        state.spreadsheets.remove(spreadsheet_id);
        state.calls.push(format!("delete_spreadsheet:{}", spreadsheet_id));
        Ok(())
    }

    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, SourceError> {
        if !self.exists(spreadsheet_id) {
            return Err(SourceError::http(404, "Requested entity was not found."));
        }
        Ok(self.titles(spreadsheet_id))
    }

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if find_sheet(&mut state, spreadsheet_id, title).is_some() {
            return Err(SourceError::http(400, format!("A sheet with the name \"{}\" already exists", title)));
        }
        let sheets = state
            .spreadsheets
            .get_mut(spreadsheet_id)
            .ok_or_else(|| SourceError::http(404, "Requested entity was not found."))?;
        sheets.push(FakeSheet {
            title: title.to_string(),
            rows: Vec::new(),
        });
        state.calls.push(format!("add_sheet:{}", title));
        Ok(())
    }

    async fn delete_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(sheets) = state.spreadsheets.get_mut(spreadsheet_id) {
            sheets.retain(|s| s.title != title);
        }
        state.calls.push(format!("delete_sheet:{}", title));
        Ok(())
    }

    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        old_title: &str,
        new_title: &str,
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        sheet_mut(&mut state, spreadsheet_id, old_title)?.title = new_title.to_string();
        state.calls.push(format!("rename_sheet:{}->{}", old_title, new_title));
        Ok(())
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SourceError> {
        let range = parse_range(range);
        let mut state = self.state.lock().unwrap();
        let sheet = sheet_mut(&mut state, spreadsheet_id, &range.sheet)?;
        for (r, row) in sheet.rows.iter_mut().enumerate() {
            if !in_bounds(r, range.start_row, range.end_row) {
                continue;
            }
            for (c, cell) in row.iter_mut().enumerate() {
                if in_bounds(c, range.start_col, range.end_col) {
                    cell.clear();
                }
            }
        }
        normalize(&mut sheet.rows);
        state.calls.push(format!("clear:{}", range.sheet));
        Ok(())
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        let range = parse_range(range);
        let mut state = self.state.lock().unwrap();
        let sheet = sheet_mut(&mut state, spreadsheet_id, &range.sheet)?;
        for (i, values) in rows.iter().enumerate() {
            let r = range.start_row + i;
            if sheet.rows.len() <= r {
                sheet.rows.resize(r + 1, Vec::new());
            }
            let row = &mut sheet.rows[r];
            for (j, value) in values.iter().enumerate() {
                let c = range.start_col + j;
                if row.len() <= c {
                    row.resize(c + 1, String::new());
                }
                row[c] = value.clone();
            }
        }
        normalize(&mut sheet.rows);
        state.calls.push(format!("update:{}", range.sheet));
        Ok(())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        let range = parse_range(range);
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_append) {
            return Err(daily_quota_error());
        }
        let sheet = sheet_mut(&mut state, spreadsheet_id, &range.sheet)?;
        normalize(&mut sheet.rows);
        sheet.rows.extend(rows.iter().cloned());
        state.calls.push(format!("append:{}", range.sheet));
        Ok(())
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SourceError> {
        let range = parse_range(range);
        let mut state = self.state.lock().unwrap();
        let sheet = sheet_mut(&mut state, spreadsheet_id, &range.sheet)?;
        let mut values: Vec<Vec<String>> = sheet
            .rows
            .iter()
            .enumerate()
            .filter(|(r, _)| in_bounds(*r, range.start_row, range.end_row))
            .map(|(_, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(c, _)| in_bounds(*c, range.start_col, range.end_col))
                    .map(|(_, cell)| cell.clone())
                    .collect()
            })
            .collect();
        normalize(&mut values);
        Ok(values)
    }

    async fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        runs: &[(usize, usize)],
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        let target = sheet_mut(&mut state, spreadsheet_id, sheet)?;
        for (first, last) in runs {
            let start = (first - 1).min(target.rows.len());
            let end = (*last).min(target.rows.len());
            target.rows.drain(start..end);
        }
        state.calls.push(format!("delete_rows:{}", sheet));
        Ok(())
    }

    async fn insert_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        at_row: usize,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        let target = sheet_mut(&mut state, spreadsheet_id, sheet)?;
        let index = at_row - 1;
        if target.rows.len() < index {
            target.rows.resize(index, Vec::new());
        }
        target.rows.splice(index..index, rows.iter().cloned());
        state.calls.push(format!("insert_rows:{}", sheet));
        Ok(())
    }

    async fn reorder_sheets(
        &self,
        spreadsheet_id: &str,
        titles_in_order: &[String],
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(sheets) = state.spreadsheets.get_mut(spreadsheet_id) {
            sheets.sort_by_key(|s| {
                titles_in_order
                    .iter()
                    .position(|t| *t == s.title)
                    .unwrap_or(usize::MAX)
            });
        }
        state.calls.push("reorder".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_sheets_range_handling() {
        let sheets = FakeSheets::default();
        let id = sheets.create_with_sheet("book", "It's", &["H1", "H2"]);
        sheets
            .append_values(&id, "'It''s'!A:E", &[vec!["a".into(), "b".into()], vec!["c".into()]])
            .await
            .unwrap();

        assert_eq!(sheets.get_values(&id, "'It''s'!A2").await.unwrap(), vec![vec!["a".to_string()]]);
        assert_eq!(
            sheets.get_values(&id, "'It''s'!A2:A").await.unwrap(),
            vec![vec!["a".to_string()], vec!["c".to_string()]]
        );

        sheets.clear_values(&id, "'It''s'!A:Z").await.unwrap();
        assert!(sheets.rows(&id, "It's").is_empty());
    }
}
