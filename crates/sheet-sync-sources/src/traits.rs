use async_trait::async_trait;
use sheet_sync_models::{PlaylistSummary, Scrobble, YouTubeVideo};

use crate::error::SourceError;

/// One page of a token-paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Paged listening history, newest first.
///
/// Every method is exactly one remote call so callers can wrap each one in
/// retry and checkpoint between calls.
#[async_trait]
pub trait ScrobbleSource: Send + Sync {
    /// 1-based page of recent tracks. Now-playing entries are not included.
    async fn recent_tracks_page(&self, page: u32, limit: u32) -> Result<Vec<Scrobble>, SourceError>;
}

/// The authenticated user's own playlists
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn playlists_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<Page<PlaylistSummary>, SourceError>;

    /// Video IDs of one playlist in playlist order
    async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, SourceError>;

    /// Details for at most 50 IDs. IDs without details are simply absent.
    async fn videos(&self, video_ids: &[String]) -> Result<Vec<YouTubeVideo>, SourceError>;

    /// Summary of a single playlist, `None` when it does not exist or is not visible
    async fn playlist_summary(&self, playlist_id: &str)
        -> Result<Option<PlaylistSummary>, SourceError>;
}

/// Spreadsheet operations. Sheets are addressed by title; row numbers are 1-based
/// with row 1 holding the header.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    async fn spreadsheet_exists(&self, spreadsheet_id: &str) -> Result<bool, SourceError>;

    /// Returns the new spreadsheet's ID
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SourceError>;

    async fn delete_spreadsheet(&self, spreadsheet_id: &str) -> Result<(), SourceError>;

    /// Sheet titles in tab order
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, SourceError>;

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError>;

    /// No-op when the sheet does not exist
    async fn delete_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError>;

    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        old_title: &str,
        new_title: &str,
    ) -> Result<(), SourceError>;

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SourceError>;

    /// Overwrites cells starting at the top-left of `range`
    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError>;

    /// Inserts rows after the last row with data in `range`
    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError>;

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SourceError>;

    /// Deletes inclusive `(first_row, last_row)` runs in the given order
    async fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        runs: &[(usize, usize)],
    ) -> Result<(), SourceError>;

    /// Inserts `rows` so the first one lands on `at_row`, shifting existing rows down
    async fn insert_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        at_row: usize,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError>;

    /// Moves the listed sheets to the given tab order
    async fn reorder_sheets(
        &self,
        spreadsheet_id: &str,
        titles_in_order: &[String],
    ) -> Result<(), SourceError>;
}
