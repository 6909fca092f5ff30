use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date format used for the `Date` column of the scrobble sheet
pub const SCROBBLE_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One track playback as reported by Last.fm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scrobble {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    /// Uniqueness key when merging into the local cache
    pub played_at: Option<DateTime<Utc>>,
}

impl Scrobble {
    pub fn formatted_date(&self) -> String {
        self.played_at
            .map(|played_at| played_at.format(SCROBBLE_DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Sheet row in `Date, Track Title, Artist, Album` order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.formatted_date(),
            self.track_name.clone(),
            self.artist_name.clone(),
            self.album_name.clone(),
        ]
    }
}

/// Checkpoint for the paged scrobble fetch.
///
/// Persisted after every page so an interrupted fetch resumes at `last_page + 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchState {
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub total_fetched: usize,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub fetch_complete: bool,
    #[serde(default)]
    pub oldest_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub newest_seen: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl Default for FetchState {
    fn default() -> Self {
        Self {
            last_page: 0,
            total_fetched: 0,
            spreadsheet_id: None,
            fetch_complete: false,
            oldest_seen: None,
            newest_seen: None,
            last_updated: Utc::now(),
        }
    }
}

impl FetchState {
    pub fn new(spreadsheet_id: Option<String>) -> Self {
        Self {
            spreadsheet_id,
            ..Self::default()
        }
    }

    /// Record progress after a page; the seen window only ever widens
    pub fn update(
        &mut self,
        page: u32,
        total: usize,
        oldest: Option<DateTime<Utc>>,
        newest: Option<DateTime<Utc>>,
    ) {
        self.last_page = page;
        self.total_fetched = total;
        self.last_updated = Utc::now();

        if let Some(oldest) = oldest {
            if self.oldest_seen.map_or(true, |seen| oldest < seen) {
                self.oldest_seen = Some(oldest);
            }
        }
        if let Some(newest) = newest {
            if self.newest_seen.map_or(true, |seen| newest > seen) {
                self.newest_seen = Some(newest);
            }
        }
    }
}
