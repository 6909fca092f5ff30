use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lightweight playlist listing entry, cheap to fetch for every playlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
    pub video_count: usize,
    pub etag: Option<String>,
}

/// Playlist metadata together with its fetched video IDs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YouTubePlaylist {
    pub id: String,
    pub title: String,
    pub video_count: usize,
    #[serde(default)]
    pub video_ids: Vec<String>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl From<PlaylistSummary> for YouTubePlaylist {
    fn from(summary: PlaylistSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            video_count: summary.video_count,
            video_ids: Vec::new(),
            etag: summary.etag,
        }
    }
}

/// Last-known state of one playlist, replaced wholesale after each pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    pub playlist_id: String,
    pub title: String,
    pub video_ids: Vec<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub reported_video_count: usize,
    #[serde(default)]
    pub etag: Option<String>,
}

impl PlaylistSnapshot {
    pub fn from_playlist(playlist: &YouTubePlaylist) -> Self {
        Self {
            playlist_id: playlist.id.clone(),
            title: playlist.title.clone(),
            video_ids: playlist.video_ids.clone(),
            last_updated: Utc::now(),
            reported_video_count: playlist.video_count,
            etag: playlist.etag.clone(),
        }
    }
}

/// Persisted YouTube sync state.
///
/// Two resume points: `video_id_fetch_index` into `cached_playlists` while
/// collecting video IDs, and `current_playlist_id` /
/// `current_playlist_videos_fetched` while fetching one playlist's video details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YouTubeFetchState {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub playlist_snapshots: HashMap<String, PlaylistSnapshot>,
    #[serde(default)]
    pub cached_playlists: Option<Vec<YouTubePlaylist>>,
    #[serde(default)]
    pub video_id_fetch_index: usize,
    #[serde(default)]
    pub current_playlist_id: Option<String>,
    #[serde(default)]
    pub current_playlist_videos_fetched: usize,
    #[serde(default)]
    pub fetch_complete: bool,
    pub last_updated: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
}

impl Default for YouTubeFetchState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            spreadsheet_id: None,
            playlist_snapshots: HashMap::new(),
            cached_playlists: None,
            video_id_fetch_index: 0,
            current_playlist_id: None,
            current_playlist_videos_fetched: 0,
            fetch_complete: false,
            last_updated: now,
            last_checked: now,
        }
    }
}

impl YouTubeFetchState {
    pub fn update_playlist_progress(&mut self, playlist_id: &str, videos_fetched: usize) {
        self.current_playlist_id = Some(playlist_id.to_string());
        self.current_playlist_videos_fetched = videos_fetched;
        self.last_updated = Utc::now();
    }

    pub fn clear_current_progress(&mut self) {
        self.current_playlist_id = None;
        self.current_playlist_videos_fetched = 0;
        self.last_updated = Utc::now();
    }

    pub fn total_tracked_videos(&self) -> usize {
        self.playlist_snapshots.values().map(|s| s.video_ids.len()).sum()
    }
}
