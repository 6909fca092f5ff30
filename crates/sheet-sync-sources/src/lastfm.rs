use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use sheet_sync_models::Scrobble;
use tracing::debug;

use crate::error::SourceError;
use crate::http::check_status;
use crate::traits::ScrobbleSource;

pub const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: Option<OneOrMany<LastFmTrack>>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct LastFmDate {
    uts: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LastFmTrack {
    name: String,
    artist: TextField,
    #[serde(default)]
    album: Option<TextField>,
    #[serde(default)]
    date: Option<LastFmDate>,
    #[serde(rename = "@attr", default)]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Deserialize)]
struct LastFmError {
    error: u32,
    message: String,
}

impl LastFmTrack {
    fn is_now_playing(&self) -> bool {
        self.attr
            .as_ref()
            .and_then(|a| a.nowplaying.as_deref())
            .map_or(false, |v| v.eq_ignore_ascii_case("true"))
    }

    fn played_at(&self) -> Option<DateTime<Utc>> {
        let uts: i64 = self.date.as_ref()?.uts.parse().ok()?;
        Utc.timestamp_opt(uts, 0).single()
    }

    fn into_scrobble(self) -> Scrobble {
        let played_at = self.played_at();
        Scrobble {
            track_name: self.name,
            artist_name: self.artist.text,
            album_name: self.album.map(|a| a.text).unwrap_or_default(),
            played_at,
        }
    }
}

/// `user.getrecenttracks` client
pub struct LastFmClient {
    client: Client,
    base_url: String,
    api_key: String,
    username: String,
}

impl LastFmClient {
    pub fn new(client: Client, api_key: String, username: String) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            username,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl ScrobbleSource for LastFmClient {
    async fn recent_tracks_page(&self, page: u32, limit: u32) -> Result<Vec<Scrobble>, SourceError> {
        let url = format!("{}/2.0/", self.base_url.trim_end_matches('/'));
        let page = page.to_string();
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("user", self.username.as_str()),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = match check_status(response).await {
            Ok(response) => response.text().await?,
            Err(SourceError::Http { status, message, .. }) => {
                return Err(lastfm_error(status, &message).unwrap_or_else(|| SourceError::http(status, message)))
            }
            Err(e) => return Err(e),
        };

        // Last.fm reports some failures with a 200 status and an error body
        if let Some(err) = lastfm_error(status, &body) {
            return Err(err);
        }

        let parsed: RecentTracksResponse = serde_json::from_str(&body)?;
        let tracks = parsed.recenttracks.track.map(OneOrMany::into_vec).unwrap_or_default();

        let scrobbles: Vec<Scrobble> = tracks
            .into_iter()
            .filter(|t| !t.is_now_playing())
            .map(LastFmTrack::into_scrobble)
            .collect();

        debug!(page = %page, count = scrobbles.len(), "Fetched Last.fm page");
        Ok(scrobbles)
    }
}

fn lastfm_error(status: u16, body: &str) -> Option<SourceError> {
    let err: LastFmError = serde_json::from_str(body).ok()?;
    let status = if status >= 400 { status } else { 500 };
    Some(SourceError::http(
        status,
        format!("Last.fm error {}: {}", err.error, err.message),
    ))
}
