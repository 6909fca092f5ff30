use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sheet_sync_models::{PlaylistSummary, YouTubeVideo};
use std::sync::Arc;
use tracing::debug;

use crate::error::SourceError;
use crate::google_auth::GoogleAuth;
use crate::http::read_json;
use crate::traits::{Page, PlaylistSource};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Upper bound the Data API accepts for `maxResults` and for `id` lists
pub const MAX_RESULTS: usize = 50;

const PLAYLIST_FIELDS: &str = "nextPageToken,items(id,snippet/title,contentDetails/itemCount,etag)";
const PLAYLIST_ITEM_FIELDS: &str = "nextPageToken,items/contentDetails/videoId";
const VIDEO_FIELDS: &str =
    "items(id,snippet(title,description,channelTitle,channelId),contentDetails/duration)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    id: String,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    snippet: Option<PlaylistSnippet>,
    #[serde(default)]
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    #[serde(default)]
    item_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    #[serde(default)]
    content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

impl From<PlaylistResource> for PlaylistSummary {
    fn from(resource: PlaylistResource) -> Self {
        let title = resource
            .snippet
            .and_then(|s| s.title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        PlaylistSummary {
            id: resource.id,
            title,
            video_count: resource
                .content_details
                .and_then(|c| c.item_count)
                .unwrap_or(0),
            etag: resource.etag,
        }
    }
}

impl From<VideoResource> for YouTubeVideo {
    fn from(resource: VideoResource) -> Self {
        let snippet = resource.snippet.unwrap_or_default();
        let duration_secs = resource
            .content_details
            .and_then(|c| c.duration)
            .map(|d| parse_iso8601_duration(&d))
            .unwrap_or(0);
        YouTubeVideo {
            title: snippet.title,
            description: snippet.description,
            duration_secs,
            channel_name: snippet.channel_title,
            video_id: resource.id,
            channel_id: snippet.channel_id,
        }
    }
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT5M`.
/// Unparseable input yields 0.
pub fn parse_iso8601_duration(value: &str) -> u64 {
    let Some(rest) = value.strip_prefix('P') else {
        return 0;
    };

    let mut total = 0u64;
    let mut number = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => number.push(c),
            // fractional seconds are truncated
            '.' | ',' => number.push('.'),
            unit => {
                let amount = number
                    .split('.')
                    .next()
                    .and_then(|n| n.parse::<u64>().ok())
                    .unwrap_or(0);
                number.clear();
                let multiplier = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return 0,
                };
                total += amount * multiplier;
            }
        }
    }

    total
}

/// YouTube Data API v3 client for the authenticated user's playlists
pub struct YouTubeClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            client,
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), resource);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl PlaylistSource for YouTubeClient {
    async fn playlists_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<Page<PlaylistSummary>, SourceError> {
        let max_results = MAX_RESULTS.to_string();
        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("mine", "true"),
            ("maxResults", max_results.as_str()),
            ("fields", PLAYLIST_FIELDS),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistResource> = self.get("playlists", &query).await?;
        debug!(count = response.items.len(), "Fetched playlist page");
        Ok(Page {
            items: response.items.into_iter().map(PlaylistSummary::from).collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<String>, SourceError> {
        let max_results = MAX_RESULTS.to_string();
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
            ("fields", PLAYLIST_ITEM_FIELDS),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistItemResource> =
            self.get("playlistItems", &query).await?;
        Ok(Page {
            items: response
                .items
                .into_iter()
                .filter_map(|item| item.content_details.and_then(|c| c.video_id))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn videos(&self, video_ids: &[String]) -> Result<Vec<YouTubeVideo>, SourceError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        if video_ids.len() > MAX_RESULTS {
            return Err(SourceError::Decode(format!(
                "At most {} video IDs per request (got {})",
                MAX_RESULTS,
                video_ids.len()
            )));
        }

        let ids = video_ids.join(",");
        let query = [
            ("part", "snippet,contentDetails"),
            ("id", ids.as_str()),
            ("fields", VIDEO_FIELDS),
        ];
        let response: ListResponse<VideoResource> = self.get("videos", &query).await?;
        Ok(response.items.into_iter().map(YouTubeVideo::from).collect())
    }

    async fn playlist_summary(
        &self,
        playlist_id: &str,
    ) -> Result<Option<PlaylistSummary>, SourceError> {
        let query = [
            ("part", "snippet,contentDetails"),
            ("id", playlist_id),
            ("fields", PLAYLIST_FIELDS),
        ];
        let response: ListResponse<PlaylistResource> = self.get("playlists", &query).await?;
        Ok(response.items.into_iter().next().map(PlaylistSummary::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_auth::AccessToken;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> YouTubeClient {
        let auth = GoogleAuth::new(Client::new(), "id".into(), "secret".into(), "refresh".into())
            .with_cached_token(AccessToken {
                token: "test-token".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            });
        YouTubeClient::new(Client::new(), Arc::new(auth)).with_base_url(server.uri())
    }

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("PT45S"), 45);
        assert_eq!(parse_iso8601_duration("PT10M"), 600);
        assert_eq!(parse_iso8601_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration("P0D"), 0);
        assert_eq!(parse_iso8601_duration("garbage"), 0);
    }

    #[tokio::test]
    async fn test_playlists_page_maps_summaries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("mine", "true"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "CDIQAA",
                "items": [
                    {"id": "PL1", "etag": "e1", "snippet": {"title": "Mix"}, "contentDetails": {"itemCount": 3}},
                    {"id": "PL2", "etag": "e2", "snippet": {}, "contentDetails": {"itemCount": 0}}
                ]
            })))
            .mount(&server)
            .await;

        let page = client(&server).playlists_page(None).await.unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
        assert_eq!(page.items[0].video_count, 3);
        assert_eq!(page.items[0].etag.as_deref(), Some("e1"));
        assert_eq!(page.items[1].title, "Untitled");
    }

    #[tokio::test]
    async fn test_playlist_items_page_keeps_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PL1"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"contentDetails": {"videoId": "b"}},
                    {"contentDetails": {"videoId": "a"}}
                ]
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .playlist_items_page("PL1", Some("next"))
            .await
            .unwrap();
        assert_eq!(page.items, vec!["b".to_string(), "a".to_string()]);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_videos_parses_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "a,b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "a",
                    "snippet": {"title": "A", "description": "d", "channelTitle": "Chan", "channelId": "UC1"},
                    "contentDetails": {"duration": "PT4M13S"}
                }]
            })))
            .mount(&server)
            .await;

        let videos = client(&server)
            .videos(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].duration_secs, 253);
        assert_eq!(videos[0].channel_name, "Chan");
    }

    #[tokio::test]
    async fn test_daily_quota_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "Quota exceeded for quota metric 'Queries' and limit 'Queries per day'",
                    "errors": [{"reason": "quotaExceeded"}]
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).playlists_page(None).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::DailyQuota);
    }

    #[tokio::test]
    async fn test_missing_playlist_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("id", "PLgone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        assert!(client(&server).playlist_summary("PLgone").await.unwrap().is_none());
    }
}
