use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sheet_sync_config::PathManager;
use sheet_sync_models::YouTubeVideo;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;

pub const SCROBBLE_STATE_KEY: &str = "scrobblefetchstate.json";
pub const SCROBBLES_KEY: &str = "scrobbles.json";
pub const YOUTUBE_STATE_KEY: &str = "youtubefetchstate.json";
pub const PLAYLISTS_DIR: &str = "playlists";
pub const DELETED_PLAYLISTS_DIR: &str = "deleted";

type StoreResult<T> = std::result::Result<T, StoreError>;

/// JSON snapshot store keyed by relative file name.
///
/// Every save replaces the target atomically (temp file + rename), so a crash
/// leaves either the previous or the new content on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_paths(path_manager: &PathManager) -> Self {
        Self::new(path_manager.state_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Missing file yields `T::default()`
    pub fn load<T>(&self, key: &str) -> StoreResult<T>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load_optional(key)?.unwrap_or_default())
    }

    pub fn load_optional<T>(&self, key: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.path_for(key);
        if !path.exists() {
            debug!("State miss: {} (file does not exist)", key);
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let value = serde_json::from_str(&content)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        debug!("State hit: {}", key);
        Ok(Some(value))
    }

    pub fn save<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize,
    {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, json).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("State saved: {}", key);
        Ok(())
    }

    /// Returns whether anything was removed
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })?;
        info!("Deleted state: {}", key);
        Ok(true)
    }

    fn playlist_key(title: &str) -> String {
        format!("{}/{}.json", PLAYLISTS_DIR, sanitize_file_name(title))
    }

    pub fn load_playlist_cache(&self, title: &str) -> StoreResult<Vec<YouTubeVideo>> {
        self.load(&Self::playlist_key(title))
    }

    pub fn save_playlist_cache(&self, title: &str, videos: &[YouTubeVideo]) -> StoreResult<()> {
        self.save(&Self::playlist_key(title), &videos)
    }

    /// Moves the cache file to the new title; skipped when the target already exists
    pub fn rename_playlist_cache(&self, old_title: &str, new_title: &str) -> StoreResult<bool> {
        let from = self.path_for(&Self::playlist_key(old_title));
        let to = self.path_for(&Self::playlist_key(new_title));
        if from == to || !from.exists() || to.exists() {
            return Ok(false);
        }
        std::fs::rename(&from, &to).map_err(|source| StoreError::Io { path: to, source })?;
        debug!("Renamed playlist cache '{}' -> '{}'", old_title, new_title);
        Ok(true)
    }

    /// Moves the cache file into `playlists/deleted/`, returning its new location
    pub fn archive_playlist_cache(&self, title: &str) -> StoreResult<Option<PathBuf>> {
        let from = self.path_for(&Self::playlist_key(title));
        if !from.exists() {
            return Ok(None);
        }

        let deleted_dir = self.root.join(PLAYLISTS_DIR).join(DELETED_PLAYLISTS_DIR);
        create_dir_all(&deleted_dir)?;

        let name = sanitize_file_name(title);
        let mut to = deleted_dir.join(format!("{}.json", name));
        if to.exists() {
            to = deleted_dir.join(format!("{}_{}.json", name, Utc::now().format("%Y%m%d%H%M%S")));
        }

        std::fs::rename(&from, &to).map_err(|source| StoreError::Io {
            path: to.clone(),
            source,
        })?;
        info!("Archived playlist cache '{}' to {}", title, to.display());
        Ok(Some(to))
    }

    /// Removes the YouTube state file and every playlist cache, archived ones included
    pub fn delete_youtube_state(&self) -> StoreResult<()> {
        self.delete(YOUTUBE_STATE_KEY)?;
        let playlists = self.root.join(PLAYLISTS_DIR);
        if playlists.exists() {
            std::fs::remove_dir_all(&playlists).map_err(|source| StoreError::Io {
                path: playlists,
                source,
            })?;
        }
        Ok(())
    }

    pub fn delete_lastfm_state(&self) -> StoreResult<()> {
        self.delete(SCROBBLE_STATE_KEY)?;
        self.delete(SCROBBLES_KEY)?;
        Ok(())
    }
}

fn create_dir_all(dir: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// File-system safe name for a playlist title
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
