use serde::{Deserialize, Serialize};

/// Row-level delta between a playlist's stored and current video IDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoChanges {
    pub added_video_ids: Vec<String>,
    pub removed_video_ids: Vec<String>,
    /// 1-based sheet rows of the removed videos (row 1 is the header)
    pub removed_row_indices: Vec<usize>,
    /// Same membership, different order or multiplicity; cannot be expressed as row edits
    pub requires_full_rewrite: bool,
}

impl VideoChanges {
    pub fn has_changes(&self) -> bool {
        !self.added_video_ids.is_empty()
            || !self.removed_video_ids.is_empty()
            || self.requires_full_rewrite
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistRename {
    pub playlist_id: String,
    pub old_title: String,
    pub new_title: String,
}

/// Summary-level delta used once a full sync has completed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizedChanges {
    pub new_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub modified_ids: Vec<String>,
    pub renamed: Vec<PlaylistRename>,
}

impl OptimizedChanges {
    pub fn has_any_changes(&self) -> bool {
        !self.new_ids.is_empty()
            || !self.deleted_ids.is_empty()
            || !self.modified_ids.is_empty()
            || !self.renamed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.new_ids.len() + self.deleted_ids.len() + self.modified_ids.len() + self.renamed.len()
    }
}

/// Delta computed over fully fetched video-ID lists during a full sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistChanges {
    pub new_playlist_ids: Vec<String>,
    pub deleted_playlist_ids: Vec<String>,
    pub modified_playlist_ids: Vec<String>,
}

impl PlaylistChanges {
    pub fn has_changes(&self) -> bool {
        !self.new_playlist_ids.is_empty()
            || !self.deleted_playlist_ids.is_empty()
            || !self.modified_playlist_ids.is_empty()
    }
}
