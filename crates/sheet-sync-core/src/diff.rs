use sheet_sync_models::{
    OptimizedChanges, PlaylistChanges, PlaylistRename, PlaylistSnapshot, PlaylistSummary,
    VideoChanges, YouTubePlaylist,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// First data row of a playlist sheet (row 1 is the header)
const FIRST_DATA_ROW: usize = 2;

/// Video-level delta between the current playlist contents and the stored snapshot.
///
/// `removed_row_indices` assume the sheet rows mirror `stored` exactly.
pub fn detect(current: &[String], stored: &[String]) -> VideoChanges {
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let stored_set: HashSet<&str> = stored.iter().map(String::as_str).collect();

    let added_video_ids: Vec<String> = current
        .iter()
        .filter(|id| !stored_set.contains(id.as_str()))
        .cloned()
        .collect();

    let mut removed_video_ids = Vec::new();
    let mut removed_row_indices = Vec::new();
    for (index, id) in stored.iter().enumerate() {
        if !current_set.contains(id.as_str()) {
            removed_video_ids.push(id.clone());
            removed_row_indices.push(index + FIRST_DATA_ROW);
        }
    }

    // same membership but a different order or a duplicated entry
    let requires_full_rewrite =
        added_video_ids.is_empty() && removed_video_ids.is_empty() && current != stored;

    VideoChanges {
        added_video_ids,
        removed_video_ids,
        removed_row_indices,
        requires_full_rewrite,
    }
}

/// Whether deleting the removed rows and appending the added IDs reproduces `current`
pub fn append_preserves_order(current: &[String], stored: &[String], changes: &VideoChanges) -> bool {
    let removed: HashSet<&str> = changes.removed_video_ids.iter().map(String::as_str).collect();
    let expected = stored
        .iter()
        .filter(|id| !removed.contains(id.as_str()))
        .chain(changes.added_video_ids.iter());
    expected.eq(current.iter())
}

/// Playlist-level delta from cheap summaries, used once a full sync has completed.
///
/// A playlist counts as modified when both ETags are known and differ. When
/// either ETag is missing the reported video count is compared instead, which
/// misses same-size edits.
pub fn detect_optimized(
    summaries: &[PlaylistSummary],
    snapshots: &HashMap<String, PlaylistSnapshot>,
) -> OptimizedChanges {
    let mut changes = OptimizedChanges::default();
    let current_ids: HashSet<&str> = summaries.iter().map(|s| s.id.as_str()).collect();

    for summary in summaries {
        let Some(snapshot) = snapshots.get(&summary.id) else {
            changes.new_ids.push(summary.id.clone());
            continue;
        };

        if snapshot.title != summary.title {
            changes.renamed.push(PlaylistRename {
                playlist_id: summary.id.clone(),
                old_title: snapshot.title.clone(),
                new_title: summary.title.clone(),
            });
        }

        let modified = match (&summary.etag, &snapshot.etag) {
            (Some(current), Some(stored)) => current != stored,
            _ => {
                debug!(
                    playlist = %summary.id,
                    "ETag unavailable, falling back to video count comparison"
                );
                summary.video_count != snapshot.reported_video_count
            }
        };
        if modified {
            changes.modified_ids.push(summary.id.clone());
        }
    }

    let mut deleted: Vec<String> = snapshots
        .keys()
        .filter(|id| !current_ids.contains(id.as_str()))
        .cloned()
        .collect();
    deleted.sort();
    changes.deleted_ids = deleted;

    changes
}

/// Playlist-level delta over fully fetched video-ID lists; order changes count as modified
pub fn detect_playlist_changes(
    playlists: &[YouTubePlaylist],
    snapshots: &HashMap<String, PlaylistSnapshot>,
) -> PlaylistChanges {
    let mut changes = PlaylistChanges::default();
    let current_ids: HashSet<&str> = playlists.iter().map(|p| p.id.as_str()).collect();

    for playlist in playlists {
        match snapshots.get(&playlist.id) {
            None => changes.new_playlist_ids.push(playlist.id.clone()),
            Some(snapshot) if snapshot.video_ids != playlist.video_ids => {
                changes.modified_playlist_ids.push(playlist.id.clone())
            }
            Some(_) => {}
        }
    }

    let mut deleted: Vec<String> = snapshots
        .keys()
        .filter(|id| !current_ids.contains(id.as_str()))
        .cloned()
        .collect();
    deleted.sort();
    changes.deleted_playlist_ids = deleted;

    changes
}

#[cfg(test)]
mod tests;
