use super::*;
use chrono::Utc;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn summary(id: &str, title: &str, count: usize, etag: Option<&str>) -> PlaylistSummary {
    PlaylistSummary {
        id: id.to_string(),
        title: title.to_string(),
        video_count: count,
        etag: etag.map(str::to_string),
    }
}

fn snapshot(id: &str, title: &str, video_ids: &[&str], etag: Option<&str>) -> PlaylistSnapshot {
    PlaylistSnapshot {
        playlist_id: id.to_string(),
        title: title.to_string(),
        video_ids: ids(video_ids),
        last_updated: Utc::now(),
        reported_video_count: video_ids.len(),
        etag: etag.map(str::to_string),
    }
}

fn snapshots(items: Vec<PlaylistSnapshot>) -> HashMap<String, PlaylistSnapshot> {
    items.into_iter().map(|s| (s.playlist_id.clone(), s)).collect()
}

#[test]
fn test_identical_lists_have_no_changes() {
    let list = ids(&["a", "b", "c"]);
    let changes = detect(&list, &list);
    assert!(changes.added_video_ids.is_empty());
    assert!(changes.removed_video_ids.is_empty());
    assert!(!changes.requires_full_rewrite);
    assert!(!changes.has_changes());
}

#[test]
fn test_appended_video() {
    let changes = detect(&ids(&["a", "b", "x"]), &ids(&["a", "b"]));
    assert_eq!(changes.added_video_ids, ids(&["x"]));
    assert!(changes.removed_video_ids.is_empty());
    assert!(!changes.requires_full_rewrite);
}

#[test]
fn test_permutation_requires_rewrite() {
    let changes = detect(&ids(&["a", "c", "b"]), &ids(&["a", "b", "c"]));
    assert!(changes.added_video_ids.is_empty());
    assert!(changes.removed_video_ids.is_empty());
    assert!(changes.requires_full_rewrite);
    assert!(changes.has_changes());
}

#[test]
fn test_duplicated_video_requires_rewrite() {
    let changes = detect(&ids(&["a", "b", "a"]), &ids(&["a", "b"]));
    assert!(changes.added_video_ids.is_empty());
    assert!(changes.removed_video_ids.is_empty());
    assert!(changes.requires_full_rewrite);
    assert!(changes.has_changes());

    let collapsed = detect(&ids(&["a", "b"]), &ids(&["a", "b", "a"]));
    assert!(collapsed.requires_full_rewrite);
}

#[test]
fn test_removed_first_video_maps_to_row_two() {
    let changes = detect(&ids(&["b", "c"]), &ids(&["a", "b", "c"]));
    assert_eq!(changes.removed_video_ids, ids(&["a"]));
    assert_eq!(changes.removed_row_indices, vec![2]);
    assert!(!changes.requires_full_rewrite);
}

#[test]
fn test_removed_row_indices_follow_stored_positions() {
    let changes = detect(&ids(&["a", "c", "e"]), &ids(&["a", "b", "c", "d", "e"]));
    assert_eq!(changes.removed_video_ids, ids(&["b", "d"]));
    assert_eq!(changes.removed_row_indices, vec![3, 5]);
}

#[test]
fn test_empty_stored_list_adds_everything() {
    let changes = detect(&ids(&["a", "b"]), &[]);
    assert_eq!(changes.added_video_ids, ids(&["a", "b"]));
    assert!(!changes.requires_full_rewrite);
}

#[test]
fn test_append_order_check() {
    let stored = ids(&["a", "b", "c"]);

    let tail = ids(&["b", "c", "x"]);
    assert!(append_preserves_order(&tail, &stored, &detect(&tail, &stored)));

    let head = ids(&["x", "a", "b", "c"]);
    assert!(!append_preserves_order(&head, &stored, &detect(&head, &stored)));
}

#[test]
fn test_optimized_equal_etag_and_count_is_unchanged() {
    let changes = detect_optimized(
        &[summary("PL1", "Mix", 2, Some("e1"))],
        &snapshots(vec![snapshot("PL1", "Mix", &["a", "b"], Some("e1"))]),
    );
    assert!(!changes.has_any_changes());
}

#[test]
fn test_optimized_etag_change_with_same_count_is_modified() {
    let changes = detect_optimized(
        &[summary("PL1", "Mix", 2, Some("e2"))],
        &snapshots(vec![snapshot("PL1", "Mix", &["a", "b"], Some("e1"))]),
    );
    assert_eq!(changes.modified_ids, ids(&["PL1"]));
}

#[test]
fn test_optimized_falls_back_to_count_without_etag() {
    let stored = snapshots(vec![snapshot("PL1", "Mix", &["a", "b"], None)]);

    let same = detect_optimized(&[summary("PL1", "Mix", 2, Some("e1"))], &stored);
    assert!(same.modified_ids.is_empty());

    let grown = detect_optimized(&[summary("PL1", "Mix", 3, Some("e1"))], &stored);
    assert_eq!(grown.modified_ids, ids(&["PL1"]));
}

#[test]
fn test_optimized_new_deleted_and_renamed() {
    let changes = detect_optimized(
        &[
            summary("PL1", "Road Trip", 2, Some("e1")),
            summary("PL3", "Fresh", 1, Some("e3")),
        ],
        &snapshots(vec![
            snapshot("PL1", "Roadtrip", &["a", "b"], Some("e1")),
            snapshot("PL2", "Gone", &["c"], Some("e2")),
        ]),
    );

    assert_eq!(changes.new_ids, ids(&["PL3"]));
    assert_eq!(changes.deleted_ids, ids(&["PL2"]));
    assert!(changes.modified_ids.is_empty());
    assert_eq!(
        changes.renamed,
        vec![PlaylistRename {
            playlist_id: "PL1".to_string(),
            old_title: "Roadtrip".to_string(),
            new_title: "Road Trip".to_string(),
        }]
    );
    assert_eq!(changes.total(), 3);
}

#[test]
fn test_playlist_changes_are_order_aware() {
    let stored = snapshots(vec![
        snapshot("PL1", "One", &["a", "b"], None),
        snapshot("PL2", "Two", &["c", "d"], None),
        snapshot("PL3", "Three", &["e"], None),
    ]);
    let playlists = vec![
        YouTubePlaylist {
            id: "PL1".to_string(),
            title: "One".to_string(),
            video_count: 2,
            video_ids: ids(&["a", "b"]),
            etag: None,
        },
        YouTubePlaylist {
            id: "PL2".to_string(),
            title: "Two".to_string(),
            video_count: 2,
            video_ids: ids(&["d", "c"]),
            etag: None,
        },
        YouTubePlaylist {
            id: "PL4".to_string(),
            title: "Four".to_string(),
            video_count: 0,
            video_ids: Vec::new(),
            etag: None,
        },
    ];

    let changes = detect_playlist_changes(&playlists, &stored);
    assert_eq!(changes.new_playlist_ids, ids(&["PL4"]));
    assert_eq!(changes.modified_playlist_ids, ids(&["PL2"]));
    assert_eq!(changes.deleted_playlist_ids, ids(&["PL3"]));
}
