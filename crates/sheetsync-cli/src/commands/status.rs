use super::{spreadsheet_url, AppContext};
use crate::output::Output;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Color, Table};
use serde_json::json;
use sheet_sync_core::store::{SCROBBLE_STATE_KEY, YOUTUBE_STATE_KEY};
use sheet_sync_models::{FetchState, YouTubeFetchState};

pub fn run_status(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let lastfm: Option<FetchState> = ctx.store.load_optional(SCROBBLE_STATE_KEY)?;
    let youtube: Option<YouTubeFetchState> = ctx.store.load_optional(YOUTUBE_STATE_KEY)?;

    if !output.is_human() {
        output.json(&json!({
            "state_dir": ctx.store.root().display().to_string(),
            "lastfm": lastfm,
            "youtube": youtube,
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    output.heading("Last.fm");
    match &lastfm {
        Some(state) => println!("{}", lastfm_table(state)),
        None => output.info("Never synced"),
    }

    output.heading("YouTube");
    match &youtube {
        Some(state) => println!("{}", youtube_table(state)),
        None => output.info("Never synced"),
    }

    output.info(format!("\nState directory: {}", ctx.store.root().display()));
    Ok(())
}

fn styled_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Field").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new("Value").fg(Color::Cyan).add_attribute(Attribute::Bold),
    ]);
    table
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn spreadsheet_cell(id: Option<&String>) -> String {
    id.map(|id| spreadsheet_url(id)).unwrap_or_else(|| "<none>".to_string())
}

fn lastfm_table(state: &FetchState) -> Table {
    let mut table = styled_table();
    table.add_row(vec!["Spreadsheet".to_string(), spreadsheet_cell(state.spreadsheet_id.as_ref())]);
    table.add_row(vec![
        "Fetch complete".to_string(),
        if state.fetch_complete { "yes" } else { "no" }.to_string(),
    ]);
    table.add_row(vec!["Last page".to_string(), state.last_page.to_string()]);
    table.add_row(vec!["Scrobbles fetched".to_string(), state.total_fetched.to_string()]);
    table.add_row(vec!["Newest scrobble".to_string(), format_time(state.newest_seen)]);
    table.add_row(vec!["Oldest scrobble".to_string(), format_time(state.oldest_seen)]);
    table.add_row(vec!["Last updated".to_string(), format_time(Some(state.last_updated))]);
    table
}

fn youtube_table(state: &YouTubeFetchState) -> Table {
    let mut table = styled_table();
    table.add_row(vec!["Spreadsheet".to_string(), spreadsheet_cell(state.spreadsheet_id.as_ref())]);
    table.add_row(vec![
        "Full sync complete".to_string(),
        if state.fetch_complete { "yes" } else { "no" }.to_string(),
    ]);
    table.add_row(vec!["Playlists tracked".to_string(), state.playlist_snapshots.len().to_string()]);
    table.add_row(vec!["Videos tracked".to_string(), state.total_tracked_videos().to_string()]);
    if let Some(playlists) = &state.cached_playlists {
        table.add_row(vec![
            "Pending checkpoint".to_string(),
            format!("video IDs fetched for {}/{} playlists", state.video_id_fetch_index, playlists.len()),
        ]);
    }
    if let Some(current) = &state.current_playlist_id {
        table.add_row(vec![
            "In progress".to_string(),
            format!("{} ({} videos fetched)", current, state.current_playlist_videos_fetched),
        ]);
    }
    table.add_row(vec!["Last checked".to_string(), format_time(Some(state.last_checked))]);
    table
}
