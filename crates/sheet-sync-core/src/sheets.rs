use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sheet_sync_models::SCROBBLE_DATE_FORMAT;
use sheet_sync_sources::SpreadsheetClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::retry::RetryExecutor;

pub const SCROBBLES_SHEET: &str = "Scrobbles";
pub const DEFAULT_SHEET: &str = "Sheet1";
pub const SCROBBLE_HEADER: [&str; 4] = ["Date", "Track Title", "Artist", "Album"];
pub const PLAYLIST_HEADER: [&str; 5] = ["Title", "Description", "Duration", "Channel", "Video URL"];

/// Rows per insert request; keeps request bodies well under the API size limit
const INSERT_CHUNK_ROWS: usize = 5000;

/// Sheet title derived from a playlist title
pub fn sanitize_sheet_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' => sanitized.push_str(" -"),
            '/' | '\\' => sanitized.push('-'),
            '?' | '*' => {}
            '[' => sanitized.push('('),
            ']' => sanitized.push(')'),
            c => sanitized.push(c),
        }
    }
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A1 range on a named sheet, e.g. `'My Mix'!A2:Z`
pub fn sheet_range(sheet: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), cells)
}

/// Groups 1-based row numbers into inclusive runs, highest rows first, so
/// deleting the runs in order never shifts a run still to be deleted
pub fn merge_row_runs(rows: &[usize]) -> Vec<(usize, usize)> {
    let mut sorted: Vec<usize> = rows.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut runs: Vec<(usize, usize)> = Vec::new();
    for row in sorted {
        match runs.last_mut() {
            Some((first, _)) if *first == row + 1 => *first = row,
            _ => runs.push((row, row)),
        }
    }
    runs
}

/// Parses a `Date` cell: the written `yyyy/MM/dd HH:mm:ss` format, ISO-8601,
/// or a spreadsheet serial number (days since 1899-12-30)
pub fn parse_sheet_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, SCROBBLE_DATE_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(serial) = value.parse::<f64>() {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
        let millis = (serial * 86_400_000.0).round() as i64;
        return Some(Utc.from_utc_datetime(&(epoch + Duration::milliseconds(millis))));
    }
    None
}

/// Spreadsheet operations used by the orchestrators, each wrapped in retry
#[derive(Clone)]
pub struct SheetWriter {
    client: Arc<dyn SpreadsheetClient>,
    retry: RetryExecutor,
}

impl SheetWriter {
    pub fn new(client: Arc<dyn SpreadsheetClient>, retry: RetryExecutor) -> Self {
        Self { client, retry }
    }

    /// Stored ID if it still exists, then the configured default, then a new spreadsheet
    pub async fn resolve_spreadsheet(
        &self,
        stored_id: Option<&str>,
        configured_id: Option<&str>,
        title: &str,
    ) -> Result<String> {
        for candidate in [stored_id, configured_id].into_iter().flatten() {
            let exists = self
                .retry
                .execute("sheets.get_spreadsheet", || self.client.spreadsheet_exists(candidate))
                .await?;
            if exists {
                debug!(spreadsheet_id = candidate, "Using existing spreadsheet");
                return Ok(candidate.to_string());
            }
            warn!("Spreadsheet {} no longer exists", candidate);
        }

        let id = self
            .retry
            .execute("sheets.create_spreadsheet", || self.client.create_spreadsheet(title))
            .await?;
        info!("Created spreadsheet '{}' ({})", title, id);
        Ok(id)
    }

    pub async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>> {
        self.retry
            .execute("sheets.get_sheets", || self.client.sheet_titles(spreadsheet_id))
            .await
    }

    /// Adds the sheet with its header row when missing; returns whether it was created
    pub async fn ensure_sheet(&self, spreadsheet_id: &str, sheet: &str, header: &[&str]) -> Result<bool> {
        let titles = self.sheet_titles(spreadsheet_id).await?;
        if titles.iter().any(|t| t == sheet) {
            return Ok(false);
        }

        self.retry
            .execute("sheets.add_sheet", || self.client.add_sheet(spreadsheet_id, sheet))
            .await?;
        let header_row = vec![header.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        let range = sheet_range(sheet, "A1");
        self.retry
            .execute("sheets.write_header", || {
                self.client.update_values(spreadsheet_id, &range, &header_row)
            })
            .await?;
        debug!("Created sheet '{}'", sheet);
        Ok(true)
    }

    /// Clears the sheet and writes header plus rows from A1
    pub async fn rewrite(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        header: &[&str],
        rows: &[Vec<String>],
    ) -> Result<()> {
        self.ensure_sheet(spreadsheet_id, sheet, header).await?;

        let clear_range = sheet_range(sheet, "A:Z");
        self.retry
            .execute("sheets.clear", || self.client.clear_values(spreadsheet_id, &clear_range))
            .await?;

        let mut values = Vec::with_capacity(rows.len() + 1);
        values.push(header.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        values.extend(rows.iter().cloned());

        let range = sheet_range(sheet, "A1");
        self.retry
            .execute("sheets.write_rows", || {
                self.client.update_values(spreadsheet_id, &range, &values)
            })
            .await?;
        info!("Rewrote sheet '{}' with {} rows", sheet, rows.len());
        Ok(())
    }

    pub async fn append(&self, spreadsheet_id: &str, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = sheet_range(sheet, "A:E");
        self.retry
            .execute("sheets.append", || self.client.append_values(spreadsheet_id, &range, rows))
            .await?;
        debug!("Appended {} rows to '{}'", rows.len(), sheet);
        Ok(())
    }

    /// Deletes 1-based rows, highest first
    pub async fn delete_rows(&self, spreadsheet_id: &str, sheet: &str, rows: &[usize]) -> Result<()> {
        let runs = merge_row_runs(rows);
        if runs.is_empty() {
            return Ok(());
        }
        self.retry
            .execute("sheets.delete_rows", || self.client.delete_rows(spreadsheet_id, sheet, &runs))
            .await?;
        debug!("Deleted {} rows from '{}' in {} ranges", rows.len(), sheet, runs.len());
        Ok(())
    }

    /// Inserts rows directly below the header, keeping their given order.
    ///
    /// Chunks go in last-first, so an interrupted write leaves a contiguous
    /// block of the oldest rows and the sheet's newest date stays a valid cutoff.
    pub async fn insert_below_header(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        let chunks: Vec<&[Vec<String>]> = rows.chunks(INSERT_CHUNK_ROWS).collect();
        for chunk in chunks.into_iter().rev() {
            self.retry
                .execute("sheets.insert_rows", || {
                    self.client.insert_rows(spreadsheet_id, sheet, 2, chunk)
                })
                .await?;
        }
        Ok(())
    }

    pub async fn read_column(&self, spreadsheet_id: &str, sheet: &str, cells: &str) -> Result<Vec<String>> {
        let range = sheet_range(sheet, cells);
        let values = self
            .retry
            .execute("sheets.get_values", || self.client.get_values(spreadsheet_id, &range))
            .await?;
        Ok(values
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    /// Date of the newest scrobble row (rows are kept newest first)
    pub async fn latest_scrobble_time(&self, spreadsheet_id: &str) -> Result<Option<DateTime<Utc>>> {
        let cells = self.read_column(spreadsheet_id, SCROBBLES_SHEET, "A2").await?;
        Ok(cells.first().and_then(|cell| parse_sheet_date(cell)))
    }

    /// Deletes every scrobble row dated on or after `cutoff`; returns the count
    pub async fn delete_scrobbles_on_or_after(
        &self,
        spreadsheet_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let cells = self.read_column(spreadsheet_id, SCROBBLES_SHEET, "A2:A").await?;
        let rows: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| parse_sheet_date(cell).map_or(false, |date| date >= cutoff))
            .map(|(index, _)| index + 2)
            .collect();

        self.delete_rows(spreadsheet_id, SCROBBLES_SHEET, &rows).await?;
        info!("Deleted {} scrobble rows dated on or after {}", rows.len(), cutoff);
        Ok(rows.len())
    }

    pub async fn rename_sheet(&self, spreadsheet_id: &str, old: &str, new: &str) -> Result<()> {
        self.retry
            .execute("sheets.rename_sheet", || self.client.rename_sheet(spreadsheet_id, old, new))
            .await
    }

    pub async fn delete_sheet(&self, spreadsheet_id: &str, sheet: &str) -> Result<()> {
        self.retry
            .execute("sheets.delete_sheet", || self.client.delete_sheet(spreadsheet_id, sheet))
            .await
    }

    pub async fn delete_spreadsheet(&self, spreadsheet_id: &str) -> Result<()> {
        self.retry
            .execute("drive.delete_file", || self.client.delete_spreadsheet(spreadsheet_id))
            .await?;
        info!("Deleted spreadsheet {}", spreadsheet_id);
        Ok(())
    }

    /// Drops the default `Sheet1` once other sheets exist
    pub async fn cleanup_default_sheet(&self, spreadsheet_id: &str) -> Result<()> {
        let titles = self.sheet_titles(spreadsheet_id).await?;
        if titles.len() > 1 && titles.iter().any(|t| t == DEFAULT_SHEET) {
            self.delete_sheet(spreadsheet_id, DEFAULT_SHEET).await?;
            debug!("Removed default sheet");
        }
        Ok(())
    }

    pub async fn reorder_alphabetically(&self, spreadsheet_id: &str) -> Result<()> {
        let titles = self.sheet_titles(spreadsheet_id).await?;
        let mut sorted = titles.clone();
        sorted.sort_by_key(|t| t.to_lowercase());
        if sorted == titles {
            return Ok(());
        }
        self.retry
            .execute("sheets.reorder", || self.client.reorder_sheets(spreadsheet_id, &sorted))
            .await?;
        debug!("Reordered {} sheets alphabetically", sorted.len());
        Ok(())
    }
}
