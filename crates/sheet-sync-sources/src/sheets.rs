use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::google_auth::GoogleAuth;
use crate::http::{check_status, read_json};
use crate::traits::SpreadsheetClient;

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com/drive/v3";

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Sheets v4 client; spreadsheet deletion goes through Drive v3
pub struct GoogleSheetsClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    sheets_url: String,
    drive_url: String,
}

impl GoogleSheetsClient {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            client,
            auth,
            sheets_url: DEFAULT_SHEETS_URL.to_string(),
            drive_url: DEFAULT_DRIVE_URL.to_string(),
        }
    }

    pub fn with_base_urls(mut self, sheets_url: impl Into<String>, drive_url: impl Into<String>) -> Self {
        self.sheets_url = sheets_url.into();
        self.drive_url = drive_url.into();
        self
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.sheets_url.trim_end_matches('/'),
            urlencoding::encode(spreadsheet_id)
        )
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.spreadsheet_url(spreadsheet_id))
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(sheetId,title,index)")])
            .send()
            .await?;
        let metadata: SpreadsheetMetadata = read_json(response).await?;

        let mut properties: Vec<SheetProperties> =
            metadata.sheets.into_iter().map(|s| s.properties).collect();
        properties.sort_by_key(|p| p.index);
        Ok(properties)
    }

    async fn sheet_id(&self, spreadsheet_id: &str, title: &str) -> Result<Option<i64>, SourceError> {
        Ok(self
            .sheet_properties(spreadsheet_id)
            .await?
            .into_iter()
            .find(|p| p.title == title)
            .map(|p| p.sheet_id))
    }

    async fn require_sheet_id(&self, spreadsheet_id: &str, title: &str) -> Result<i64, SourceError> {
        self.sheet_id(spreadsheet_id, title)
            .await?
            .ok_or_else(|| SourceError::http(404, format!("Sheet '{}' not found", title)))
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<(), SourceError> {
        if requests.is_empty() {
            return Ok(());
        }
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id)))
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_rows(rows: &[Vec<String>]) -> Value {
    json!(rows
        .iter()
        .map(|row| json!({
            "values": row
                .iter()
                .map(|cell| json!({ "userEnteredValue": { "stringValue": cell } }))
                .collect::<Vec<_>>()
        }))
        .collect::<Vec<_>>())
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn spreadsheet_exists(&self, spreadsheet_id: &str) -> Result<bool, SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.spreadsheet_url(spreadsheet_id))
            .bearer_auth(token)
            .query(&[("fields", "spreadsheetId")])
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<String, SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}/spreadsheets", self.sheets_url.trim_end_matches('/')))
            .bearer_auth(token)
            .json(&json!({ "properties": { "title": title } }))
            .send()
            .await?;
        let created: CreatedSpreadsheet = read_json(response).await?;
        debug!(spreadsheet_id = %created.spreadsheet_id, "Created spreadsheet '{}'", title);
        Ok(created.spreadsheet_id)
    }

    async fn delete_spreadsheet(&self, spreadsheet_id: &str) -> Result<(), SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .delete(format!(
                "{}/files/{}",
                self.drive_url.trim_end_matches('/'),
                urlencoding::encode(spreadsheet_id)
            ))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            warn!("Spreadsheet {} was already gone", spreadsheet_id);
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, SourceError> {
        Ok(self
            .sheet_properties(spreadsheet_id)
            .await?
            .into_iter()
            .map(|p| p.title)
            .collect())
    }

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError> {
        self.batch_update(
            spreadsheet_id,
            vec![json!({ "addSheet": { "properties": { "title": title } } })],
        )
        .await
    }

    async fn delete_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), SourceError> {
        let Some(sheet_id) = self.sheet_id(spreadsheet_id, title).await? else {
            debug!("Sheet '{}' not present, nothing to delete", title);
            return Ok(());
        };
        self.batch_update(
            spreadsheet_id,
            vec![json!({ "deleteSheet": { "sheetId": sheet_id } })],
        )
        .await
    }

    async fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        old_title: &str,
        new_title: &str,
    ) -> Result<(), SourceError> {
        let sheet_id = self.require_sheet_id(spreadsheet_id, old_title).await?;
        self.batch_update(
            spreadsheet_id,
            vec![json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "title": new_title },
                    "fields": "title"
                }
            })],
        )
        .await
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<(), SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}:clear", self.values_url(spreadsheet_id, range)))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .put(self.values_url(spreadsheet_id, range))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}:append", self.values_url(spreadsheet_id, range)))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SourceError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.values_url(spreadsheet_id, range))
            .bearer_auth(token)
            .send()
            .await?;
        let value_range: ValueRange = read_json(response).await?;
        Ok(value_range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn delete_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        runs: &[(usize, usize)],
    ) -> Result<(), SourceError> {
        if runs.is_empty() {
            return Ok(());
        }
        let sheet_id = self.require_sheet_id(spreadsheet_id, sheet).await?;
        let requests = runs
            .iter()
            .map(|(first, last)| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": first.saturating_sub(1),
                            "endIndex": last
                        }
                    }
                })
            })
            .collect();
        self.batch_update(spreadsheet_id, requests).await
    }

    async fn insert_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        at_row: usize,
        rows: &[Vec<String>],
    ) -> Result<(), SourceError> {
        if rows.is_empty() {
            return Ok(());
        }
        let sheet_id = self.require_sheet_id(spreadsheet_id, sheet).await?;
        let start_index = at_row.saturating_sub(1);

        // Insert and fill in one batch so a retry never leaves blank rows behind
        let requests = vec![
            json!({
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": start_index,
                        "endIndex": start_index + rows.len()
                    },
                    "inheritFromBefore": false
                }
            }),
            json!({
                "updateCells": {
                    "start": { "sheetId": sheet_id, "rowIndex": start_index, "columnIndex": 0 },
                    "rows": string_rows(rows),
                    "fields": "userEnteredValue"
                }
            }),
        ];
        self.batch_update(spreadsheet_id, requests).await
    }

    async fn reorder_sheets(
        &self,
        spreadsheet_id: &str,
        titles_in_order: &[String],
    ) -> Result<(), SourceError> {
        let properties = self.sheet_properties(spreadsheet_id).await?;
        let requests = titles_in_order
            .iter()
            .enumerate()
            .filter_map(|(index, title)| {
                properties.iter().find(|p| &p.title == title).map(|p| {
                    json!({
                        "updateSheetProperties": {
                            "properties": { "sheetId": p.sheet_id, "index": index },
                            "fields": "index"
                        }
                    })
                })
            })
            .collect();
        self.batch_update(spreadsheet_id, requests).await
    }
}
