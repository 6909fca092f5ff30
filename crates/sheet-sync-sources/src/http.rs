use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::SourceError;

/// Shared HTTP client for every remote service
pub fn build_http_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(concat!("sheetsync/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(SourceError::from)
}

/// Turns a non-success response into a classified error, using the Google
/// `{"error": {"message", "errors": [{"reason"}]}}` envelope when present
pub(crate) async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    let message = google_error_message(&error_text).unwrap_or(error_text);

    if status.as_u16() == 401 {
        return Err(SourceError::Auth(message));
    }
    Err(SourceError::http(status.as_u16(), message))
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Decode(format!("{}: {}", e, truncate(&body))))
}

fn google_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error.get("message")?.as_str()?.to_string();

    let reasons: Vec<&str> = error
        .get("errors")
        .and_then(|errors| errors.as_array())
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("reason").and_then(|r| r.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if reasons.is_empty() {
        Some(message)
    } else {
        Some(format!("{} [{}]", message, reasons.join(", ")))
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_error_message_with_reasons() {
        let body = r#"{"error":{"code":403,"message":"Quota exceeded for quota metric 'Queries' per day","errors":[{"reason":"rateLimitExceeded"}]}}"#;
        assert_eq!(
            google_error_message(body).unwrap(),
            "Quota exceeded for quota metric 'Queries' per day [rateLimitExceeded]"
        );
    }

    #[test]
    fn test_google_error_message_plain_body() {
        assert!(google_error_message("Internal Server Error").is_none());
    }
}
