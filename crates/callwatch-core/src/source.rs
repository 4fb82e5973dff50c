//! Network access to the transcript archive.
//!
//! [`TranscriptSource`] is the seam between the poll pipeline and HTTP; the
//! scheduler and batch fetcher are generic over it so they can be driven by
//! an in-memory archive in tests.

use std::future::Future;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PollingConfig;
use crate::error::FetchError;
use crate::listing::{parse_listing, DirectoryEntry};

/// Used when a transcript file has no (or an empty) `transcript.transcript`.
pub const NO_TRANSCRIPT: &str = "No transcript available";

pub trait TranscriptSource: Send + Sync + 'static {
    /// Candidate entries under `base_url`. Failures yield an empty list.
    fn list_directory(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Vec<DirectoryEntry>> + Send;

    /// Raw transcript text for one JSON file.
    fn fetch_transcript(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Pull the transcript string out of a transcript file body.
pub fn extract_transcript(body: &Value) -> String {
    body["transcript"]["transcript"]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_TRANSCRIPT)
        .to_string()
}

/// reqwest-backed archive client.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(polling: &PollingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(polling.user_agent.clone())
            .timeout(polling.request_timeout())
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and read the body, abandoning the request if `cancel` fires.
    async fn get_text(&self, url: &str, cancel: &CancellationToken) -> Result<String, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status,
                    url: url.to_string(),
                });
            }
            Ok(response.text().await?)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = request => result,
        }
    }
}

impl TranscriptSource for HttpSource {
    async fn list_directory(
        &self,
        base_url: &str,
        cancel: &CancellationToken,
    ) -> Vec<DirectoryEntry> {
        match self.get_text(base_url, cancel).await {
            Ok(html) => {
                let entries = parse_listing(base_url, &html);
                debug!("[listing] {} → {} json entries", base_url, entries.len());
                entries
            }
            Err(FetchError::Cancelled) => Vec::new(),
            Err(e @ FetchError::Status { .. }) => {
                // Tomorrow's or a purged day's directory 404s routinely.
                debug!("[listing] {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("[listing] {} failed: {}", base_url, e);
                Vec::new()
            }
        }
    }

    async fn fetch_transcript(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let text = self.get_text(url, cancel).await?;
        let body: Value = serde_json::from_str(&text)?;
        Ok(extract_transcript(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_transcript() {
        let body = json!({ "transcript": { "transcript": "Engine 4 respond" } });
        assert_eq!(extract_transcript(&body), "Engine 4 respond");
    }

    #[test]
    fn missing_or_empty_transcript_uses_default() {
        for body in [
            json!({}),
            json!({ "transcript": null }),
            json!({ "transcript": "flat string" }),
            json!({ "transcript": { "transcript": "" } }),
            json!({ "transcript": { "transcript": 42 } }),
            json!([1, 2, 3]),
        ] {
            assert_eq!(extract_transcript(&body), NO_TRANSCRIPT, "{body}");
        }
    }
}
