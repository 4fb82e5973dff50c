//! Error types for archive fetches.
//!
//! None of these escape the pipeline boundaries: the lister turns them into an
//! empty listing and the batch fetcher drops the affected item.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, DNS, TLS or body read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("unexpected status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Body was not valid JSON
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The owning poll cycle was superseded or shut down
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
