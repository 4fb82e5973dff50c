//! Classified records and the sink that displays them.

use serde::{Deserialize, Serialize};

use crate::classify::Severity;

/// One transcript ready for display. Built once per successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Source filename, unique within the archive.
    pub id: String,
    /// Pacific display time, `MM/DD/YYYY, HH:MM:SS`.
    pub time: String,
    /// HTML-escaped transcript with keyword highlight spans.
    pub transcript_markup: String,
    pub audio_link: String,
    pub severity: Severity,
}

/// Materializes a full, ordered record list. Each call replaces whatever was
/// shown before; there is no incremental patching.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, records: Vec<TranscriptRecord>) -> anyhow::Result<()>;
}
