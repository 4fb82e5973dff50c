//! Core pipeline for watching a dispatch transcript archive.
//!
//! ```text
//!   PollScheduler ──▶ TranscriptSource::list_directory   (listing)
//!        │        ──▶ fetch_batch ──▶ fetch_transcript    (batch)
//!        │        ──▶ KeywordClassifier + filename codec   (classify, filename)
//!        └───────────▶ Renderer                            (render)
//! ```

pub mod batch;
pub mod classify;
pub mod config;
pub mod digest;
pub mod error;
pub mod filename;
pub mod listing;
pub mod platform;
pub mod poll;
pub mod render;
pub mod source;
