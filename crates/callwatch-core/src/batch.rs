//! Bounded-concurrency transcript fetching.
//!
//! A fixed number of workers share one cursor; each claims the next index,
//! fetches it, and keeps `(index, result)` locally. Results are written back
//! into index slots after every worker finishes, so output order matches
//! input order no matter which request completes first.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::listing::DirectoryEntry;
use crate::source::TranscriptSource;

pub const DEFAULT_WORKERS: usize = 6;

/// A transcript body that was fetched successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTranscript {
    pub entry: DirectoryEntry,
    pub transcript: String,
    pub audio_link: String,
}

/// Fetch every entry with `workers` concurrent requests.
///
/// Failed items are omitted; the rest keep their relative order.
pub async fn fetch_batch<S: TranscriptSource>(
    source: &S,
    entries: &[DirectoryEntry],
    workers: usize,
    cancel: &CancellationToken,
) -> Vec<FetchedTranscript> {
    let cursor = AtomicUsize::new(0);
    let workers = workers.max(1).min(entries.len().max(1));

    let worker = |worker_id: usize| {
        let cursor = &cursor;
        async move {
            let mut done = Vec::new();
            loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(entry) = entries.get(idx) else {
                    break;
                };
                if cancel.is_cancelled() {
                    break;
                }
                match source.fetch_transcript(&entry.url, cancel).await {
                    Ok(transcript) => done.push((
                        idx,
                        FetchedTranscript {
                            audio_link: entry.audio_link(),
                            entry: entry.clone(),
                            transcript,
                        },
                    )),
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => debug!("[batch] worker {} skipped {}: {}", worker_id, entry.filename, e),
                }
            }
            done
        }
    };

    let per_worker = join_all((0..workers).map(worker)).await;

    let mut slots: Vec<Option<FetchedTranscript>> = vec![None; entries.len()];
    for (idx, fetched) in per_worker.into_iter().flatten() {
        slots[idx] = Some(fetched);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Per-URL canned responses with optional delay.
    #[derive(Default)]
    struct FakeArchive {
        files: HashMap<String, (Duration, Option<String>)>,
        completed: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeArchive {
        fn file(mut self, name: &str, delay_ms: u64, body: Option<&str>) -> Self {
            self.files.insert(
                url(name),
                (Duration::from_millis(delay_ms), body.map(str::to_string)),
            );
            self
        }
    }

    impl TranscriptSource for FakeArchive {
        async fn list_directory(
            &self,
            _base_url: &str,
            _cancel: &CancellationToken,
        ) -> Vec<DirectoryEntry> {
            Vec::new()
        }

        async fn fetch_transcript(
            &self,
            url: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let (delay, body) = self.files.get(url).cloned().unwrap_or_default();
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.lock().unwrap().push(url.to_string());
            body.ok_or_else(|| FetchError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                url: url.to_string(),
            })
        }
    }

    fn url(name: &str) -> String {
        format!("https://archive.example/law1/2024/3/15/{name}")
    }

    fn entry(name: &str) -> DirectoryEntry {
        DirectoryEntry {
            url: url(name),
            filename: name.to_string(),
        }
    }

    #[tokio::test]
    async fn failed_item_is_omitted_and_order_is_kept() {
        let archive = FakeArchive::default()
            .file("a.json", 60, Some("alpha"))
            .file("b.json", 0, None)
            .file("c.json", 5, Some("charlie"));
        let entries = vec![entry("a.json"), entry("b.json"), entry("c.json")];

        let out = fetch_batch(&archive, &entries, 6, &CancellationToken::new()).await;

        let completed = archive.completed.lock().unwrap().clone();
        let pos = |n: &str| completed.iter().position(|u| u == &url(n)).unwrap();
        assert!(pos("c.json") < pos("a.json"), "c should finish first");

        let names: Vec<_> = out.iter().map(|f| f.entry.filename.as_str()).collect();
        assert_eq!(names, vec!["a.json", "c.json"]);
        assert_eq!(out[0].transcript, "alpha");
        assert_eq!(out[1].audio_link, url("c.mp3"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_worker_count() {
        let mut archive = FakeArchive::default();
        let mut entries = Vec::new();
        for i in 0..20 {
            let name = format!("call_{i:02}.json");
            archive = archive.file(&name, 10, Some("x"));
            entries.push(entry(&name));
        }

        let out = fetch_batch(&archive, &entries, DEFAULT_WORKERS, &CancellationToken::new()).await;

        assert_eq!(out.len(), 20);
        assert_eq!(archive.peak.load(Ordering::SeqCst), DEFAULT_WORKERS);
        let names: Vec<_> = out.iter().map(|f| f.entry.filename.clone()).collect();
        let expected: Vec<_> = entries.iter().map(|e| e.filename.clone()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn cancelled_batch_claims_nothing() {
        let archive = FakeArchive::default().file("a.json", 0, Some("alpha"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let out = fetch_batch(&archive, &[entry("a.json")], 6, &cancel).await;

        assert!(out.is_empty());
        assert!(archive.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let archive = FakeArchive::default();
        let out = fetch_batch(&archive, &[], 6, &CancellationToken::new()).await;
        assert!(out.is_empty());
    }
}
