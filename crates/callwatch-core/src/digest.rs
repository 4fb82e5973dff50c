//! Plain-text "last N hours" digest of a channel.
//!
//! Output is two files in the digest directory:
//! `{channel}_last{N}h.txt`, one stamped line per transmission newest first,
//! and `{channel}_last{N}h_meta.json`. Both are replaced atomically so a
//! reader never sees a half-written file.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::fetch_batch;
use crate::classify::{KeywordClassifier, NO_AUDIO_SENTINEL};
use crate::config::DigestStamp;
use crate::filename::{parse_filename_timestamp, to_pacific};
use crate::listing::DirectoryEntry;
use crate::poll::day_directory_urls;
use crate::source::{TranscriptSource, NO_TRANSCRIPT};

#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub archive_base: String,
    pub channel: String,
    pub window_hours: u32,
    pub workers: usize,
    pub stamp: DigestStamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    pub instant: DateTime<Utc>,
    pub text: String,
}

impl DigestLine {
    pub fn format(&self, stamp: DigestStamp) -> String {
        match stamp {
            DigestStamp::Utc => {
                format!("{} {}", self.instant.format("%Y-%m-%d %H:%M:%S UTC"), self.text)
            }
            DigestStamp::Pacific => format!(
                "{}: {}",
                to_pacific(self.instant).format("%m/%d/%Y %H:%M:%S"),
                self.text
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestMeta {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub generated_utc: String,
    pub window_hours: u32,
    pub lines: usize,
    /// Transcripts fetched successfully this run.
    pub fetched: usize,
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub lines: Vec<DigestLine>,
    pub stamp: DigestStamp,
    pub meta: DigestMeta,
}

impl Digest {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.format(self.stamp));
            out.push('\n');
        }
        out
    }
}

/// Single-line form of a transcript: sentinel for boilerplate, line breaks
/// and whitespace runs collapsed to one space.
pub fn normalize_plain_text(classifier: &KeywordClassifier, raw: &str) -> String {
    if classifier.is_no_audio(raw) {
        return NO_AUDIO_SENTINEL.to_string();
    }
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        NO_TRANSCRIPT.to_string()
    } else {
        collapsed
    }
}

/// Entries stamped within `window_hours` of `now`, deduped, newest first.
pub fn select_recent(
    entries: Vec<DirectoryEntry>,
    now: DateTime<Utc>,
    window_hours: u32,
) -> Vec<(DateTime<Utc>, DirectoryEntry)> {
    let cutoff = now - chrono::Duration::hours(i64::from(window_hours));
    let mut seen = HashSet::new();
    let mut recent: Vec<_> = entries
        .into_iter()
        .filter(|e| seen.insert(e.filename.clone()))
        .filter_map(|e| parse_filename_timestamp(&e.filename).map(|ts| (ts, e)))
        .filter(|(ts, _)| *ts >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.0.cmp(&a.0));
    recent
}

/// List, filter and fetch the digest window. Never fails; unreachable
/// directories and failed transcripts are simply absent.
pub async fn build_digest<S: TranscriptSource>(
    source: &S,
    classifier: &KeywordClassifier,
    settings: &DigestSettings,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Digest {
    let cutoff = now - chrono::Duration::hours(i64::from(settings.window_hours));
    let urls = day_directory_urls(&settings.archive_base, &settings.channel, cutoff, now);
    let listed: Vec<DirectoryEntry> = join_all(urls.iter().map(|u| source.list_directory(u, cancel)))
        .await
        .into_iter()
        .flatten()
        .collect();

    let recent = select_recent(listed, now, settings.window_hours);
    debug!("[digest] {} entries within {}h", recent.len(), settings.window_hours);

    let entries: Vec<DirectoryEntry> = recent.into_iter().map(|(_, e)| e).collect();
    let fetched = fetch_batch(source, &entries, settings.workers, cancel).await;

    let lines: Vec<DigestLine> = fetched
        .iter()
        .filter_map(|f| {
            let instant = parse_filename_timestamp(&f.entry.filename)?;
            Some(DigestLine {
                instant,
                text: normalize_plain_text(classifier, &f.transcript),
            })
        })
        .collect();

    let meta = DigestMeta {
        generated_utc: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        window_hours: settings.window_hours,
        lines: lines.len(),
        fetched: fetched.len(),
    };
    Digest {
        lines,
        stamp: settings.stamp,
        meta,
    }
}

/// `({channel}_last{N}h.txt, {channel}_last{N}h_meta.json)` under `out_dir`.
pub fn output_paths(out_dir: &Path, channel: &str, window_hours: u32) -> (PathBuf, PathBuf) {
    let stem = format!("{}_last{}h", channel, window_hours);
    (
        out_dir.join(format!("{stem}.txt")),
        out_dir.join(format!("{stem}_meta.json")),
    )
}

/// Write through a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Write both digest files. Returns their paths.
pub fn write_digest(
    digest: &Digest,
    out_dir: &Path,
    channel: &str,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    let (txt_path, meta_path) = output_paths(out_dir, channel, digest.meta.window_hours);
    write_atomic(&txt_path, digest.text().as_bytes())?;
    write_atomic(&meta_path, serde_json::to_string(&digest.meta)?.as_bytes())?;
    info!(
        "[digest] wrote {} lines to {}",
        digest.meta.lines,
        txt_path.display()
    );
    Ok((txt_path, meta_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordConfig;
    use crate::error::FetchError;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(&KeywordConfig::default()).unwrap()
    }

    #[test]
    fn normalizes_whitespace_and_boilerplate() {
        let c = classifier();
        assert_eq!(
            normalize_plain_text(&c, "Engine 4\r\nrespond   to\tMain St "),
            "Engine 4 respond to Main St"
        );
        assert_eq!(normalize_plain_text(&c, "  \n "), NO_TRANSCRIPT);
        assert_eq!(
            normalize_plain_text(&c, "Thanks for watching!"),
            NO_AUDIO_SENTINEL
        );
    }

    #[test]
    fn recent_window_drops_old_and_unstamped_entries() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let e = |name: &str| DirectoryEntry {
            url: format!("https://a.example/{name}"),
            filename: name.to_string(),
        };
        let recent = select_recent(
            vec![
                e("fire_20240314_110000.json"),
                e("fire_20240315_090000.json"),
                e("fire_20240314_120000.json"),
                e("readme.json"),
                e("fire_20240315_090000.json"),
            ],
            now,
            24,
        );
        let names: Vec<_> = recent.iter().map(|(_, e)| e.filename.as_str()).collect();
        assert_eq!(names, vec!["fire_20240315_090000.json", "fire_20240314_120000.json"]);
    }

    #[test]
    fn line_format_is_utc() {
        let line = DigestLine {
            instant: Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 22).unwrap(),
            text: "Medic 2 en route".into(),
        };
        assert_eq!(
            line.format(DigestStamp::Utc),
            "2024-03-15 14:30:22 UTC Medic 2 en route"
        );
    }

    #[test]
    fn pacific_line_format_follows_dst() {
        let winter = DigestLine {
            instant: Utc.with_ymd_and_hms(2024, 1, 10, 20, 5, 0).unwrap(),
            text: "Brush fire".into(),
        };
        assert_eq!(winter.format(DigestStamp::Pacific), "01/10/2024 12:05:00: Brush fire");

        let summer = DigestLine {
            instant: Utc.with_ymd_and_hms(2024, 7, 4, 3, 0, 0).unwrap(),
            text: "Fireworks complaint".into(),
        };
        assert_eq!(
            summer.format(DigestStamp::Pacific),
            "07/03/2024 20:00:00: Fireworks complaint"
        );
    }

    struct StaticArchive {
        listings: HashMap<String, Vec<DirectoryEntry>>,
        bodies: HashMap<String, String>,
    }

    impl TranscriptSource for StaticArchive {
        async fn list_directory(&self, base_url: &str, _: &CancellationToken) -> Vec<DirectoryEntry> {
            self.listings.get(base_url).cloned().unwrap_or_default()
        }

        async fn fetch_transcript(&self, url: &str, _: &CancellationToken) -> Result<String, FetchError> {
            self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                url: url.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn builds_and_writes_digest() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        let today = "https://a.example/fire/2024/3/15/".to_string();
        let yesterday = "https://a.example/fire/2024/3/14/".to_string();
        let entry = |dir: &str, name: &str| DirectoryEntry {
            url: format!("{dir}{name}"),
            filename: name.to_string(),
        };

        let mut listings = HashMap::new();
        listings.insert(today.clone(), vec![entry(&today, "fire_20240315_003000.json")]);
        listings.insert(
            yesterday.clone(),
            vec![
                entry(&yesterday, "fire_20240314_200000.json"),
                entry(&yesterday, "fire_20240313_200000.json"),
            ],
        );
        let mut bodies = HashMap::new();
        bodies.insert(format!("{today}fire_20240315_003000.json"), "Brush fire\nnear I-5".to_string());
        bodies.insert(format!("{yesterday}fire_20240314_200000.json"), "thank you for watching".to_string());
        let archive = StaticArchive { listings, bodies };

        let settings = DigestSettings {
            archive_base: "https://a.example".into(),
            channel: "fire".into(),
            window_hours: 24,
            workers: 6,
            stamp: DigestStamp::Utc,
        };
        let digest = build_digest(&archive, &classifier(), &settings, now, &CancellationToken::new()).await;

        assert_eq!(
            digest.text(),
            "2024-03-15 00:30:00 UTC Brush fire near I-5\n\
             2024-03-14 20:00:00 UTC -- FIRE TONE OR NO AUDIO --\n"
        );
        assert_eq!(digest.meta.generated_utc, "2024-03-15T01:00:00Z");
        assert_eq!(digest.meta.fetched, 2);

        let dir = tempfile::TempDir::new().unwrap();
        let (txt, meta) = write_digest(&digest, dir.path(), "fire").unwrap();
        assert!(txt.ends_with("fire_last24h.txt"));
        assert_eq!(std::fs::read_to_string(&txt).unwrap(), digest.text());
        let parsed: DigestMeta = serde_json::from_str(&std::fs::read_to_string(meta).unwrap()).unwrap();
        assert_eq!(parsed.lines, 2);

        // Rewriting replaces rather than appends.
        write_digest(&digest, dir.path(), "fire").unwrap();
        assert_eq!(std::fs::read_to_string(&txt).unwrap(), digest.text());
    }

    #[tokio::test]
    async fn long_window_lists_every_day_it_spans() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        let dirs = [
            "https://a.example/law2/2024/3/15/",
            "https://a.example/law2/2024/3/14/",
            "https://a.example/law2/2024/3/13/",
            "https://a.example/law2/2024/3/12/",
        ];
        let names = [
            "law2_20240315_003000.json",
            "law2_20240314_090000.json",
            "law2_20240313_120000.json",
            "law2_20240312_120000.json",
        ];

        let mut listings = HashMap::new();
        let mut bodies = HashMap::new();
        for (dir, name) in dirs.iter().zip(names) {
            let url = format!("{dir}{name}");
            listings.insert(
                dir.to_string(),
                vec![DirectoryEntry {
                    url: url.clone(),
                    filename: name.to_string(),
                }],
            );
            bodies.insert(url, format!("traffic stop {name}"));
        }
        let archive = StaticArchive { listings, bodies };

        let settings = DigestSettings {
            archive_base: "https://a.example".into(),
            channel: "law2".into(),
            window_hours: 48,
            workers: 2,
            stamp: DigestStamp::Pacific,
        };
        let digest = build_digest(&archive, &classifier(), &settings, now, &CancellationToken::new()).await;

        // 3/12 is before the cutoff day and never listed.
        assert_eq!(digest.meta.lines, 3);
        assert_eq!(
            digest.text(),
            "03/14/2024 17:30:00: traffic stop law2_20240315_003000.json\n\
             03/14/2024 02:00:00: traffic stop law2_20240314_090000.json\n\
             03/13/2024 05:00:00: traffic stop law2_20240313_120000.json\n"
        );
    }
}
