use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

/// Where transcripts are published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Archive root, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Dispatch channel directory under the archive root (`law1`, `law2`, `fire1`, ...).
    #[serde(default = "default_channel")]
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Most recent entries considered per cycle.
    #[serde(default = "default_max_window")]
    pub max_window: usize,
    /// Concurrent transcript fetches per cycle.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Case-insensitive literal vocabularies, one per severity tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_red")]
    pub red: Vec<String>,
    #[serde(default = "default_yellow")]
    pub yellow: Vec<String>,
    #[serde(default = "default_orange")]
    pub orange: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// How long the "Copied!" confirmation stays up.
    #[serde(default = "default_copy_confirm_ms")]
    pub copy_confirm_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Directory the digest text and meta files are written to.
    #[serde(default = "default_digest_dir")]
    pub out_dir: PathBuf,
    /// Timestamp style for digest lines.
    #[serde(default)]
    pub stamp: DigestStamp,
}

/// `utc`: `2024-03-15 14:30:22 UTC text`.
/// `pacific`: `03/15/2024 07:30:22: text`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestStamp {
    #[default]
    Utc,
    Pacific,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            channel: default_channel(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_window: default_max_window(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            red: default_red(),
            yellow: default_yellow(),
            orange: default_orange(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            copy_confirm_ms: default_copy_confirm_ms(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            out_dir: default_digest_dir(),
            stamp: DigestStamp::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://archive.theroseburgreceiver.com".to_string()
}

fn default_channel() -> String {
    "law2".to_string()
}

fn default_interval_secs() -> u64 {
    15
}

fn default_max_window() -> usize {
    150
}

fn default_workers() -> usize {
    crate::batch::DEFAULT_WORKERS
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("callwatch/{}", env!("CARGO_PKG_VERSION"))
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_red() -> Vec<String> {
    strings(&[
        "commercial fire",
        "cover fire",
        "flue fire",
        "structure fire",
        "urgent",
        "smoke",
        "accident",
        "grass fire",
        "burn",
        "vehicle fire",
        "mva",
        "nva ",
        "mba ",
        "explosion",
        "gunshot",
    ])
}

fn default_yellow() -> Vec<String> {
    strings(&[
        "medical aid",
        "mutual aid",
        "flood",
        "power outage",
        "road closure",
        "water rescue",
    ])
}

fn default_orange() -> Vec<String> {
    strings(&["fire alarm", "fire investigation"])
}

fn default_volume() -> f32 {
    0.8
}

fn default_copy_confirm_ms() -> u64 {
    1500
}

fn default_window_hours() -> u32 {
    24
}

fn default_digest_dir() -> PathBuf {
    platform::data_dir().join("digest")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
