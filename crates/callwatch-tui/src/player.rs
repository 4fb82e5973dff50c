//! Shared audio player: one mpv child process at a time.
//!
//! Every Listen kills the previous process before spawning the next, so at
//! most one call is audible. mpv streams the `.mp3` itself; nothing is
//! downloaded up front.

use std::path::PathBuf;
use std::process::Stdio;

use tracing::{info, warn};

pub struct Player {
    binary: Option<PathBuf>,
    volume: f32,
    process: Option<tokio::process::Child>,
    now_playing: Option<String>,
}

impl Player {
    pub fn new(volume: f32) -> Self {
        Self::with_binary(callwatch_core::platform::find_mpv_binary(), volume)
    }

    pub fn with_binary(binary: Option<PathBuf>, volume: f32) -> Self {
        Self {
            binary,
            volume: volume.clamp(0.0, 1.0),
            process: None,
            now_playing: None,
        }
    }

    /// Id of the record whose audio is playing.
    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    /// Stop whatever is playing and start `url`.
    pub async fn play(&mut self, id: &str, url: &str) -> anyhow::Result<()> {
        self.stop().await;

        let binary = self
            .binary
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found (set MPV_PATH)"))?;

        let stderr_path = callwatch_core::platform::data_dir().join("mpv-stderr.log");
        let stderr = match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)
        {
            Ok(f) => Stdio::from(f),
            Err(_) => Stdio::null(),
        };

        let vol_arg = format!(
            "--volume={}",
            (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        let child = tokio::process::Command::new(&binary)
            .arg("--no-video")
            .arg("--quiet")
            .arg(&vol_arg)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;
        info!("[player] {} → pid {:?}", url, child.id());

        self.process = Some(child);
        self.now_playing = Some(id.to_string());
        Ok(())
    }

    /// Kill the process if running.
    pub async fn stop(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        self.now_playing = None;
    }

    /// Reap a process that finished on its own. Returns `true` if playback
    /// state changed.
    pub fn reap(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => false,
            Ok(Some(status)) => {
                if !status.success() {
                    warn!("[player] mpv exited with {}", status);
                }
                self.process = None;
                self.now_playing = None;
                true
            }
            Err(e) => {
                warn!("[player] status check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let mut player = Player::with_binary(None, 0.8);
        assert!(player.play("a", "https://a.example/a.mp3").await.is_err());
        assert_eq!(player.now_playing(), None);
    }

    #[tokio::test]
    async fn new_listen_replaces_previous() {
        let mut player = Player::with_binary(Some(PathBuf::from("true")), 0.8);
        player.play("a", "https://a.example/a.mp3").await.unwrap();
        assert_eq!(player.now_playing(), Some("a"));
        player.play("b", "https://a.example/b.mp3").await.unwrap();
        assert_eq!(player.now_playing(), Some("b"));

        player.stop().await;
        assert_eq!(player.now_playing(), None);
    }

    #[tokio::test]
    async fn finished_process_is_reaped() {
        let mut player = Player::with_binary(Some(PathBuf::from("true")), 0.8);
        player.play("a", "https://a.example/a.mp3").await.unwrap();

        let mut reaped = false;
        for _ in 0..50 {
            if player.reap() {
                reaped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(reaped);
        assert_eq!(player.now_playing(), None);
    }
}
