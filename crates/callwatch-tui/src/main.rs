mod action;
mod app;
mod app_state;
mod component;
mod components;
mod player;
mod theme;
mod widgets;

use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use callwatch_core::classify::KeywordClassifier;
use callwatch_core::config::Config;
use callwatch_core::poll::{PollControl, PollScheduler, PollSettings};
use callwatch_core::source::HttpSource;

/// Live view of a dispatch transcript archive.
#[derive(Debug, Parser)]
#[command(name = "callwatch", version)]
struct Args {
    /// Channel directory to watch (overrides config).
    #[arg(long)]
    channel: Option<String>,
    /// Archive root URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,
    /// Seconds between polls (overrides config).
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = callwatch_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("callwatch.log");
    let ui_state_path = data_dir.join("ui_state.json");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; HTTP client internals are noisy at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("callwatch log: {}", log_path.display());
    tracing::info!("callwatch starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config load failed, using defaults: {}", e);
        Config::default()
    });
    if let Some(channel) = args.channel {
        config.archive.channel = channel;
    }
    if let Some(base_url) = args.base_url {
        config.archive.base_url = base_url;
    }
    if let Some(secs) = args.interval_secs {
        config.polling.interval_secs = secs.max(1);
    }

    let source = HttpSource::new(&config.polling)?;
    let classifier = KeywordClassifier::new(&config.keywords)?;

    // ── Channels ─────────────────────────────────────────────────────────────
    // Scheduler → UI renders and terminal events share one queue.
    let (app_tx, app_rx) = mpsc::channel::<app::AppMessage>(256);
    let (poll_tx, poll_rx) = mpsc::channel::<PollControl>(32);

    // ── Poll scheduler ───────────────────────────────────────────────────────
    let scheduler = PollScheduler::new(
        source,
        app::ChannelRenderer::new(app_tx.clone()),
        classifier,
        PollSettings::from_config(&config),
    );
    let status_rx = scheduler.subscribe();
    let poller = tokio::spawn(scheduler.run(poll_rx));

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(
        config.archive.channel.clone(),
        ui_state_path,
        player::Player::new(config.player.volume),
        Duration::from_millis(config.ui.copy_confirm_ms),
        poll_tx,
        status_rx,
    );
    let result = app.run(app_tx, app_rx).await;

    if let Err(e) = poller.await {
        tracing::error!("poll scheduler task failed: {}", e);
    }
    result
}
