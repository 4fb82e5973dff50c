use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use callwatch_core::classify::KeywordClassifier;
use callwatch_core::config::{Config, DigestStamp};
use callwatch_core::digest::{build_digest, write_digest, DigestSettings};
use callwatch_core::source::HttpSource;

/// Write a plain-text digest of the last N hours of a channel.
#[derive(Debug, Parser)]
#[command(name = "callwatch-digest", version)]
struct Args {
    /// Channel directory (overrides config).
    #[arg(long)]
    channel: Option<String>,
    /// Archive root URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,
    /// Window size in hours (overrides config).
    #[arg(long)]
    hours: Option<u32>,
    /// Output directory (overrides config).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Concurrent transcript fetches (overrides config).
    #[arg(long)]
    workers: Option<usize>,
    /// Stamp lines in US Pacific time instead of UTC.
    #[arg(long)]
    pacific: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("debug,hyper_util=warn,reqwest=warn,hyper=warn")
            }),
        )
        .init();

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let settings = DigestSettings {
        archive_base: args
            .base_url
            .unwrap_or(config.archive.base_url.clone())
            .trim_end_matches('/')
            .to_string(),
        channel: args.channel.unwrap_or(config.archive.channel.clone()),
        window_hours: args.hours.unwrap_or(config.digest.window_hours).max(1),
        workers: args.workers.unwrap_or(config.polling.workers).max(1),
        stamp: if args.pacific {
            DigestStamp::Pacific
        } else {
            config.digest.stamp
        },
    };
    let out_dir = args.out_dir.unwrap_or(config.digest.out_dir.clone());

    let source = HttpSource::new(&config.polling)?;
    let classifier = KeywordClassifier::new(&config.keywords)?;

    // One-shot run; nothing cancels it.
    let cancel = CancellationToken::new();

    let digest = build_digest(&source, &classifier, &settings, Utc::now(), &cancel).await;
    let (txt, meta) = write_digest(&digest, &out_dir, &settings.channel)?;

    println!("{}", txt.display());
    println!("{}", meta.display());
    Ok(())
}
