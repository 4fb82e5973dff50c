//! PollScheduler: single owner of the fetch → classify → render cycle.
//!
//! ```text
//!            tick / PollNow
//!   Idle ───────────────────────▶ Polling ── spawn PollCycle::run ──┐
//!    ▲   (ignored while Polling             (JoinSet)               │
//!    │    or paused)                                                 │
//!    └────────────── finish_cycle(CycleReport) ◀────────────────────┘
//! ```
//!
//! The scheduler runs in one task and owns [`PollState`]. Each cycle runs in
//! its own task so the control channel stays responsive, but a new cycle is
//! only started after the previous one has been joined. The join happens in
//! a `JoinSet`, so a cycle that panics still returns the scheduler to `Idle`.
//!
//! Every cycle carries a generation id. A cycle only commits a render while
//! its id is still the current one and its token is not cancelled, so work
//! from a superseded cycle is dropped without further coordination.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use futures_util::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::{fetch_batch, FetchedTranscript};
use crate::classify::KeywordClassifier;
use crate::config::Config;
use crate::filename::{format_pacific, parse_filename_timestamp};
use crate::listing::DirectoryEntry;
use crate::render::{Renderer, TranscriptRecord};
use crate::source::TranscriptSource;

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Archive root without trailing slash.
    pub archive_base: String,
    pub channel: String,
    pub interval: Duration,
    pub max_window: usize,
    pub workers: usize,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            archive_base: config.archive.base_url.trim_end_matches('/').to_string(),
            channel: config.archive.channel.clone(),
            interval: config.polling.interval(),
            max_window: config.polling.max_window,
            workers: config.polling.workers,
        }
    }
}

// ── Window selection ──────────────────────────────────────────────────────────

/// Listing URLs for the UTC day of `now` and the day before.
///
/// Both are polled so that recordings near midnight UTC, which is mid-
/// afternoon Pacific, are not missed when the day directory rolls over.
pub fn directory_urls(archive_base: &str, channel: &str, now: DateTime<Utc>) -> Vec<String> {
    day_directory_urls(archive_base, channel, now - chrono::Duration::days(1), now)
}

/// One listing URL per UTC day from `until` back to `since`, newest first.
/// Both ends are inclusive.
pub fn day_directory_urls(
    archive_base: &str,
    channel: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<String> {
    let first = since.date_naive();
    let mut day = until.date_naive();
    let mut urls = Vec::new();
    while day >= first {
        urls.push(format!(
            "{}/{}/{}/{}/{}/",
            archive_base,
            channel,
            day.year(),
            day.month(),
            day.day()
        ));
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    urls
}

/// Dedupe by filename, drop names without a timestamp, newest first, cap.
pub fn select_window(entries: Vec<DirectoryEntry>, max_window: usize) -> Vec<DirectoryEntry> {
    let mut seen = HashSet::new();
    let mut stamped: Vec<(DateTime<Utc>, DirectoryEntry)> = entries
        .into_iter()
        .filter(|e| seen.insert(e.filename.clone()))
        .filter_map(|e| parse_filename_timestamp(&e.filename).map(|ts| (ts, e)))
        .collect();
    // Stable sort keeps listing order for identical timestamps.
    stamped.sort_by(|a, b| b.0.cmp(&a.0));
    stamped.truncate(max_window);
    stamped.into_iter().map(|(_, e)| e).collect()
}

/// Identity of a window: its filenames in order.
pub fn window_key(window: &[DirectoryEntry]) -> String {
    window
        .iter()
        .map(|e| e.filename.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Classify one fetched transcript into a display record.
pub fn build_record(
    classifier: &KeywordClassifier,
    fetched: FetchedTranscript,
) -> Option<TranscriptRecord> {
    let instant = parse_filename_timestamp(&fetched.entry.filename)?;
    let classification = classifier.classify(&fetched.transcript);
    Some(TranscriptRecord {
        id: fetched.entry.filename,
        time: format_pacific(instant),
        transcript_markup: classification.markup,
        audio_link: fetched.audio_link,
        severity: classification.severity,
    })
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Polling,
}

/// Mutable poll bookkeeping. Lives inside the scheduler for its whole life.
#[derive(Debug, Default)]
pub struct PollState {
    phase: Phase,
    cancel: Option<CancellationToken>,
    last_rendered_key: String,
    /// View not visible (terminal unfocused).
    hidden: bool,
    /// Paused by the user.
    paused: bool,
    generation: Arc<AtomicU64>,
}

impl PollState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_flight(&self) -> bool {
        self.phase == Phase::Polling
    }

    pub fn is_paused(&self) -> bool {
        self.hidden || self.paused
    }

    pub fn last_rendered_key(&self) -> &str {
        &self.last_rendered_key
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Inputs from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    /// View became visible (`true`) or hidden (`false`).
    Visibility(bool),
    SetPaused(bool),
    /// Start a cycle now, even while paused. Ignored if one is running.
    PollNow,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Window identical to the last rendered one; nothing fetched.
    Unchanged,
    Rendered { key: String, records: usize },
    /// Every fetch in the window failed, or the window was empty.
    NothingFetched,
    /// Cycle was cancelled or a newer generation exists.
    Superseded,
    RenderFailed(String),
    /// Cycle task panicked or was aborted.
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub generation: u64,
    pub window: usize,
    pub outcome: CycleOutcome,
}

/// Snapshot published after every state change, for status displays.
#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    pub phase: Phase,
    pub paused: bool,
    pub hidden: bool,
    pub cycles_completed: u64,
    pub renders: u64,
    pub last_outcome: Option<CycleOutcome>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

// ── Cycle ─────────────────────────────────────────────────────────────────────

/// Everything one cycle needs, owned so it can run on its own task.
pub struct PollCycle<S, R> {
    generation: u64,
    current_generation: Arc<AtomicU64>,
    cancel: CancellationToken,
    source: Arc<S>,
    renderer: Arc<R>,
    classifier: Arc<KeywordClassifier>,
    settings: Arc<PollSettings>,
    last_rendered_key: String,
    now: DateTime<Utc>,
}

impl<S: TranscriptSource, R: Renderer> PollCycle<S, R> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_current(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.current_generation.load(Ordering::SeqCst) == self.generation
    }

    fn report(&self, window: usize, outcome: CycleOutcome) -> CycleReport {
        CycleReport {
            generation: self.generation,
            window,
            outcome,
        }
    }

    pub async fn run(self) -> CycleReport {
        let urls = directory_urls(&self.settings.archive_base, &self.settings.channel, self.now);
        let listings = join_all(
            urls.iter()
                .map(|url| self.source.list_directory(url, &self.cancel)),
        )
        .await;

        let window = select_window(
            listings.into_iter().flatten().collect(),
            self.settings.max_window,
        );
        let key = window_key(&window);
        if key == self.last_rendered_key {
            debug!("[poll] gen {} window unchanged ({} entries)", self.generation, window.len());
            return self.report(window.len(), CycleOutcome::Unchanged);
        }

        let fetched = fetch_batch(
            self.source.as_ref(),
            &window,
            self.settings.workers,
            &self.cancel,
        )
        .await;
        let records: Vec<TranscriptRecord> = fetched
            .into_iter()
            .filter_map(|f| build_record(&self.classifier, f))
            .collect();

        if !self.is_current() {
            debug!("[poll] gen {} superseded, dropping {} records", self.generation, records.len());
            return self.report(window.len(), CycleOutcome::Superseded);
        }
        if records.is_empty() {
            return self.report(window.len(), CycleOutcome::NothingFetched);
        }

        let count = records.len();
        match self.renderer.render(records) {
            Ok(()) => self.report(
                window.len(),
                CycleOutcome::Rendered {
                    key,
                    records: count,
                },
            ),
            Err(e) => self.report(window.len(), CycleOutcome::RenderFailed(e.to_string())),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

pub struct PollScheduler<S, R> {
    source: Arc<S>,
    renderer: Arc<R>,
    classifier: Arc<KeywordClassifier>,
    settings: Arc<PollSettings>,
    state: PollState,
    status: PollStatus,
    status_tx: watch::Sender<PollStatus>,
}

impl<S: TranscriptSource, R: Renderer> PollScheduler<S, R> {
    pub fn new(source: S, renderer: R, classifier: KeywordClassifier, settings: PollSettings) -> Self {
        let (status_tx, _) = watch::channel(PollStatus::default());
        Self {
            source: Arc::new(source),
            renderer: Arc::new(renderer),
            classifier: Arc::new(classifier),
            settings: Arc::new(settings),
            state: PollState::default(),
            status: PollStatus::default(),
            status_tx,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status_tx.subscribe()
    }

    /// Hiding only affects the next tick; a running cycle is left alone.
    pub fn set_visible(&mut self, visible: bool) {
        if self.state.hidden == visible {
            debug!("[poll] visibility → {}", visible);
        }
        self.state.hidden = !visible;
        self.publish();
    }

    pub fn set_paused(&mut self, paused: bool) {
        info!("[poll] paused → {}", paused);
        self.state.paused = paused;
        self.publish();
    }

    /// Timer entry point. `None` while a cycle is in flight or polling is paused.
    pub fn begin_cycle(&mut self, now: DateTime<Utc>) -> Option<PollCycle<S, R>> {
        if self.state.is_paused() {
            debug!("[poll] tick skipped: paused");
            return None;
        }
        self.poll_now(now)
    }

    /// Like [`begin_cycle`](Self::begin_cycle) but ignores the pause flags.
    pub fn poll_now(&mut self, now: DateTime<Utc>) -> Option<PollCycle<S, R>> {
        if self.state.in_flight() {
            debug!("[poll] tick skipped: cycle in flight");
            return None;
        }

        if let Some(previous) = self.state.cancel.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.state.cancel = Some(cancel.clone());
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.phase = Phase::Polling;
        self.publish();

        Some(PollCycle {
            generation,
            current_generation: Arc::clone(&self.state.generation),
            cancel,
            source: Arc::clone(&self.source),
            renderer: Arc::clone(&self.renderer),
            classifier: Arc::clone(&self.classifier),
            settings: Arc::clone(&self.settings),
            last_rendered_key: self.state.last_rendered_key.clone(),
            now,
        })
    }

    /// Return to `Idle` and fold the cycle's result into the state.
    pub fn finish_cycle(&mut self, report: CycleReport) {
        self.state.phase = Phase::Idle;
        self.status.cycles_completed += 1;
        self.status.last_finished_at = Some(Utc::now());

        match &report.outcome {
            CycleOutcome::Rendered { key, records } => {
                if report.generation == self.state.generation() {
                    self.state.last_rendered_key = key.clone();
                }
                self.status.renders += 1;
                info!(
                    "[poll] gen {} rendered {} records (window {})",
                    report.generation, records, report.window
                );
            }
            CycleOutcome::Unchanged | CycleOutcome::Superseded => {}
            CycleOutcome::NothingFetched => {
                if report.window > 0 {
                    warn!(
                        "[poll] gen {} fetched nothing from a window of {}",
                        report.generation, report.window
                    );
                }
            }
            CycleOutcome::RenderFailed(e) => {
                warn!("[poll] gen {} render failed: {}", report.generation, e);
            }
            CycleOutcome::Aborted(e) => {
                error!("[poll] gen {} aborted: {}", report.generation, e);
            }
        }

        self.status.last_outcome = Some(report.outcome);
        self.publish();
    }

    /// Cancel any outstanding cycle and invalidate its generation.
    pub fn shutdown(&mut self) {
        if let Some(token) = self.state.cancel.take() {
            token.cancel();
        }
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn publish(&mut self) {
        self.status.phase = self.state.phase;
        self.status.paused = self.state.paused;
        self.status.hidden = self.state.hidden;
        self.status_tx.send_replace(self.status.clone());
    }

    fn spawn(&mut self, cycles: &mut JoinSet<CycleReport>, cycle: Option<PollCycle<S, R>>) {
        if let Some(cycle) = cycle {
            debug!("[poll] starting gen {}", cycle.generation());
            cycles.spawn(cycle.run());
        }
    }

    /// Drive cycles on the configured interval until `Shutdown` or the
    /// control channel closes. The first cycle starts immediately.
    pub async fn run(mut self, mut control: mpsc::Receiver<PollControl>) {
        info!(
            "[poll] watching {}/{} every {:?}",
            self.settings.archive_base, self.settings.channel, self.settings.interval
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut cycles: JoinSet<CycleReport> = JoinSet::new();
        let mut running_generation = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cycle = self.begin_cycle(Utc::now());
                    if let Some(c) = &cycle {
                        running_generation = c.generation();
                    }
                    self.spawn(&mut cycles, cycle);
                }

                Some(joined) = cycles.join_next() => {
                    let report = joined.unwrap_or_else(|e| CycleReport {
                        generation: running_generation,
                        window: 0,
                        outcome: CycleOutcome::Aborted(e.to_string()),
                    });
                    self.finish_cycle(report);
                }

                msg = control.recv() => match msg {
                    Some(PollControl::Visibility(visible)) => self.set_visible(visible),
                    Some(PollControl::SetPaused(paused)) => self.set_paused(paused),
                    Some(PollControl::PollNow) => {
                        let cycle = self.poll_now(Utc::now());
                        if let Some(c) = &cycle {
                            running_generation = c.generation();
                        }
                        self.spawn(&mut cycles, cycle);
                    }
                    Some(PollControl::Shutdown) | None => break,
                },
            }
        }

        info!("[poll] shutting down");
        self.shutdown();
        cycles.shutdown().await;
    }
}
