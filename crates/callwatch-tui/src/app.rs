//! App: component-based event loop.
//!
//! Architecture:
//! - `App` owns the components, `AppState`, the audio player and the toasts.
//! - A `tokio::mpsc` channel carries `AppMessage` events in from the terminal
//!   reader and from [`ChannelRenderer`], which the poll scheduler renders into.
//! - Scheduler status arrives on a `watch` channel; control goes back out as
//!   `PollControl` on a separate mpsc channel.
//! - Components return `Vec<Action>`; App dispatches each Action.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use ratatui::crossterm::{
    cursor::Show,
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    widgets::Block,
    Terminal,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use callwatch_core::poll::{PollControl, PollStatus};
use callwatch_core::render::{Renderer, TranscriptRecord};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{header::Header, help_overlay::HelpOverlay, transcript_list::TranscriptList},
    player::Player,
    widgets::toast::ToastManager,
};

// ── Internal event bus ────────────────────────────────────────────────────────

pub enum AppMessage {
    Event(Event),
    TranscriptsUpdated(Vec<TranscriptRecord>),
}

/// Renderer that hands each new list to the UI loop.
///
/// Never blocks the scheduler: a full queue is reported as a render failure,
/// so the same window is rendered again on the next cycle.
pub struct ChannelRenderer {
    tx: mpsc::Sender<AppMessage>,
}

impl ChannelRenderer {
    pub fn new(tx: mpsc::Sender<AppMessage>) -> Self {
        Self { tx }
    }
}

impl Renderer for ChannelRenderer {
    fn render(&self, records: Vec<TranscriptRecord>) -> anyhow::Result<()> {
        match self.tx.try_send(AppMessage::TranscriptsUpdated(records)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => anyhow::bail!("ui queue full"),
            Err(TrySendError::Closed(_)) => anyhow::bail!("ui closed"),
        }
    }
}

// ── Persisted preferences ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPrefs {
    pub dark_mode: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self { dark_mode: true }
    }
}

pub fn load_ui_prefs(path: &Path) -> UiPrefs {
    let Ok(content) = std::fs::read_to_string(path) else {
        return UiPrefs::default();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

pub fn save_ui_prefs(path: &Path, prefs: &UiPrefs) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(prefs)?)?;
    Ok(())
}

// ── Terminal guard ────────────────────────────────────────────────────────────

/// Runs `restore` when dropped, so raw mode and the alternate screen are
/// undone on every exit path, including early `?` returns.
pub struct TerminalGuard<F: FnMut() = fn()> {
    restore: F,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self {
            restore: restore_terminal,
        };
        execute!(io::stdout(), EnterAlternateScreen, EnableFocusChange)?;
        Ok(guard)
    }
}

impl<F: FnMut()> Drop for TerminalGuard<F> {
    fn drop(&mut self) {
        (self.restore)();
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!("disable_raw_mode failed: {}", e);
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, DisableFocusChange, Show) {
        warn!("terminal restore failed: {}", e);
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    state: AppState,
    header: Header,
    transcripts: TranscriptList,
    help: HelpOverlay,
    toast: ToastManager,
    player: Player,
    prefs_path: PathBuf,
    copy_confirm: Duration,
    user_paused: bool,
    poll_tx: mpsc::Sender<PollControl>,
    status_rx: watch::Receiver<PollStatus>,
    should_quit: bool,
}

impl App {
    pub fn new(
        channel: String,
        prefs_path: PathBuf,
        player: Player,
        copy_confirm: Duration,
        poll_tx: mpsc::Sender<PollControl>,
        status_rx: watch::Receiver<PollStatus>,
    ) -> Self {
        let prefs = load_ui_prefs(&prefs_path);
        let state = AppState {
            channel,
            dark_mode: prefs.dark_mode,
            poll: status_rx.borrow().clone(),
            ..Default::default()
        };
        Self {
            state,
            header: Header::new(),
            transcripts: TranscriptList::new(),
            help: HelpOverlay::new(),
            toast: ToastManager::new(),
            player,
            prefs_path,
            copy_confirm,
            user_paused: false,
            poll_tx,
            status_rx,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    /// `tx` feeds the same queue as `rx`; the terminal reader sends on it.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<AppMessage>,
        mut rx: mpsc::Receiver<AppMessage>,
    ) -> anyhow::Result<()> {
        let guard = TerminalGuard::enter()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        // ── Background task: keyboard/focus events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });
        drop(tx);

        // Toast expiry + player reaping
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut status_open = true;
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }

                changed = self.status_rx.changed(), if status_open => {
                    match changed {
                        Ok(()) => {
                            self.state.poll = self.status_rx.borrow_and_update().clone();
                            needs_redraw = true;
                        }
                        Err(_) => {
                            warn!("poll scheduler stopped");
                            self.toast.warning("poll scheduler stopped");
                            status_open = false;
                            needs_redraw = true;
                        }
                    }
                }

                _ = ui_tick.tick() => {
                    needs_redraw |= self.toast.tick();
                    if self.player.reap() {
                        self.state.now_playing = None;
                        needs_redraw = true;
                    }
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        info!("shutting down");
        let _ = self.poll_tx.send(PollControl::Shutdown).await;
        self.player.stop().await;
        drop(guard);

        Ok(())
    }

    // ── Message handler ───────────────────────────────────────────────────────

    /// Returns `true` if the message requires a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return false;
                    }
                    for action in self.handle_key(key) {
                        self.dispatch(action).await;
                    }
                    true
                }
                // Terminal focus stands in for page visibility.
                Event::FocusGained => {
                    self.send_control(PollControl::Visibility(true));
                    false
                }
                Event::FocusLost => {
                    self.send_control(PollControl::Visibility(false));
                    false
                }
                Event::Resize(_, _) => true,
                _ => false,
            },

            AppMessage::TranscriptsUpdated(records) => {
                debug!("list replaced with {} records", records.len());
                self.state.record_count = records.len();
                self.state.last_update = Some(Local::now());
                self.transcripts.set_records(records);
                true
            }
        }
    }

    // ── Key routing ───────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return vec![Action::Quit];
        }

        // Overlay swallows everything while open.
        let overlay = self.help.handle_key(key, &self.state);
        if !overlay.is_empty() {
            return overlay;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => vec![Action::Quit],
            KeyCode::Char('?') => vec![Action::ToggleHelp],
            KeyCode::Char('p') => vec![Action::TogglePause],
            KeyCode::Char('r') => vec![Action::PollNow],
            KeyCode::Char('d') => vec![Action::ToggleDarkMode],
            _ => self.transcripts.handle_key(key, &self.state),
        }
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            queue.extend(self.transcripts.on_action(&action, &self.state));
            queue.extend(self.help.on_action(&action, &self.state));
            self.apply(action).await;
        }
    }

    async fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,

            Action::Listen { id, url } => match self.player.play(&id, &url).await {
                Ok(()) => self.state.now_playing = self.player.now_playing().map(str::to_string),
                Err(e) => {
                    warn!("listen failed: {}", e);
                    self.state.now_playing = None;
                    self.toast.error(format!("audio: {}", e));
                }
            },

            Action::StopAudio => {
                self.player.stop().await;
                self.state.now_playing = None;
            }

            Action::CopyToClipboard(text) => {
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text)) {
                    Ok(()) => self.toast.success("Copied!", self.copy_confirm),
                    Err(e) => {
                        warn!("clipboard error: {}", e);
                        self.toast.error(format!("clipboard error: {}", e));
                    }
                }
            }

            Action::TogglePause => {
                self.user_paused = !self.user_paused;
                self.send_control(PollControl::SetPaused(self.user_paused));
                self.toast.info(if self.user_paused {
                    "polling paused"
                } else {
                    "polling resumed"
                });
            }

            Action::PollNow => {
                self.send_control(PollControl::PollNow);
                self.toast.info("refreshing…");
            }

            Action::ToggleDarkMode => {
                self.state.dark_mode = !self.state.dark_mode;
                let prefs = UiPrefs {
                    dark_mode: self.state.dark_mode,
                };
                if let Err(e) = save_ui_prefs(&self.prefs_path, &prefs) {
                    warn!("failed to save ui prefs: {}", e);
                }
            }

            Action::SelectUp(_)
            | Action::SelectDown(_)
            | Action::SelectFirst
            | Action::SelectLast
            | Action::ToggleDetail
            | Action::ToggleHelp
            | Action::Noop => {}
        }
    }

    fn send_control(&self, control: PollControl) {
        if let Err(e) = self.poll_tx.try_send(control) {
            warn!("poll control {:?} dropped: {}", control, e);
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(self.state.palette().base()), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(area);

        self.header.draw(frame, chunks[0], false, &self.state);
        self.transcripts.draw(frame, chunks[1], true, &self.state);
        self.help.draw(frame, area, true, &self.state);
        self.toast.draw(frame, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwatch_core::classify::Severity;

    fn record(id: &str) -> TranscriptRecord {
        TranscriptRecord {
            id: id.to_string(),
            time: "03/15/2024, 07:30:22".into(),
            transcript_markup: "x".into(),
            audio_link: format!("https://a.example/{id}.mp3"),
            severity: Severity::None,
        }
    }

    #[test]
    fn prefs_default_when_missing_or_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ui_state.json");
        assert_eq!(load_ui_prefs(&path), UiPrefs::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_ui_prefs(&path), UiPrefs::default());
    }

    #[test]
    fn dark_mode_choice_survives_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ui_state.json");
        save_ui_prefs(&path, &UiPrefs { dark_mode: false }).unwrap();
        assert!(!load_ui_prefs(&path).dark_mode);
    }

    #[tokio::test]
    async fn channel_renderer_delivers_records() {
        let (tx, mut rx) = mpsc::channel(4);
        let renderer = ChannelRenderer::new(tx);
        renderer.render(vec![record("a"), record("b")]).unwrap();

        match rx.recv().await {
            Some(AppMessage::TranscriptsUpdated(records)) => assert_eq!(records.len(), 2),
            _ => panic!("expected TranscriptsUpdated"),
        }
    }

    #[test]
    fn channel_renderer_fails_when_ui_is_behind_or_gone() {
        let (tx, rx) = mpsc::channel(1);
        let renderer = ChannelRenderer::new(tx);
        renderer.render(vec![record("a")]).unwrap();
        assert!(renderer.render(vec![record("b")]).is_err());

        drop(rx);
        assert!(renderer.render(vec![record("c")]).is_err());
    }

    #[test]
    fn terminal_is_restored_when_setup_fails_midway() {
        use std::cell::Cell;

        let restored = Cell::new(0);
        let setup = || -> anyhow::Result<()> {
            let _guard = TerminalGuard {
                restore: || restored.set(restored.get() + 1),
            };
            anyhow::bail!("draw failed")
        };

        assert!(setup().is_err());
        assert_eq!(restored.get(), 1);
    }

    #[tokio::test]
    async fn key_actions_drive_the_scheduler() {
        let dir = tempfile::TempDir::new().unwrap();
        let (poll_tx, mut poll_rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(PollStatus::default());
        let mut app = App::new(
            "law2".into(),
            dir.path().join("ui_state.json"),
            Player::with_binary(None, 0.8),
            Duration::from_millis(1500),
            poll_tx,
            status_rx,
        );

        let press = |c| AppMessage::Event(Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        app.handle_message(press('p')).await;
        app.handle_message(press('p')).await;
        app.handle_message(press('r')).await;
        app.handle_message(AppMessage::Event(Event::FocusLost)).await;

        assert_eq!(poll_rx.recv().await, Some(PollControl::SetPaused(true)));
        assert_eq!(poll_rx.recv().await, Some(PollControl::SetPaused(false)));
        assert_eq!(poll_rx.recv().await, Some(PollControl::PollNow));
        assert_eq!(poll_rx.recv().await, Some(PollControl::Visibility(false)));

        app.handle_message(press('d')).await;
        assert!(!load_ui_prefs(&dir.path().join("ui_state.json")).dark_mode);

        app.handle_message(AppMessage::TranscriptsUpdated(vec![record("a")])).await;
        assert_eq!(app.state.record_count, 1);
        assert!(app.state.last_update.is_some());
    }
}
