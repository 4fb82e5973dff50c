//! Action enum: user intents produced by components, dispatched by the App.

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Navigation ───────────────────────────────────────────────────────────
    SelectUp(usize),
    SelectDown(usize),
    SelectFirst,
    SelectLast,

    // ── Audio ────────────────────────────────────────────────────────────────
    /// Play `url` for record `id`, replacing whatever is playing.
    Listen { id: String, url: String },
    StopAudio,

    // ── Transcript ───────────────────────────────────────────────────────────
    CopyToClipboard(String),

    // ── Polling ──────────────────────────────────────────────────────────────
    TogglePause,
    PollNow,

    // ── UI ───────────────────────────────────────────────────────────────────
    ToggleDarkMode,
    ToggleDetail,
    ToggleHelp,
    Quit,
    Noop,
}
