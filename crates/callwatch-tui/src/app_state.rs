//! AppState: shared read-only data passed to components during render/event.
//!
//! The App event loop is the only writer.

use chrono::{DateTime, Local};

use callwatch_core::poll::PollStatus;

use crate::theme::Palette;

#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Channel being watched, e.g. `law2`.
    pub channel: String,
    pub dark_mode: bool,
    /// Latest snapshot from the poll scheduler.
    pub poll: PollStatus,
    /// Record id whose audio is currently playing.
    pub now_playing: Option<String>,
    /// Wall-clock time the list was last replaced.
    pub last_update: Option<DateTime<Local>>,
    pub record_count: usize,
}

impl AppState {
    pub fn palette(&self) -> &'static Palette {
        Palette::for_mode(self.dark_mode)
    }
}
