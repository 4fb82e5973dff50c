//! Header component: one-row top bar.
//!
//! channel · poll state · last update · now playing · help hint.
//! Not focusable.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use callwatch_core::poll::{CycleOutcome, Phase};

use crate::{
    app_state::AppState,
    component::Component,
    theme::{C_BADGE_LIVE, C_BADGE_PAUSED, C_BADGE_PENDING, C_TOAST_WARNING},
};

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

/// Short label for the scheduler's state.
pub fn poll_label(state: &AppState) -> (&'static str, ratatui::style::Color) {
    let poll = &state.poll;
    if poll.phase == Phase::Polling {
        return ("● polling", C_BADGE_PENDING);
    }
    if poll.paused {
        return ("‖ paused", C_BADGE_PAUSED);
    }
    if poll.hidden {
        return ("‖ unfocused", C_BADGE_PAUSED);
    }
    match poll.last_outcome {
        Some(CycleOutcome::RenderFailed(_)) | Some(CycleOutcome::Aborted(_)) => {
            ("! retrying", C_TOAST_WARNING)
        }
        _ => ("● live", C_BADGE_LIVE),
    }
}

impl Component for Header {
    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        let palette = state.palette();
        let sep = Span::styled("  ·  ", palette.style_muted());
        let (label, color) = poll_label(state);

        let mut spans = vec![
            Span::styled(
                " callwatch ",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(state.channel.clone(), Style::default().fg(palette.primary)),
            sep.clone(),
            Span::styled(label, Style::default().fg(color)),
        ];

        if let Some(t) = state.last_update {
            spans.push(sep.clone());
            spans.push(Span::styled(
                format!("updated {}", t.format("%H:%M:%S")),
                palette.style_secondary(),
            ));
        }

        if let Some(id) = &state.now_playing {
            spans.push(sep.clone());
            spans.push(Span::styled(
                format!("▶ {}", id.trim_end_matches(".json")),
                Style::default().fg(palette.playing),
            ));
        }

        spans.push(sep);
        spans.push(Span::styled("? help", palette.style_muted()));

        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(palette.base()),
            area,
        );
    }
}
