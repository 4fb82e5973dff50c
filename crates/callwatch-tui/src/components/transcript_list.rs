//! TranscriptList component: the live call list plus an optional detail pane.
//!
//! Each row: severity marker, Pacific time, then the transcript on one line
//! with keyword highlights. The detail pane shows the selected transcript
//! wrapped in full.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use callwatch_core::classify::{markup_segments, strip_markup, Severity};
use callwatch_core::poll::{CycleOutcome, Phase};
use callwatch_core::render::TranscriptRecord;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    theme::{severity_color, severity_marker, style_keyword, Palette, C_BADGE_LIVE, C_BADGE_PAUSED},
    widgets::{
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
    },
};

const DETAIL_HEIGHT: u16 = 8;

pub struct TranscriptList {
    list: ScrollableList<TranscriptRecord>,
    list_state: ListState,
    show_detail: bool,
}

impl TranscriptList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(),
            list_state: ListState::default(),
            show_detail: true,
        }
    }

    /// Replace every record. The cursor stays on the same call if it is
    /// still listed; a cursor on the first row follows the newest call.
    pub fn set_records(&mut self, records: Vec<TranscriptRecord>) {
        let keep = (self.list.selected > 0)
            .then(|| self.list.selected_item().map(|r| r.id.clone()))
            .flatten();
        self.list.set_items(records);
        match keep {
            Some(id) => {
                if !self.list.select_where(|r| r.id == id) {
                    self.list.select_first();
                }
            }
            None => self.list.select_first(),
        }
    }

    pub fn selected(&self) -> Option<&TranscriptRecord> {
        self.list.selected_item()
    }

    fn badge(state: &AppState) -> Badge<'static> {
        if state.poll.paused || state.poll.hidden {
            Badge {
                text: "PAUSED",
                color: C_BADGE_PAUSED,
            }
        } else {
            Badge {
                text: "LIVE",
                color: C_BADGE_LIVE,
            }
        }
    }

    fn empty_message(state: &AppState) -> &'static str {
        let first_poll = state.poll.last_outcome.is_none() || state.poll.phase == Phase::Polling;
        if state.poll.renders == 0 && first_poll {
            "  fetching transcripts…"
        } else if state.poll.last_outcome == Some(CycleOutcome::NothingFetched) {
            "  no transcripts in the last two days"
        } else {
            "  no transcripts"
        }
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let palette = state.palette();
        let block = pane_chrome("detail", false, None, palette);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(record) = self.list.selected_item() else {
            return;
        };

        let mut header = vec![
            Span::styled(record.time.clone(), palette.style_secondary()),
            Span::raw("  "),
        ];
        if record.severity != Severity::None {
            header.push(Span::styled(
                record.severity.label().to_uppercase(),
                style_keyword(record.severity, palette),
            ));
            header.push(Span::raw("  "));
        }
        header.push(Span::styled(record.audio_link.clone(), palette.style_muted()));

        let lines = vec![
            Line::from(header),
            Line::from(""),
            Line::from(transcript_spans(&record.transcript_markup, palette)),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
    }
}

impl Default for TranscriptList {
    fn default() -> Self {
        Self::new()
    }
}

/// Transcript markup as styled spans. Line breaks become spaces.
pub fn transcript_spans(markup: &str, palette: &Palette) -> Vec<Span<'static>> {
    markup_segments(markup)
        .into_iter()
        .map(|seg| {
            let text = seg.text.replace(['\r', '\n'], " ");
            match seg.highlight {
                Some(severity) => Span::styled(text, style_keyword(severity, palette)),
                None => Span::styled(text, Style::default().fg(palette.primary)),
            }
        })
        .collect()
}

/// One list row for `record`.
pub fn row_line(record: &TranscriptRecord, playing: bool, palette: &Palette) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            severity_marker(record.severity),
            Style::default().fg(severity_color(record.severity, palette)),
        ),
        Span::styled(format!("{} ", record.time), palette.style_secondary()),
        Span::styled(
            if playing { "▶ " } else { "  " },
            Style::default()
                .fg(palette.playing)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    spans.extend(transcript_spans(&record.transcript_markup, palette));
    Line::from(spans)
}

impl Component for TranscriptList {
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![];
        }
        let action = match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::SelectUp(1),
            KeyCode::Down | KeyCode::Char('j') => Action::SelectDown(1),
            KeyCode::PageUp => Action::SelectUp(10),
            KeyCode::PageDown => Action::SelectDown(10),
            KeyCode::Home | KeyCode::Char('g') => Action::SelectFirst,
            KeyCode::End | KeyCode::Char('G') => Action::SelectLast,
            KeyCode::Char('v') => Action::ToggleDetail,
            KeyCode::Char('s') => Action::StopAudio,
            KeyCode::Enter => match self.selected() {
                Some(r) => Action::Listen {
                    id: r.id.clone(),
                    url: r.audio_link.clone(),
                },
                None => Action::Noop,
            },
            KeyCode::Char('c') => match self.selected() {
                Some(r) => Action::CopyToClipboard(strip_markup(&r.transcript_markup)),
                None => Action::Noop,
            },
            _ => return vec![],
        };
        vec![action]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::SelectUp(n) => self.list.select_up(*n),
            Action::SelectDown(n) => self.list.select_down(*n),
            Action::SelectFirst => self.list.select_first(),
            Action::SelectLast => self.list.select_last(),
            Action::ToggleDetail => self.show_detail = !self.show_detail,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let palette = state.palette();

        let (list_area, detail_area) = if self.show_detail && area.height > DETAIL_HEIGHT + 4 {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4), Constraint::Length(DETAIL_HEIGHT)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        } else {
            (area, None)
        };

        let title = format!("{} · {} calls", state.channel, self.list.len());
        let block = pane_chrome(&title, focused, Some(Self::badge(state)), palette);
        let inner = block.inner(list_area);
        frame.render_widget(block, list_area);

        if self.list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(Self::empty_message(state), palette.style_muted())),
                inner,
            );
            return;
        }

        let content_h = inner.height as usize;
        self.list.ensure_visible(content_h);
        let sel_in_view = self.list.selected_in_view(content_h);

        let items: Vec<ListItem> = self
            .list
            .visible_items(content_h)
            .into_iter()
            .enumerate()
            .map(|(view_row, (_, record))| {
                let playing = state.now_playing.as_deref() == Some(record.id.as_str());
                let item = ListItem::new(row_line(record, playing, palette));
                if view_row == sel_in_view {
                    item.style(palette.style_selected())
                } else {
                    item
                }
            })
            .collect();

        let list = List::new(items)
            .highlight_style(Style::default())
            .highlight_symbol("");
        self.list_state.select(Some(sel_in_view));
        frame.render_stateful_widget(list, inner, &mut self.list_state);

        if let Some(detail) = detail_area {
            self.draw_detail(frame, detail, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::C_SEVERITY_RED;

    fn record(id: &str, markup: &str, severity: Severity) -> TranscriptRecord {
        TranscriptRecord {
            id: id.to_string(),
            time: "03/15/2024, 07:30:22".to_string(),
            transcript_markup: markup.to_string(),
            audio_link: format!("https://a.example/{id}.mp3"),
            severity,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn row_highlights_keyword_spans() {
        let r = record(
            "a",
            r#"<span class="keyword-red">Structure fire</span> on Oak &amp; 5th"#,
            Severity::Red,
        );
        let line = row_line(&r, false, &Palette::DARK);
        let keyword = line
            .spans
            .iter()
            .find(|s| s.content == "Structure fire")
            .unwrap();
        assert_eq!(keyword.style.fg, Some(C_SEVERITY_RED));
        assert!(line.spans.iter().any(|s| s.content == " on Oak & 5th"));
    }

    #[test]
    fn cursor_follows_selected_call_across_rerenders() {
        let mut list = TranscriptList::new();
        list.set_records(vec![
            record("c", "c", Severity::None),
            record("b", "b", Severity::None),
            record("a", "a", Severity::None),
        ]);
        list.on_action(&Action::SelectDown(1), &AppState::default());
        assert_eq!(list.selected().unwrap().id, "b");

        list.set_records(vec![
            record("d", "d", Severity::None),
            record("c", "c", Severity::None),
            record("b", "b", Severity::None),
        ]);
        assert_eq!(list.selected().unwrap().id, "b");
    }

    #[test]
    fn cursor_on_top_row_follows_newest() {
        let mut list = TranscriptList::new();
        list.set_records(vec![record("a", "a", Severity::None)]);
        list.set_records(vec![
            record("b", "b", Severity::None),
            record("a", "a", Severity::None),
        ]);
        assert_eq!(list.selected().unwrap().id, "b");
    }

    #[test]
    fn copy_uses_plain_text() {
        let mut list = TranscriptList::new();
        list.set_records(vec![record(
            "a",
            r#"Engine 4 &lt;<span class="keyword-yellow">medical aid</span>&gt;"#,
            Severity::Yellow,
        )]);
        let actions = list.handle_key(key(KeyCode::Char('c')), &AppState::default());
        assert_eq!(
            actions,
            vec![Action::CopyToClipboard("Engine 4 <medical aid>".into())]
        );
    }

    #[test]
    fn enter_listens_to_selected_audio() {
        let mut list = TranscriptList::new();
        list.set_records(vec![record("call_1", "x", Severity::None)]);
        let actions = list.handle_key(key(KeyCode::Enter), &AppState::default());
        assert_eq!(
            actions,
            vec![Action::Listen {
                id: "call_1".into(),
                url: "https://a.example/call_1.mp3".into(),
            }]
        );
    }

    #[test]
    fn empty_list_keys_are_noops() {
        let mut list = TranscriptList::new();
        let actions = list.handle_key(key(KeyCode::Enter), &AppState::default());
        assert_eq!(actions, vec![Action::Noop]);
    }
}
