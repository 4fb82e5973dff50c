//! Color palettes and style helpers.
//!
//! Two palettes (dark and light) share the same slots; components take a
//! `&Palette` from `AppState` instead of reaching for constants directly.

use ratatui::style::{Color, Modifier, Style};

use callwatch_core::classify::Severity;

// ── Severity colors (shared by both palettes) ─────────────────────────────────

pub const C_SEVERITY_RED: Color = Color::Rgb(255, 85, 85);
pub const C_SEVERITY_YELLOW: Color = Color::Rgb(240, 200, 60);
pub const C_SEVERITY_ORANGE: Color = Color::Rgb(255, 150, 50);

pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_SUCCESS: Color = Color::Rgb(80, 200, 120);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_TOAST_ERROR: Color = Color::Rgb(255, 95, 95);

pub const C_BADGE_LIVE: Color = Color::Rgb(80, 200, 120);
pub const C_BADGE_PENDING: Color = Color::Rgb(255, 184, 80);
pub const C_BADGE_PAUSED: Color = Color::Rgb(115, 115, 138);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub bg: Color,
    pub primary: Color,
    pub secondary: Color,
    pub muted: Color,
    pub separator: Color,
    pub selection_bg: Color,
    pub border: Color,
    pub border_focused: Color,
    pub accent: Color,
    pub playing: Color,
}

impl Palette {
    pub const DARK: Palette = Palette {
        bg: Color::Rgb(18, 18, 18),
        primary: Color::Rgb(210, 210, 225),
        secondary: Color::Rgb(115, 115, 138),
        muted: Color::Rgb(72, 72, 88),
        separator: Color::Rgb(40, 40, 52),
        selection_bg: Color::Rgb(28, 28, 40),
        border: Color::Rgb(40, 40, 52),
        border_focused: Color::Rgb(120, 100, 200),
        accent: Color::Rgb(255, 95, 95),
        playing: Color::Rgb(80, 200, 120),
    };

    pub const LIGHT: Palette = Palette {
        bg: Color::Rgb(246, 246, 240),
        primary: Color::Rgb(30, 30, 40),
        secondary: Color::Rgb(90, 90, 110),
        muted: Color::Rgb(150, 150, 165),
        separator: Color::Rgb(210, 210, 220),
        selection_bg: Color::Rgb(222, 222, 236),
        border: Color::Rgb(200, 200, 212),
        border_focused: Color::Rgb(100, 80, 180),
        accent: Color::Rgb(200, 40, 40),
        playing: Color::Rgb(30, 140, 70),
    };

    pub fn for_mode(dark: bool) -> &'static Palette {
        if dark {
            &Palette::DARK
        } else {
            &Palette::LIGHT
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.primary).bg(self.bg)
    }

    pub fn style_secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn style_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn style_selected(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn style_border(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }
}

/// Foreground for a severity tier. `None` renders in the palette's text color.
pub fn severity_color(severity: Severity, palette: &Palette) -> Color {
    match severity {
        Severity::Red => C_SEVERITY_RED,
        Severity::Yellow => C_SEVERITY_YELLOW,
        Severity::Orange => C_SEVERITY_ORANGE,
        Severity::None => palette.primary,
    }
}

/// Style for a highlighted keyword inside a transcript.
pub fn style_keyword(severity: Severity, palette: &Palette) -> Style {
    Style::default()
        .fg(severity_color(severity, palette))
        .add_modifier(Modifier::BOLD)
}

/// Left-edge marker shown on each row.
pub fn severity_marker(severity: Severity) -> &'static str {
    if severity == Severity::None {
        " "
    } else {
        "▌"
    }
}
