//! Palette and semantic styling for the TUI.

use ratatui::style::{Color, Modifier, Style};

use ukurair_core::WaterStatus;

// ── Core Palette ──────────────────────────────────────────────────────

pub const ACCENT: Color = Color::Rgb(56, 189, 248); // #38bdf8
pub const ACCENT_FILL: Color = Color::Rgb(14, 45, 66); // #0e2d42
pub const SAFE_GREEN: Color = Color::Rgb(34, 197, 94); // #22c55e
pub const WATCH_AMBER: Color = Color::Rgb(245, 158, 11); // #f59e0b
pub const DANGER_RED: Color = Color::Rgb(239, 68, 68); // #ef4444

// ── Extended Palette ──────────────────────────────────────────────────

pub const TEXT: Color = Color::Rgb(226, 232, 240); // #e2e8f0
pub const TEXT_DIM: Color = Color::Rgb(148, 163, 184); // #94a3b8
pub const BORDER_GRAY: Color = Color::Rgb(51, 65, 85); // #334155
pub const BG_HIGHLIGHT: Color = Color::Rgb(30, 41, 59); // #1e293b
pub const BG_DARK: Color = Color::Rgb(15, 23, 42); // #0f172a

/// Badge colour for a reading's status.
pub fn status_color(status: WaterStatus) -> Color {
    match status {
        WaterStatus::Safe => SAFE_GREEN,
        WaterStatus::Watch => WATCH_AMBER,
        WaterStatus::Emergency => DANGER_RED,
    }
}

// ── Semantic Styles ───────────────────────────────────────────────────

/// Title text for blocks/panels.
pub fn title_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

/// Big page heading.
pub fn heading() -> Style {
    Style::default().fg(TEXT).add_modifier(Modifier::BOLD)
}

pub fn subtitle() -> Style {
    Style::default().fg(TEXT_DIM)
}

pub fn border_focused() -> Style {
    Style::default().fg(ACCENT)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Table header row.
pub fn table_header() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(TEXT)
}

/// Selected / highlighted row or card.
pub fn table_selected() -> Style {
    Style::default()
        .fg(ACCENT)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Active entry in the header navigation.
pub fn nav_active() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn nav_inactive() -> Style {
    Style::default().fg(TEXT)
}

pub fn error_text() -> Style {
    Style::default().fg(DANGER_RED)
}

/// Key hint text (e.g., "q quit").
pub fn key_hint() -> Style {
    Style::default().fg(TEXT_DIM)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}
