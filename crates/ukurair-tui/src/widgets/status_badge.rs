//! Status badge: `AMAN` / `SIAGA` / `DARURAT` on a coloured background.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use ukurair_core::WaterStatus;

use crate::theme;

/// Returns a styled `Span` with the status term on its colour.
pub fn status_badge(status: WaterStatus) -> Span<'static> {
    Span::styled(
        format!(" {} ", status.label()),
        Style::default()
            .fg(Color::Black)
            .bg(theme::status_color(status))
            .add_modifier(Modifier::BOLD),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_carries_term_and_colour() {
        let badge = status_badge(WaterStatus::Watch);
        assert_eq!(badge.content, " SIAGA ");
        assert_eq!(badge.style.bg, Some(theme::WATCH_AMBER));
    }
}
