//! Reusable widgets and formatting helpers.

pub mod fmt;
pub mod input;
pub mod level_chart;
pub mod status_badge;

use ratatui::layout::Rect;

/// A `width` x `height` rect centered in `area`, shrunk to fit.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    Rect::new(area.x + x, area.y + y, width, height)
}
