//! Water-level chart: HalfBlock area fill under a Braille line, y axis
//! fixed at 0..100 cm.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph, Sparkline};

use ukurair_core::Measurement;

use crate::theme;
use crate::widgets::fmt;

/// Upper bound of the level axis, in cm.
pub const LEVEL_AXIS_MAX: f64 = 100.0;

/// `(index, level)` pairs in the order given (ascending time).
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn history_points(history: &[Measurement]) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(i, m)| (i as f64, m.water_level_cm))
        .collect()
}

/// Linearly interpolate between points so the bar-style fill has no gaps.
/// `target_density` is the approximate number of output points.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn densify(data: &[(f64, f64)], target_density: usize) -> Vec<(f64, f64)> {
    let (Some(&(x_min, _)), Some(&(x_max, last_y))) = (data.first(), data.last()) else {
        return Vec::new();
    };
    if data.len() < 2 {
        return data.to_vec();
    }
    let step = (x_max - x_min).max(1.0) / target_density.max(1) as f64;

    let mut result = Vec::with_capacity(target_density + 1);
    let mut segments = data.windows(2).peekable();
    let mut x = x_min;
    while x <= x_max + step * 0.5 {
        while segments.peek().is_some_and(|w| w[1].0 < x) {
            segments.next();
        }
        let y = match segments.peek() {
            Some(w) => {
                let ((x0, y0), (x1, y1)) = (w[0], w[1]);
                let dx = x1 - x0;
                if dx.abs() < f64::EPSILON {
                    y0
                } else {
                    y0 + (y1 - y0) * ((x - x0) / dx)
                }
            }
            None => last_y,
        };
        result.push((x, y));
        x += step;
    }
    result
}

/// Full-size chart for the device detail screen.
pub fn render_level_chart(frame: &mut Frame, area: Rect, block: Block, history: &[Measurement]) {
    if history.is_empty() {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            Paragraph::new("  Belum ada data").style(theme::subtitle()),
            inner,
        );
        return;
    }

    let points = history_points(history);
    let fill_density = (usize::from(area.width.saturating_sub(8)) * 3).max(120);
    let fill = densify(&points, fill_density);
    let x_max = points.last().map_or(1.0, |&(x, _)| x).max(1.0);

    let fill_set = Dataset::default()
        .marker(Marker::HalfBlock)
        .graph_type(GraphType::Bar)
        .style(Style::default().fg(theme::ACCENT_FILL))
        .data(&fill);

    let line_set = Dataset::default()
        .name("cm")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme::ACCENT))
        .data(&points);

    let axis_style = Style::default().fg(theme::TEXT_DIM);
    let x_labels = vec![
        Span::styled(
            fmt::fmt_axis_time(history.first().and_then(|m| m.created_at)),
            axis_style,
        ),
        Span::styled(
            fmt::fmt_axis_time(history.last().and_then(|m| m.created_at)),
            axis_style,
        ),
    ];
    let y_labels = vec![
        Span::styled("0", axis_style),
        Span::styled("50", axis_style),
        Span::styled("100", axis_style),
    ];

    // Fill first so the line renders on top
    let chart = Chart::new(vec![fill_set, line_set])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(x_labels)
                .style(axis_style),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, LEVEL_AXIS_MAX])
                .labels(y_labels)
                .style(axis_style),
        );

    frame.render_widget(chart, area);
}

/// Readings scaled for a [`Sparkline`], clamped to the level axis.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn sparkline_data(history: &[Measurement]) -> Vec<u64> {
    history
        .iter()
        .map(|m| m.water_level_cm.round().clamp(0.0, LEVEL_AXIS_MAX) as u64)
        .collect()
}

/// Compact per-device chart for the admin grid.
pub fn render_level_sparkline(frame: &mut Frame, area: Rect, history: &[Measurement]) {
    let data = sparkline_data(history);
    let sparkline = Sparkline::default()
        .data(&data)
        .max(100)
        .style(Style::default().fg(theme::ACCENT));
    frame.render_widget(sparkline, area);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ukurair_core::{DeviceId, WaterStatus};

    fn reading(level: f64) -> Measurement {
        Measurement {
            device_id: DeviceId::from("a"),
            water_level_cm: level,
            status: WaterStatus::Safe,
            created_at: None,
        }
    }

    #[test]
    fn densify_interpolates_between_points() {
        let dense = densify(&[(0.0, 0.0), (1.0, 10.0)], 10);
        assert!(dense.len() >= 10);
        let mid = dense.iter().find(|(x, _)| (*x - 0.5).abs() < 1e-9).unwrap();
        assert!((mid.1 - 5.0).abs() < 1e-9);
        assert!(dense.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn densify_edge_cases() {
        assert!(densify(&[], 10).is_empty());
        assert_eq!(densify(&[(0.0, 3.0)], 10), vec![(0.0, 3.0)]);
    }

    #[test]
    fn sparkline_clamps_to_axis() {
        let data = sparkline_data(&[reading(-4.0), reading(42.4), reading(180.0)]);
        assert_eq!(data, vec![0, 42, 100]);
    }
}
