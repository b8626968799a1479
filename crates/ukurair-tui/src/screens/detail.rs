//! Device detail: current reading and the recent history chart.

use std::collections::HashMap;
use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use ukurair_core::{DashboardEntry, DeviceId, Histories};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::level_chart::render_level_chart;
use crate::widgets::{fmt, status_badge::status_badge};

pub struct DetailScreen {
    selected: Option<DeviceId>,
    entries: Arc<Vec<DashboardEntry>>,
    histories: Arc<Histories>,
}

impl DetailScreen {
    pub fn new() -> Self {
        Self {
            selected: None,
            entries: Arc::new(Vec::new()),
            histories: Arc::new(HashMap::new()),
        }
    }

    fn entry(&self) -> Option<&DashboardEntry> {
        let id = self.selected.as_ref()?;
        self.entries.iter().find(|e| e.id == *id)
    }
}

impl Default for DetailScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for DetailScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Left | KeyCode::Char('b') => {
                Ok(Some(Action::ShowDashboard))
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::ViewChanged(view) => self.selected.clone_from(&view.selected),
            Action::DashboardUpdated(entries) => self.entries = Arc::clone(entries),
            Action::HistoriesUpdated(histories) => self.histories = Arc::clone(histories),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [back_area, _, name_area, subtitle_area, level_area, _, chart_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .areas(area);

        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" ← Kembali ke Dashboard ", theme::key_hint()),
                Span::styled("(Esc)", theme::key_hint_key()),
            ])),
            back_area,
        );

        let Some(entry) = self.entry() else {
            frame.render_widget(
                Paragraph::new(Span::styled(" Perangkat tidak ditemukan.", theme::subtitle())),
                name_area,
            );
            return;
        };

        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {}", entry.name), theme::heading())),
            name_area,
        );
        frame.render_widget(
            Paragraph::new(Span::styled(
                " Data fluktuasi ketinggian air dalam 24 jam terakhir.",
                theme::subtitle(),
            )),
            subtitle_area,
        );
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(format!(" {}", fmt::fmt_level(entry.water_level_cm)), theme::title_style()),
                Span::raw("  "),
                status_badge(entry.status),
                Span::styled(
                    format!("  Update: {}", fmt::fmt_clock(entry.updated_at)),
                    theme::subtitle(),
                ),
            ])),
            level_area,
        );

        let block = Block::default()
            .title(" Ketinggian Air (cm) ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let history = self
            .histories
            .get(&entry.id)
            .map_or(&[][..], |h| h.as_slice());
        render_level_chart(frame, chart_area, block, history);
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::screens::test_util::render_to_string;
    use crossterm::event::KeyModifiers;
    use ukurair_core::{Measurement, Screen, ViewState, WaterStatus};

    fn opened(id: &str) -> DetailScreen {
        let mut screen = DetailScreen::new();
        let entries = vec![DashboardEntry {
            id: DeviceId::from("7"),
            name: "Bendung Katulampa".into(),
            water_level_cm: 64.0,
            status: WaterStatus::Watch,
            updated_at: None,
        }];
        screen.update(&Action::DashboardUpdated(Arc::new(entries))).unwrap();
        let view = ViewState {
            selected: Some(DeviceId::from(id)),
            ..ViewState::on(Screen::DeviceDetail)
        };
        screen.update(&Action::ViewChanged(view)).unwrap();
        screen
    }

    #[test]
    fn esc_goes_back() {
        let mut screen = opened("7");
        let action = screen
            .handle_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))
            .unwrap();
        assert!(matches!(action, Some(Action::ShowDashboard)));
    }

    #[test]
    fn renders_reading_without_history() {
        let screen = opened("7");
        let text = render_to_string(&screen, 80, 20);
        assert!(text.contains("Kembali ke Dashboard"));
        assert!(text.contains("Bendung Katulampa"));
        assert!(text.contains("64 cm"));
        assert!(text.contains("SIAGA"));
        assert!(text.contains("Belum ada data"));
    }

    #[test]
    fn renders_chart_with_history() {
        let mut screen = opened("7");
        let readings: Vec<Measurement> = [20.0, 35.0, 64.0]
            .into_iter()
            .map(|level| Measurement {
                device_id: DeviceId::from("7"),
                water_level_cm: level,
                status: WaterStatus::Safe,
                created_at: None,
            })
            .collect();
        let histories: Histories = HashMap::from([(DeviceId::from("7"), Arc::new(readings))]);
        screen
            .update(&Action::HistoriesUpdated(Arc::new(histories)))
            .unwrap();

        let text = render_to_string(&screen, 80, 24);
        assert!(text.contains("Ketinggian Air (cm)"));
        assert!(text.contains("100"));
        assert!(!text.contains("Belum ada data"));
    }

    #[test]
    fn unknown_device_is_reported() {
        let screen = opened("missing");
        let text = render_to_string(&screen, 80, 20);
        assert!(text.contains("Perangkat tidak ditemukan."));
    }
}
