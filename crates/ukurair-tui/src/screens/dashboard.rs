//! Public dashboard: one card per monitoring point.

use std::cell::Cell;
use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use throbber_widgets_tui::{Throbber, ThrobberState};

use ukurair_core::{DashboardEntry, DeviceId};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::{fmt, status_badge::status_badge};

const CARD_WIDTH: u16 = 30;
const CARD_HEIGHT: u16 = 5;

pub struct DashboardScreen {
    entries: Arc<Vec<DashboardEntry>>,
    selected: usize,
    loading: bool,
    throbber_state: ThrobberState,
    /// Cards per row at the last render; drives Up/Down.
    columns: Cell<usize>,
}

impl DashboardScreen {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            selected: 0,
            loading: true,
            throbber_state: ThrobberState::default(),
            columns: Cell::new(1),
        }
    }

    fn selected_id(&self) -> Option<&DeviceId> {
        self.entries.get(self.selected).map(|e| &e.id)
    }

    #[allow(clippy::cast_sign_loss, clippy::as_conversions)]
    fn move_selection(&mut self, delta: isize) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        #[allow(clippy::cast_possible_wrap)]
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    /// Keep the same device selected across a refresh.
    fn replace_entries(&mut self, entries: Arc<Vec<DashboardEntry>>) {
        let previous = self.selected_id().cloned();
        self.entries = entries;
        self.selected = previous
            .and_then(|id| self.entries.iter().position(|e| e.id == id))
            .unwrap_or_else(|| self.selected.min(self.entries.len().saturating_sub(1)));
    }

    fn render_card(&self, frame: &mut Frame, area: Rect, entry: &DashboardEntry, selected: bool) {
        let border = if selected {
            theme::border_focused()
        } else {
            Style::default().fg(theme::status_color(entry.status))
        };
        let block = Block::default()
            .title(format!(" {} ", entry.name))
            .title_style(if selected {
                theme::table_selected()
            } else {
                theme::heading()
            })
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = vec![
            Line::from(vec![
                Span::styled(fmt::fmt_level(entry.water_level_cm), theme::heading()),
                Span::raw("  "),
                status_badge(entry.status),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!("Update: {}", fmt::fmt_clock(entry.updated_at)),
                theme::subtitle(),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

impl Default for DashboardScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for DashboardScreen {
    #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let columns = self.columns.get().max(1) as isize;
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.move_selection(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-columns),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(columns),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => {
                self.selected = self.entries.len().saturating_sub(1);
            }
            KeyCode::Enter => return Ok(self.selected_id().cloned().map(Action::OpenDevice)),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::DashboardUpdated(entries) => self.replace_entries(Arc::clone(entries)),
            Action::ViewChanged(view) => self.loading = view.loading,
            Action::Tick => {
                if self.loading {
                    self.throbber_state.calc_next();
                }
            }
            _ => {}
        }
        Ok(None)
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    fn render(&self, frame: &mut Frame, area: Rect) {
        let [title_area, subtitle_area, _, body] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(Span::styled(" Monitoring Air Real-time", theme::heading())),
            title_area,
        );
        frame.render_widget(
            Paragraph::new(Span::styled(
                " Status ketinggian air di berbagai titik pantau wilayah. \
                 Klik kartu untuk detail grafik.",
                theme::subtitle(),
            ))
            .wrap(Wrap { trim: false }),
            subtitle_area,
        );

        if self.entries.is_empty() {
            if self.loading {
                let throbber = Throbber::default()
                    .label(" Menghubungkan...")
                    .style(Style::default().fg(theme::TEXT_DIM))
                    .throbber_style(Style::default().fg(theme::ACCENT));
                frame.render_stateful_widget(throbber, body, &mut self.throbber_state.clone());
            } else {
                frame.render_widget(
                    Paragraph::new(Span::styled(" Belum ada titik pantau.", theme::subtitle())),
                    body,
                );
            }
            return;
        }

        let columns = usize::from((body.width / CARD_WIDTH).max(1));
        self.columns.set(columns);
        let visible_rows = usize::from((body.height / CARD_HEIGHT).max(1));
        let selected_row = self.selected / columns;
        let first_row = selected_row.saturating_sub(visible_rows - 1);
        let card_width = body.width / columns as u16;

        for (idx, entry) in self.entries.iter().enumerate().skip(first_row * columns) {
            let row = idx / columns - first_row;
            if row >= visible_rows {
                break;
            }
            let col = idx % columns;
            let card = Rect::new(
                body.x + col as u16 * card_width,
                body.y + row as u16 * CARD_HEIGHT,
                card_width,
                CARD_HEIGHT,
            )
            .intersection(body);
            self.render_card(frame, card, entry, idx == self.selected);
        }
    }

}
