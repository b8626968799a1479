//! Administrative panel: figures, device registry, ingestion key and a
//! live chart per monitoring point.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap,
};

use ukurair_core::{
    AdminStats, DashboardEntry, Device, DeviceId, Histories, MSG_MISSING_API_KEY,
    MSG_MISSING_NAME, MSG_MISSING_TOKEN, Screen, Settings, WaterStatus, generate_device_token,
};

use crate::action::{Action, ConfirmAction, NotificationLevel};
use crate::component::Component;
use crate::theme;
use crate::widgets::centered;
use crate::widgets::input::{TextField, render_input_field};
use crate::widgets::level_chart::render_level_sparkline;
use crate::widgets::{fmt, status_badge::status_badge};

const GRID_CELL_WIDTH: u16 = 28;
const GRID_CELL_HEIGHT: u16 = 6;

// ── Forms ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    AddDevice,
    EditApiKey,
}

/// An open modal form. Fields are `(label, input)` pairs.
struct Form {
    kind: FormKind,
    fields: Vec<(&'static str, TextField)>,
    focus: usize,
    error: Option<String>,
    submitting: bool,
}

impl Form {
    fn add_device() -> Self {
        Self {
            kind: FormKind::AddDevice,
            fields: vec![
                ("Nama Perangkat", TextField::default()),
                ("Token", TextField::new(generate_device_token(None))),
            ],
            focus: 0,
            error: None,
            submitting: false,
        }
    }

    fn edit_api_key(current: &str) -> Self {
        Self {
            kind: FormKind::EditApiKey,
            fields: vec![("API Key Global", TextField::new(current))],
            focus: 0,
            error: None,
            submitting: false,
        }
    }

    fn title(&self) -> &'static str {
        match self.kind {
            FormKind::AddDevice => " Tambah Perangkat ",
            FormKind::EditApiKey => " Ubah API Key ",
        }
    }

    fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map_or("", |(_, f)| f.value.trim())
    }

    fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    /// First missing field's message, if any.
    fn validate(&self) -> Option<&'static str> {
        match self.kind {
            FormKind::AddDevice if self.value(0).is_empty() => Some(MSG_MISSING_NAME),
            FormKind::AddDevice if self.value(1).is_empty() => Some(MSG_MISSING_TOKEN),
            FormKind::EditApiKey if self.value(0).is_empty() => Some(MSG_MISSING_API_KEY),
            _ => None,
        }
    }

    fn submit(&mut self) -> Option<Action> {
        if let Some(msg) = self.validate() {
            self.error = Some(msg.into());
            return None;
        }
        self.error = None;
        self.submitting = true;
        Some(match self.kind {
            FormKind::AddDevice => Action::CreateDevice {
                name: self.value(0).to_owned(),
                secret_key: self.value(1).to_owned(),
            },
            FormKind::EditApiKey => Action::UpdateSettings(self.value(0).to_owned()),
        })
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.submitting {
            return None;
        }
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => self.next_field(),
            KeyCode::Enter if self.focus + 1 < self.fields.len() => self.next_field(),
            KeyCode::Enter => return self.submit(),
            _ => {
                if let Some((_, field)) = self.fields.get_mut(self.focus) {
                    field.handle_key(key);
                }
            }
        }
        None
    }

    fn paste(&mut self, text: &str) {
        if self.submitting {
            return;
        }
        if let Some((_, field)) = self.fields.get_mut(self.focus) {
            field.paste(text);
        }
    }
}

// ── Screen ──────────────────────────────────────────────────────────

pub struct AdminScreen {
    devices: Arc<Vec<Device>>,
    entries: Arc<Vec<DashboardEntry>>,
    settings: Option<Arc<Settings>>,
    stats: Option<Arc<AdminStats>>,
    histories: Arc<Histories>,
    table_state: TableState,
    form: Option<Form>,
    /// Most recently reset token, shown until the selection changes.
    issued_token: Option<(DeviceId, String)>,
}

impl AdminScreen {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(Vec::new()),
            entries: Arc::new(Vec::new()),
            settings: None,
            stats: None,
            histories: Arc::new(HashMap::new()),
            table_state: TableState::default(),
            form: None,
            issued_token: None,
        }
    }

    fn selected_device(&self) -> Option<&Device> {
        self.devices.get(self.table_state.selected().unwrap_or(0))
    }

    fn move_selection(&mut self, down: bool) {
        let len = self.devices.len();
        if len == 0 {
            return;
        }
        let current = self.table_state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(len - 1)
        } else {
            current.saturating_sub(1)
        };
        if next != current {
            self.issued_token = None;
        }
        self.table_state.select(Some(next));
    }

    fn replace_devices(&mut self, devices: Arc<Vec<Device>>) {
        let previous = self.selected_device().map(|d| d.id.clone());
        self.devices = devices;
        let idx = previous
            .and_then(|id| self.devices.iter().position(|d| d.id == id))
            .unwrap_or_else(|| {
                self.table_state
                    .selected()
                    .unwrap_or(0)
                    .min(self.devices.len().saturating_sub(1))
            });
        self.table_state.select(Some(idx));
    }

    fn confirm_for_selected(&self, make: fn(DeviceId, String) -> ConfirmAction) -> Option<Action> {
        self.selected_device()
            .map(|d| Action::ShowConfirm(make(d.id.clone(), d.name.clone())))
    }

    /// Latest level for a device: newest history reading, else the
    /// dashboard snapshot.
    fn current_entry(&self, device: &Device) -> Option<(f64, WaterStatus)> {
        self.histories
            .get(&device.id)
            .and_then(|h| h.last())
            .map(|m| (m.water_level_cm, m.status))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.id == device.id)
                    .map(|e| (e.water_level_cm, e.status))
            })
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render_metrics(&self, frame: &mut Frame, area: Rect) {
        let value = |f: fn(&AdminStats) -> u64| {
            self.stats
                .as_deref()
                .map_or_else(|| "-".to_owned(), |s| f(s).to_string())
        };
        let cards = [
            ("Unit Aktif", value(|s| s.total_devices), theme::ACCENT),
            ("Total Transmisi", value(|s| s.total_measurements), theme::SAFE_GREEN),
            ("Status Siaga/Darurat", value(AdminStats::alert_count), theme::WATCH_AMBER),
        ];
        let areas = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);
        for ((label, value, color), card_area) in cards.into_iter().zip(areas.iter()) {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(theme::border_default());
            let inner = block.inner(*card_area);
            frame.render_widget(block, *card_area);
            let lines = vec![
                Line::from(Span::styled(format!(" {label}"), theme::subtitle())),
                Line::from(Span::styled(
                    format!(" {value}"),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
            ];
            frame.render_widget(Paragraph::new(lines), inner);
        }
    }

    fn render_devices(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(format!(" Perangkat ({}) ", self.devices.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(if self.form.is_none() {
                theme::border_focused()
            } else {
                theme::border_default()
            });

        let header = Row::new(vec![
            Cell::from("Nama"),
            Cell::from("Token"),
            Cell::from("Dibuat"),
        ])
        .style(theme::table_header());

        let rows: Vec<Row> = self
            .devices
            .iter()
            .map(|d| {
                let created = d.created_at.map_or_else(
                    || "-".to_owned(),
                    |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
                );
                Row::new(vec![
                    Cell::from(d.name.clone()),
                    Cell::from(d.secret_key.clone()),
                    Cell::from(created),
                ])
                .style(theme::table_row())
            })
            .collect();

        let widths = [
            Constraint::Fill(1),
            Constraint::Length(12),
            Constraint::Length(17),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(theme::table_selected())
            .highlight_symbol("▸ ");
        frame.render_stateful_widget(table, area, &mut self.table_state.clone());
    }

    fn render_settings(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" API Key Global ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let key = self
            .settings
            .as_deref()
            .map_or("-", |s| s.global_api_key.as_str());
        let mut lines = vec![
            Line::from(Span::styled(format!(" {key}"), theme::heading())),
            Line::from(""),
        ];
        if let Some((id, token)) = &self.issued_token {
            let name = self
                .devices
                .iter()
                .find(|d| d.id == *id)
                .map_or(id.as_str(), |d| d.name.as_str());
            lines.push(Line::from(Span::styled(
                format!(" Token baru {name}:"),
                theme::subtitle(),
            )));
            lines.push(Line::from(Span::styled(
                format!(" {token}"),
                Style::default()
                    .fg(theme::SAFE_GREEN)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    fn render_grid(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Monitoring Real-time Semua Titik ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.devices.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(" Belum ada perangkat.", theme::subtitle())),
                inner,
            );
            return;
        }

        let columns = usize::from((inner.width / GRID_CELL_WIDTH).max(1));
        let rows = usize::from(inner.height / GRID_CELL_HEIGHT);
        let cell_width = inner.width / columns as u16;

        for (idx, device) in self.devices.iter().take(columns * rows).enumerate() {
            let cell = Rect::new(
                inner.x + (idx % columns) as u16 * cell_width,
                inner.y + (idx / columns) as u16 * GRID_CELL_HEIGHT,
                cell_width,
                GRID_CELL_HEIGHT,
            )
            .intersection(inner);

            let reading = self.current_entry(device);
            let cell_block = Block::default()
                .title(format!(" {} ", device.name))
                .borders(Borders::ALL)
                .border_type(BorderType::Plain)
                .border_style(reading.map_or_else(theme::border_default, |(_, status)| {
                    Style::default().fg(theme::status_color(status))
                }));
            let cell_inner = cell_block.inner(cell);
            frame.render_widget(cell_block, cell);

            let [level_area, spark_area] =
                Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(cell_inner);
            let level_line = match reading {
                Some((level, status)) => Line::from(vec![
                    Span::styled(fmt::fmt_level(level), theme::heading()),
                    Span::raw(" "),
                    status_badge(status),
                ]),
                None => Line::from(Span::styled("-", theme::subtitle())),
            };
            frame.render_widget(Paragraph::new(level_line), level_area);

            let history = self
                .histories
                .get(&device.id)
                .map_or(&[][..], |h| h.as_slice());
            render_level_sparkline(frame, spark_area, history);
        }

        let hidden = self.devices.len().saturating_sub(columns * rows);
        if hidden > 0 && inner.height > 0 {
            let note = Rect::new(inner.x, inner.bottom() - 1, inner.width, 1);
            frame.render_widget(
                Paragraph::new(Span::styled(format!("+{hidden} lainnya "), theme::subtitle()))
                    .right_aligned(),
                note,
            );
        }
    }

    fn render_form(frame: &mut Frame, area: Rect, form: &Form) {
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        let height = form.fields.len() as u16 * 4 + 6;
        let dialog = centered(area, 50, height);
        frame.render_widget(Clear, dialog);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            dialog,
        );
        let block = Block::default()
            .title(form.title())
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(dialog);
        frame.render_widget(block, dialog);

        let mut constraints = vec![Constraint::Length(1)];
        constraints.extend(form.fields.iter().map(|_| Constraint::Length(4)));
        constraints.extend([Constraint::Length(2), Constraint::Length(1)]);
        let rows = Layout::vertical(constraints)
            .horizontal_margin(2)
            .split(inner);

        for (idx, (label, field)) in form.fields.iter().enumerate() {
            if let Some(row) = rows.get(idx + 1) {
                render_input_field(frame, *row, label, field, idx == form.focus);
            }
        }

        let n = form.fields.len();
        if let (Some(err), Some(row)) = (&form.error, rows.get(n + 1)) {
            frame.render_widget(
                Paragraph::new(Span::styled(err.as_str(), theme::error_text()))
                    .wrap(Wrap { trim: true }),
                *row,
            );
        }
        if let Some(row) = rows.get(n + 2) {
            let hints = if form.submitting {
                Line::from(Span::styled("Menyimpan...", theme::key_hint()))
            } else {
                Line::from(vec![
                    Span::styled("Enter ", theme::key_hint_key()),
                    Span::styled("simpan  ", theme::key_hint()),
                    Span::styled("Tab ", theme::key_hint_key()),
                    Span::styled("pindah  ", theme::key_hint()),
                    Span::styled("Esc ", theme::key_hint_key()),
                    Span::styled("batal", theme::key_hint()),
                ])
            };
            frame.render_widget(Paragraph::new(hints), *row);
        }
    }
}

impl Default for AdminScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AdminScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if let Some(form) = &mut self.form {
            if key.code == KeyCode::Esc && !form.submitting {
                self.form = None;
                return Ok(None);
            }
            return Ok(form.handle_key(key));
        }

        let action = match key.code {
            KeyCode::Up => {
                self.move_selection(false);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection(true);
                None
            }
            KeyCode::Char('n') => {
                self.form = Some(Form::add_device());
                None
            }
            KeyCode::Char('k') => {
                let current = self
                    .settings
                    .as_deref()
                    .map_or("", |s| s.global_api_key.as_str());
                self.form = Some(Form::edit_api_key(current));
                None
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                self.confirm_for_selected(|id, name| ConfirmAction::DeleteDevice { id, name })
            }
            KeyCode::Char('r') => {
                self.confirm_for_selected(|id, name| ConfirmAction::ResetToken { id, name })
            }
            KeyCode::Esc => Some(Action::ShowDashboard),
            _ => None,
        };
        Ok(action)
    }

    fn handle_paste(&mut self, text: &str) {
        if let Some(form) = &mut self.form {
            form.paste(text);
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::DevicesUpdated(devices) => self.replace_devices(Arc::clone(devices)),
            Action::DashboardUpdated(entries) => self.entries = Arc::clone(entries),
            Action::SettingsUpdated(settings) => self.settings.clone_from(settings),
            Action::StatsUpdated(stats) => self.stats.clone_from(stats),
            Action::HistoriesUpdated(histories) => self.histories = Arc::clone(histories),
            Action::FormAccepted => self.form = None,
            Action::TokenIssued { id, token } => {
                self.issued_token = Some((id.clone(), token.clone()));
            }
            Action::Notify(n) if n.level == NotificationLevel::Error => {
                if let Some(form) = self.form.as_mut().filter(|f| f.submitting) {
                    form.submitting = false;
                    form.error = Some(n.message.clone());
                }
            }
            Action::ViewChanged(view) if view.screen != Screen::Admin => {
                self.form = None;
                self.issued_token = None;
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [title_area, metrics_area, middle_area, grid_area, hint_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(Span::styled(" Administrative Panel", theme::heading())),
            title_area,
        );
        self.render_metrics(frame, metrics_area);

        let [devices_area, settings_area] =
            Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
                .areas(middle_area);
        self.render_devices(frame, devices_area);
        self.render_settings(frame, settings_area);
        self.render_grid(frame, grid_area);

        let hints = Line::from(vec![
            Span::styled(" n ", theme::key_hint_key()),
            Span::styled("tambah  ", theme::key_hint()),
            Span::styled("x ", theme::key_hint_key()),
            Span::styled("hapus  ", theme::key_hint()),
            Span::styled("r ", theme::key_hint_key()),
            Span::styled("token baru  ", theme::key_hint()),
            Span::styled("k ", theme::key_hint_key()),
            Span::styled("API key  ", theme::key_hint()),
            Span::styled("↑/j ", theme::key_hint_key()),
            Span::styled("pilih", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), hint_area);

        if let Some(form) = &self.form {
            Self::render_form(frame, area, form);
        }
    }

    fn captures_input(&self) -> bool {
        self.form.is_some()
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::Notification;
    use crate::screens::test_util::render_to_string;
    use crossterm::event::KeyModifiers;
    use ukurair_core::StatusCount;

    fn device(id: &str, name: &str) -> Device {
        Device {
            id: DeviceId::from(id),
            name: name.into(),
            secret_key: format!("TOKEN{id}AB"),
            created_at: None,
        }
    }

    fn loaded() -> AdminScreen {
        let mut screen = AdminScreen::new();
        let devices = vec![device("1", "Pintu Air A"), device("2", "Pintu Air B")];
        screen.update(&Action::DevicesUpdated(Arc::new(devices))).unwrap();
        screen
            .update(&Action::SettingsUpdated(Some(Arc::new(Settings {
                global_api_key: "GLOBAL-KEY".into(),
            }))))
            .unwrap();
        screen
            .update(&Action::StatsUpdated(Some(Arc::new(AdminStats {
                total_devices: 2,
                total_measurements: 345,
                status_counts: vec![
                    StatusCount { status: WaterStatus::Safe, count: 300 },
                    StatusCount { status: WaterStatus::Watch, count: 40 },
                    StatusCount { status: WaterStatus::Emergency, count: 5 },
                ],
            }))))
            .unwrap();
        screen
    }

    fn press(screen: &mut AdminScreen, code: KeyCode) -> Option<Action> {
        screen
            .handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap()
    }

    fn type_str(screen: &mut AdminScreen, text: &str) {
        for c in text.chars() {
            press(screen, KeyCode::Char(c));
        }
    }

    #[test]
    fn add_device_form_prefills_token_and_validates_name() {
        let mut screen = loaded();
        press(&mut screen, KeyCode::Char('n'));
        assert!(screen.captures_input());
        let token = screen.form.as_ref().unwrap().value(1).to_owned();
        assert_eq!(token.len(), 8);

        // Enter walks to the token field, then submits.
        assert!(press(&mut screen, KeyCode::Enter).is_none());
        assert!(press(&mut screen, KeyCode::Enter).is_none());
        assert_eq!(
            screen.form.as_ref().unwrap().error.as_deref(),
            Some(MSG_MISSING_NAME)
        );

        press(&mut screen, KeyCode::Tab);
        type_str(&mut screen, "Pintu Air C");
        press(&mut screen, KeyCode::Tab);
        let action = press(&mut screen, KeyCode::Enter);
        assert!(matches!(
            action,
            Some(Action::CreateDevice { name, secret_key })
                if name == "Pintu Air C" && secret_key == token
        ));

        screen.update(&Action::FormAccepted).unwrap();
        assert!(screen.form.is_none());
        assert!(!screen.captures_input());
    }

    #[test]
    fn failed_submit_reopens_form_with_error() {
        let mut screen = loaded();
        press(&mut screen, KeyCode::Char('k'));
        assert_eq!(screen.form.as_ref().unwrap().value(0), "GLOBAL-KEY");
        let action = press(&mut screen, KeyCode::Enter);
        assert!(matches!(action, Some(Action::UpdateSettings(k)) if k == "GLOBAL-KEY"));

        screen
            .update(&Action::Notify(Notification::error("Koneksi gagal.")))
            .unwrap();
        let form = screen.form.as_ref().unwrap();
        assert!(!form.submitting);
        assert_eq!(form.error.as_deref(), Some("Koneksi gagal."));
    }

    #[test]
    fn empty_api_key_is_rejected_locally() {
        let mut screen = loaded();
        press(&mut screen, KeyCode::Char('k'));
        screen
            .handle_key_event(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(press(&mut screen, KeyCode::Enter).is_none());
        assert_eq!(
            screen.form.as_ref().unwrap().error.as_deref(),
            Some(MSG_MISSING_API_KEY)
        );
    }

    #[test]
    fn delete_and_reset_ask_for_confirmation() {
        let mut screen = loaded();
        press(&mut screen, KeyCode::Down);
        let action = press(&mut screen, KeyCode::Char('x'));
        assert!(matches!(
            action,
            Some(Action::ShowConfirm(ConfirmAction::DeleteDevice { id, .. })) if id.as_str() == "2"
        ));
        let action = press(&mut screen, KeyCode::Char('r'));
        assert!(matches!(
            action,
            Some(Action::ShowConfirm(ConfirmAction::ResetToken { name, .. })) if name == "Pintu Air B"
        ));
    }

    #[test]
    fn renders_figures_and_registry() {
        let mut screen = loaded();
        screen
            .update(&Action::TokenIssued {
                id: DeviceId::from("1"),
                token: "NEWTOKEN".into(),
            })
            .unwrap();
        let text = render_to_string(&screen, 120, 40);
        assert!(text.contains("Administrative Panel"));
        assert!(text.contains("Unit Aktif"));
        assert!(text.contains("345"));
        assert!(text.contains("Status Siaga/Darurat"));
        assert!(text.contains("45"));
        assert!(text.contains("TOKEN1AB"));
        assert!(text.contains("GLOBAL-KEY"));
        assert!(text.contains("NEWTOKEN"));
        assert!(text.contains("Monitoring Real-time Semua Titik"));
    }
}
