//! Application core: event loop, screen management, action dispatch.
//!
//! The controller owns navigation. Keys become intents, intents are
//! spawned against the controller, and the active screen follows the
//! `ViewChanged` actions the data bridge forwards.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ukurair_core::{BackendKind, Controller, CoreError, Screen};

use crate::action::{Action, ConfirmAction, Notification, NotificationLevel};
use crate::component::Component;
use crate::event::{Cadence, Event, EventReader};
use crate::screens::create_screens;
use crate::screens::login::LoginPrefill;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::{centered, fmt};

const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Top-level application state and event loop.
pub struct App {
    /// Screen the controller currently shows.
    active_screen: Screen,
    screens: HashMap<Screen, Box<dyn Component>>,
    running: bool,
    help_visible: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    controller: Controller,
    backend: BackendKind,
    /// Signed-in user's display name.
    user: Option<String>,
    last_update: Option<DateTime<Utc>>,
    /// Cancellation token for the data bridge task.
    data_cancel: CancellationToken,
    /// Pending confirmation dialog (blocks other input while active).
    pending_confirm: Option<ConfirmAction>,
    /// Active notification toast with display timestamp.
    notification: Option<(Notification, Instant)>,
}

impl App {
    pub fn new(controller: Controller, prefill: LoginPrefill) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let screens: HashMap<Screen, Box<dyn Component>> =
            create_screens(prefill).into_iter().collect();

        Self {
            active_screen: Screen::Dashboard,
            screens,
            running: true,
            help_visible: false,
            action_tx,
            action_rx,
            backend: controller.backend(),
            controller,
            user: None,
            last_update: None,
            data_cancel: CancellationToken::new(),
            pending_confirm: None,
            notification: None,
        }
    }

    /// Run the main event loop until the user quits.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        let controller = self.controller.clone();
        let cancel = self.data_cancel.clone();
        let tx = self.action_tx.clone();
        let bridge = tokio::spawn(async move {
            crate::data_bridge::spawn_data_bridge(controller, tx, cancel).await;
        });

        let mut events = EventReader::spawn(Cadence::default());

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Paste(text) => self.handle_paste(&text),
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        // The bridge shuts the controller down on cancel.
        self.data_cancel.cancel();
        events.stop();
        if let Err(e) = bridge.await {
            warn!(error = %e, "data bridge task failed");
        }
        tui.exit();
        info!("TUI event loop ended");
        Ok(())
    }

    /// Pastes only go to a screen that is taking text; dialogs and the help
    /// overlay swallow them.
    fn handle_paste(&mut self, text: &str) {
        if self.pending_confirm.is_some() || self.help_visible {
            return;
        }
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            if screen.captures_input() {
                screen.handle_paste(text);
            }
        }
    }

    fn active(&self) -> Option<&dyn Component> {
        self.screens.get(&self.active_screen).map(Box::as_ref)
    }

    /// Map a key event to an action. Global keys are handled here unless
    /// the active screen is taking text input.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        // Confirmation dialog captures all input
        if self.pending_confirm.is_some() {
            return match key.code {
                KeyCode::Char('y' | 'Y') => Ok(Some(Action::ConfirmYes)),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => Ok(Some(Action::ConfirmNo)),
                _ => Ok(None),
            };
        }

        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        let captures = self.active().is_some_and(|s| s.captures_input());
        if !captures {
            match (key.modifiers, key.code) {
                (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),
                (KeyModifiers::NONE, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),
                (KeyModifiers::NONE, KeyCode::Char('d')) => return Ok(Some(Action::ShowDashboard)),
                (KeyModifiers::NONE, KeyCode::Char('a')) => return Ok(Some(Action::RequestAdmin)),
                (KeyModifiers::SHIFT | KeyModifiers::NONE, KeyCode::Char('L'))
                    if self.user.is_some() =>
                {
                    return Ok(Some(Action::Logout));
                }
                _ => {}
            }
        }

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            return screen.handle_key_event(key);
        }
        Ok(None)
    }

    /// Process a single action: update app state and propagate to components.
    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::Render | Action::Resize(..) => {}

            Action::Tick => {
                if self
                    .notification
                    .as_ref()
                    .is_some_and(|(_, shown)| shown.elapsed() > NOTIFICATION_TTL)
                {
                    self.notification = None;
                }
                self.forward_to_active(action)?;
            }

            Action::ViewChanged(view) => {
                if view.screen != self.active_screen {
                    debug!(from = %self.active_screen, to = %view.screen, "screen changed");
                    self.active_screen = view.screen;
                }
                self.broadcast(action)?;
            }

            Action::SessionChanged(user) => self.user.clone_from(user),

            Action::LastUpdate(at) => self.last_update = *at,

            // Data updates go to ALL screens so they stay in sync
            Action::DashboardUpdated(_)
            | Action::DevicesUpdated(_)
            | Action::SettingsUpdated(_)
            | Action::StatsUpdated(_)
            | Action::HistoriesUpdated(_)
            | Action::LoginFinished
            | Action::FormAccepted
            | Action::TokenIssued { .. } => self.broadcast(action)?,

            // ── Navigation intents ────────────────────────────────────
            Action::OpenDevice(id) => {
                let (c, id) = (self.controller.clone(), id.clone());
                self.execute(async move { c.open_device(&id).await }, |()| Vec::new());
            }
            Action::ShowDashboard => {
                let c = self.controller.clone();
                tokio::spawn(async move { c.show_dashboard().await });
            }
            Action::RequestAdmin => {
                let c = self.controller.clone();
                tokio::spawn(async move { c.request_admin().await });
            }

            // ── Authentication ────────────────────────────────────────
            Action::Login { username, password } => {
                let (c, tx) = (self.controller.clone(), self.action_tx.clone());
                let (username, password) = (username.clone(), password.clone());
                tokio::spawn(async move {
                    // Failures surface on the login form via the view state.
                    if c.login(&username, password).await.is_ok() {
                        let _ = tx.send(Action::Notify(Notification::success("Login berhasil")));
                    }
                    let _ = tx.send(Action::LoginFinished);
                });
            }
            Action::Logout => {
                let (c, tx) = (self.controller.clone(), self.action_tx.clone());
                tokio::spawn(async move {
                    c.logout().await;
                    let _ = tx.send(Action::Notify(Notification::info("Anda telah logout")));
                });
            }

            // ── Admin commands ────────────────────────────────────────
            Action::CreateDevice { name, secret_key } => {
                let c = self.controller.clone();
                let (name, secret_key) = (name.clone(), secret_key.clone());
                self.execute(
                    async move { c.create_device(&name, &secret_key).await },
                    |()| {
                        vec![
                            Action::FormAccepted,
                            Action::Notify(Notification::success("Perangkat ditambahkan")),
                        ]
                    },
                );
            }
            Action::RequestDelete(id) => {
                let (c, id) = (self.controller.clone(), id.clone());
                self.execute(async move { c.delete_device(&id).await }, |()| {
                    vec![Action::Notify(Notification::success("Perangkat dihapus"))]
                });
            }
            Action::RequestResetToken(id) => {
                let c = self.controller.clone();
                let id = id.clone();
                let issued = id.clone();
                self.execute(async move { c.reset_device_token(&id).await }, move |token| {
                    vec![
                        Action::Notify(Notification::success(format!("Token baru: {token}"))),
                        Action::TokenIssued { id: issued, token },
                    ]
                });
            }
            Action::UpdateSettings(key) => {
                let (c, key) = (self.controller.clone(), key.clone());
                self.execute(async move { c.update_settings(&key).await }, |()| {
                    vec![
                        Action::FormAccepted,
                        Action::Notify(Notification::success("Pengaturan disimpan")),
                    ]
                });
            }

            // ── Confirm dialog ────────────────────────────────────────
            Action::ShowConfirm(confirm) => self.pending_confirm = Some(confirm.clone()),
            Action::ConfirmYes => {
                if let Some(confirm) = self.pending_confirm.take() {
                    let next = match confirm {
                        ConfirmAction::DeleteDevice { id, .. } => Action::RequestDelete(id),
                        ConfirmAction::ResetToken { id, .. } => Action::RequestResetToken(id),
                    };
                    self.action_tx.send(next)?;
                }
            }
            Action::ConfirmNo => self.pending_confirm = None,

            Action::ToggleHelp => self.help_visible = !self.help_visible,

            // ── Notifications ─────────────────────────────────────────
            Action::Notify(n) => {
                self.notification = Some((n.clone(), Instant::now()));
                // Open forms show their own failures inline.
                self.forward_to_active(action)?;
            }
        }

        Ok(())
    }

    fn broadcast(&mut self, action: &Action) -> Result<()> {
        for screen in self.screens.values_mut() {
            if let Some(follow_up) = screen.update(action)? {
                self.action_tx.send(follow_up)?;
            }
        }
        Ok(())
    }

    fn forward_to_active(&mut self, action: &Action) -> Result<()> {
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            if let Some(follow_up) = screen.update(action)? {
                self.action_tx.send(follow_up)?;
            }
        }
        Ok(())
    }

    /// Spawn a controller call. Success maps to follow-up actions, failure
    /// to an error toast.
    fn execute<T, Fut, F>(&self, task: Fut, on_success: F)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
        F: FnOnce(T) -> Vec<Action> + Send + 'static,
    {
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(value) => {
                    for action in on_success(value) {
                        let _ = tx.send(action);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "command failed");
                    let _ = tx.send(Action::Notify(Notification::error(e.user_message())));
                }
            }
        });
    }

    // ── Rendering ─────────────────────────────────────────────────

    /// Render the full application frame.
    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, content_area, status_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(frame, header_area);
        if let Some(screen) = self.active() {
            screen.render(frame, content_area);
        }
        self.render_status_bar(frame, status_area);

        // Overlays, last = topmost
        if let Some((notif, _)) = &self.notification {
            Self::render_notification(frame, area, notif);
        }
        if let Some(confirm) = &self.pending_confirm {
            Self::render_confirm_dialog(frame, area, confirm);
        }
        if self.help_visible {
            Self::render_help_overlay(frame, area);
        }
    }

    /// Brand on the left, navigation on the right.
    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        frame.render_widget(
            Paragraph::new(Span::styled(" UKURAIR", theme::title_style())),
            inner,
        );

        let on_dashboard = matches!(
            self.active_screen,
            Screen::Dashboard | Screen::DeviceDetail
        );
        let style = |active: bool| {
            if active {
                theme::nav_active()
            } else {
                theme::nav_inactive()
            }
        };
        let mut nav = vec![
            Span::styled("d ", theme::key_hint_key()),
            Span::styled("Dashboard", style(on_dashboard)),
            Span::raw("   "),
            Span::styled("a ", theme::key_hint_key()),
        ];
        if self.user.is_some() {
            nav.extend([
                Span::styled("Admin Panel", style(!on_dashboard)),
                Span::raw("   "),
                Span::styled("L ", theme::key_hint_key()),
                Span::styled("Logout", Style::default().fg(theme::DANGER_RED)),
            ]);
        } else {
            nav.push(Span::styled("Login Admin", style(!on_dashboard)));
        }
        nav.push(Span::raw(" "));
        frame.render_widget(Paragraph::new(Line::from(nav)).right_aligned(), inner);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let updated = self.last_update.map_or_else(
            || "belum ada data".to_owned(),
            |at| format!("update {} lalu", fmt::fmt_age(at, Utc::now())),
        );
        let user = self.user.as_deref().unwrap_or("publik");

        let line = Line::from(vec![
            Span::styled(" ● ", Style::default().fg(theme::SAFE_GREEN)),
            Span::styled(self.backend.to_string(), theme::key_hint()),
            Span::styled(" │ ", theme::key_hint()),
            Span::styled(user, theme::key_hint()),
            Span::styled(" │ ", theme::key_hint()),
            Span::styled(updated, theme::key_hint()),
            Span::styled(" │ ? bantuan  q keluar", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_help_overlay(frame: &mut Frame, area: Rect) {
        let help_area = centered(area, 52, 20);
        frame.render_widget(Clear, help_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            help_area,
        );

        let block = Block::default()
            .title(" Pintasan Keyboard ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(help_area);
        frame.render_widget(block, help_area);

        let section = |title: &'static str| {
            Line::from(Span::styled(format!("  {title}"), Style::default().fg(theme::ACCENT)))
        };
        let entry = |key: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
                Span::styled(what, theme::key_hint()),
            ])
        };

        let help_text = vec![
            Line::from(""),
            section("Navigasi"),
            entry("d", "Dashboard"),
            entry("a", "Admin Panel / Login"),
            entry("←↑↓→ hjkl", "Pilih kartu"),
            entry("Enter", "Buka grafik"),
            entry("Esc", "Kembali"),
            Line::from(""),
            section("Admin"),
            entry("n", "Tambah perangkat"),
            entry("x", "Hapus perangkat"),
            entry("r", "Buat token baru"),
            entry("k", "Ubah API key"),
            entry("L", "Logout"),
            Line::from(""),
            entry("q", "Keluar"),
            Line::from(Span::styled("  Esc atau ? untuk menutup", theme::key_hint())),
        ];
        frame.render_widget(Paragraph::new(help_text), inner);
    }

    fn render_confirm_dialog(frame: &mut Frame, area: Rect, confirm: &ConfirmAction) {
        let dialog_area = centered(area, 56, 5);
        frame.render_widget(Clear, dialog_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            dialog_area,
        );

        let block = Block::default()
            .title(" Konfirmasi ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::WATCH_AMBER));
        let inner = block.inner(dialog_area);
        frame.render_widget(block, dialog_area);

        let text = vec![
            Line::from(Span::styled(
                format!("  {confirm}"),
                Style::default().fg(theme::TEXT),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("  y ", theme::key_hint_key()),
                Span::styled("ya    ", theme::key_hint()),
                Span::styled("n ", theme::key_hint_key()),
                Span::styled("batal", theme::key_hint()),
            ]),
        ];
        frame.render_widget(Paragraph::new(text), inner);
    }

    /// Notification toast in the bottom-right corner.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    fn render_notification(frame: &mut Frame, area: Rect, notif: &Notification) {
        let msg_len = notif.message.chars().count().min(usize::from(u16::MAX)) as u16;
        let width = msg_len.saturating_add(6).clamp(20, 60).min(area.width);
        let height = 3u16.min(area.height);

        let x = area.width.saturating_sub(width + 1);
        let y = area.height.saturating_sub(height + 1); // above status bar
        let toast_area = Rect::new(area.x + x, area.y + y, width, height);

        let (border_color, icon) = match notif.level {
            NotificationLevel::Success => (theme::SAFE_GREEN, "✓"),
            NotificationLevel::Error => (theme::DANGER_RED, "✗"),
            NotificationLevel::Info => (theme::ACCENT, "·"),
        };

        frame.render_widget(Clear, toast_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            toast_area,
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color));
        let inner = block.inner(toast_area);
        frame.render_widget(block, toast_area);

        let line = Line::from(vec![
            Span::styled(format!(" {icon} "), Style::default().fg(border_color)),
            Span::styled(notif.message.as_str(), Style::default().fg(theme::TEXT)),
        ]);
        frame.render_widget(Paragraph::new(line), inner);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ukurair_core::{CoreConfig, DeviceId, ViewState};
    use url::Url;

    fn app() -> App {
        let config = CoreConfig::rest(Url::parse("http://127.0.0.1:9/api").unwrap());
        App::new(
            Controller::from_config(&config).unwrap(),
            LoginPrefill::default(),
        )
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn global_keys_outside_forms() {
        let mut app = app();
        assert!(matches!(app.handle_key_event(key('q')).unwrap(), Some(Action::Quit)));
        assert!(matches!(
            app.handle_key_event(key('a')).unwrap(),
            Some(Action::RequestAdmin)
        ));
        // Logout only exists while signed in.
        assert!(app.handle_key_event(key('L')).unwrap().is_none());
    }

    #[tokio::test]
    async fn login_form_swallows_global_keys() {
        let mut app = app();
        app.process_action(&Action::ViewChanged(ViewState::on(Screen::Login)))
            .unwrap();
        assert_eq!(app.active_screen, Screen::Login);
        assert!(app.handle_key_event(key('q')).unwrap().is_none());

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(app.handle_key_event(ctrl_c).unwrap(), Some(Action::Quit)));
    }

    #[tokio::test]
    async fn confirm_dialog_turns_into_request() {
        let mut app = app();
        let id = DeviceId::from("9");
        app.process_action(&Action::ShowConfirm(ConfirmAction::DeleteDevice {
            id: id.clone(),
            name: "Pintu Air".into(),
        }))
        .unwrap();
        assert!(app.handle_key_event(key('x')).unwrap().is_none());
        assert!(matches!(
            app.handle_key_event(key('y')).unwrap(),
            Some(Action::ConfirmYes)
        ));

        app.process_action(&Action::ConfirmYes).unwrap();
        assert!(app.pending_confirm.is_none());
        assert!(matches!(
            app.action_rx.try_recv().unwrap(),
            Action::RequestDelete(sent) if sent == id
        ));
    }

    #[tokio::test]
    async fn notifications_expire_on_tick() {
        let mut app = app();
        app.process_action(&Action::Notify(Notification::info("halo")))
            .unwrap();
        assert!(app.notification.is_some());
        if let Some((_, shown)) = app.notification.as_mut() {
            *shown = Instant::now().checked_sub(Duration::from_secs(10)).unwrap();
        }
        app.process_action(&Action::Tick).unwrap();
        assert!(app.notification.is_none());
    }
}
