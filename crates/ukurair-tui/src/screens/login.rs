//! Admin login form.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use secrecy::{ExposeSecret, SecretString};
use throbber_widgets_tui::{Throbber, ThrobberState};

use ukurair_core::Screen;

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::centered;
use crate::widgets::input::{TextField, render_input_field};

/// Stored credentials shown when the form opens.
#[derive(Debug, Clone, Default)]
pub struct LoginPrefill {
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Username,
    Password,
}

pub struct LoginScreen {
    username: TextField,
    password: TextField,
    focus: Field,
    error: Option<String>,
    submitting: bool,
    throbber_state: ThrobberState,
}

impl LoginScreen {
    pub fn new(prefill: LoginPrefill) -> Self {
        let focus = if prefill.username.is_some() {
            Field::Password
        } else {
            Field::Username
        };
        let mut password = TextField::masked();
        if let Some(secret) = &prefill.password {
            password.value = secret.expose_secret().to_owned();
        }
        Self {
            username: TextField::new(prefill.username.unwrap_or_default()),
            password,
            focus,
            error: None,
            submitting: false,
            throbber_state: ThrobberState::default(),
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Username => Field::Password,
            Field::Password => Field::Username,
        };
    }

    fn active_field(&mut self) -> &mut TextField {
        match self.focus {
            Field::Username => &mut self.username,
            Field::Password => &mut self.password,
        }
    }

    fn submit(&mut self) -> Option<Action> {
        if self.focus == Field::Username && self.password.value.is_empty() {
            self.focus = Field::Password;
            return None;
        }
        self.submitting = true;
        Some(Action::Login {
            username: self.username.value.clone(),
            password: SecretString::from(self.password.value.clone()),
        })
    }
}

impl Component for LoginScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.submitting {
            return Ok(None);
        }
        match key.code {
            KeyCode::Esc => return Ok(Some(Action::ShowDashboard)),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => self.toggle_focus(),
            KeyCode::Enter => return Ok(self.submit()),
            _ => {
                self.active_field().handle_key(key);
            }
        }
        Ok(None)
    }

    fn handle_paste(&mut self, text: &str) {
        if !self.submitting {
            self.active_field().paste(text);
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::ViewChanged(view) => {
                self.error.clone_from(&view.error);
                if view.screen != Screen::Login {
                    self.submitting = false;
                    self.password.clear();
                    self.error = None;
                }
            }
            Action::LoginFinished => self.submitting = false,
            Action::Tick => {
                if self.submitting {
                    self.throbber_state.calc_next();
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let dialog = centered(area, 48, 17);
        let block = Block::default()
            .title(" Admin Access ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(dialog);
        frame.render_widget(block, dialog);

        let [_, user_area, pass_area, error_area, button_area, _, hint_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(4),
                Constraint::Length(4),
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .horizontal_margin(2)
            .areas(inner);

        render_input_field(
            frame,
            user_area,
            "Username",
            &self.username,
            self.focus == Field::Username,
        );
        render_input_field(
            frame,
            pass_area,
            "Password",
            &self.password,
            self.focus == Field::Password,
        );

        if let Some(err) = &self.error {
            frame.render_widget(
                Paragraph::new(Span::styled(err.as_str(), theme::error_text()))
                    .wrap(Wrap { trim: true }),
                error_area,
            );
        }

        if self.submitting {
            let throbber = Throbber::default()
                .label(" Memproses...")
                .style(Style::default().fg(theme::TEXT_DIM))
                .throbber_style(Style::default().fg(theme::ACCENT));
            frame.render_stateful_widget(throbber, button_area, &mut self.throbber_state.clone());
        } else {
            frame.render_widget(
                Paragraph::new(Span::styled("[ Login ]", theme::key_hint_key()))
                    .centered(),
                button_area,
            );
        }

        let hints = Line::from(vec![
            Span::styled("Tab ", theme::key_hint_key()),
            Span::styled("pindah  ", theme::key_hint()),
            Span::styled("Enter ", theme::key_hint_key()),
            Span::styled("login  ", theme::key_hint()),
            Span::styled("Esc ", theme::key_hint_key()),
            Span::styled("kembali", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints), hint_area);
    }

    fn captures_input(&self) -> bool {
        true
    }

}
