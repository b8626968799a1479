//! Single-line text field with a label above a rounded box.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::theme;

/// Editable text buffer. Only appends and backspace; no cursor movement.
#[derive(Debug, Clone, Default)]
pub struct TextField {
    pub value: String,
    pub masked: bool,
}

impl TextField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            masked: false,
        }
    }

    pub fn masked() -> Self {
        Self {
            value: String::new(),
            masked: true,
        }
    }

    /// Apply an editing key. Returns `true` if the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Backspace => {
                self.value.pop();
                true
            }
            // Ctrl+U clears the field
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.clear();
                true
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.push(c);
                true
            }
            _ => false,
        }
    }

    /// Append pasted text. Only its first line is kept, without control
    /// characters.
    pub fn paste(&mut self, text: &str) {
        let line = text.lines().next().unwrap_or_default();
        self.value.extend(line.chars().filter(|c| !c.is_control()));
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Text as drawn: bullets when masked.
    pub fn display(&self) -> String {
        if self.masked {
            "\u{25CF}".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

/// Label on the first row, bordered value box on the next three.
pub fn render_input_field(
    frame: &mut Frame,
    area: Rect,
    label: &str,
    field: &TextField,
    active: bool,
) {
    if area.height < 3 {
        return;
    }

    let label_area = Rect::new(area.x, area.y, area.width, 1);
    let label_style = if active {
        Style::default().fg(theme::ACCENT)
    } else {
        Style::default().fg(theme::TEXT_DIM)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(label.to_owned(), label_style)),
        label_area,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if active {
            theme::border_focused()
        } else {
            theme::border_default()
        });

    let block_area = Rect::new(area.x, area.y + 1, area.width, 3.min(area.height - 1));
    let inner = block.inner(block_area);
    frame.render_widget(block, block_area);

    let display = field.display();
    let text = if active {
        format!("{display}\u{2588}")
    } else {
        display
    };
    frame.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(theme::TEXT))),
        inner,
    );
}
