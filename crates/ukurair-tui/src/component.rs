//! The `Component` trait each screen implements.

use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

use crate::action::Action;

/// A screen. The app feeds it keys, pasted text and broadcast actions;
/// it never touches shared state directly, only returns actions.
pub trait Component: Send {
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Bracketed paste while this screen captures input.
    fn handle_paste(&mut self, _text: &str) {}

    /// React to a dispatched action; may return a follow-up.
    fn update(&mut self, _action: &Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect);

    /// Typed characters belong to this screen (text fields, open forms)
    /// instead of the global key bindings.
    fn captures_input(&self) -> bool {
        false
    }
}
