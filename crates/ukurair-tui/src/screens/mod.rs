//! Screen implementations. Each screen is a top-level Component.

pub mod admin;
pub mod dashboard;
pub mod detail;
pub mod login;

use ukurair_core::Screen;

use crate::component::Component;

/// One component per controller screen.
pub fn create_screens(prefill: login::LoginPrefill) -> Vec<(Screen, Box<dyn Component>)> {
    vec![
        (
            Screen::Dashboard,
            Box::new(dashboard::DashboardScreen::new()),
        ),
        (Screen::Login, Box::new(login::LoginScreen::new(prefill))),
        (
            Screen::DeviceDetail,
            Box::new(detail::DetailScreen::new()),
        ),
        (Screen::Admin, Box::new(admin::AdminScreen::new())),
    ]
}

#[cfg(test)]
pub(crate) mod test_util {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::component::Component;

    /// Render `component` into an off-screen buffer and return its text.
    #[allow(clippy::unwrap_used)]
    pub fn render_to_string(component: &dyn Component, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| component.render(frame, frame.area()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }
}
