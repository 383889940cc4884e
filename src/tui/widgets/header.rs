//! Header widget for the TUI.
//!
//! Displays the application name, version, and session status.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::Widget,
};

/// Header bar widget.
pub struct Header<'a> {
    session_label: Option<&'a str>,
    busy: bool,
}

impl<'a> Header<'a> {
    pub fn new(session_label: Option<&'a str>, busy: bool) -> Self {
        Self {
            session_label,
            busy,
        }
    }
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);

        for x in area.left()..area.right() {
            buf[(x, area.y)].set_style(style);
        }

        let left_text = format!(" db-ask v{}", env!("CARGO_PKG_VERSION"));
        let left_span = Span::styled(left_text, style);
        buf.set_span(area.x, area.y, &left_span, area.width);

        if self.busy {
            let busy_text = "Working...";
            let busy_style = style.fg(Color::Yellow);
            let busy_x = area.x + area.width.saturating_sub(busy_text.len() as u16) / 2;
            buf.set_string(busy_x, area.y, busy_text, busy_style);
        }

        // Right side: status dot and session label
        let connected = self.session_label.is_some();
        let status_dot = if connected { "●" } else { "○" };
        let status_color = if connected { Color::Green } else { Color::Gray };
        let info = self.session_label.unwrap_or("not connected");
        let info_text = format!(" {info} ");

        let right_width = (info_text.chars().count() + 2) as u16;
        if right_width < area.width {
            let right_x = area.right().saturating_sub(right_width);
            buf.set_string(right_x, area.y, " ", style);
            buf.set_string(
                right_x + 1,
                area.y,
                status_dot,
                Style::default().bg(Color::Blue).fg(status_color),
            );
            buf.set_string(right_x + 2, area.y, &info_text, style);
        }
    }
}
