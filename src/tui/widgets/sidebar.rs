//! Sidebar widget for the TUI.
//!
//! Shows the connection form: backend selector, the backend's fields and the
//! Connect/Disconnect button.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::tui::app::{App, Focus, FormField};

/// Sidebar widget for the connection form.
pub struct Sidebar<'a> {
    app: &'a App,
}

impl<'a> Sidebar<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    fn is_focused(&self, focus: Focus) -> bool {
        self.app.focus == focus
    }

    fn field_lines(&self, field: FormField) -> [Line<'a>; 2] {
        let focused = self.is_focused(Focus::Field(field));
        let value = self.app.field_value(field);
        let shown = if field == FormField::Password {
            "•".repeat(value.chars().count())
        } else {
            value.to_string()
        };
        let cursor = if focused { "▏" } else { "" };

        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value_style = if self.app.is_connected() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        [
            Line::from(Span::styled(field.label(), label_style)),
            Line::from(vec![
                Span::raw(" "),
                Span::styled(shown, value_style),
                Span::styled(cursor, Style::default().fg(Color::Cyan)),
            ]),
        ]
    }
}

impl Widget for Sidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let any_focused = matches!(
            self.app.focus,
            Focus::Backend | Focus::Field(_) | Focus::Toggle
        );
        let border_style = if any_focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(" Connection ");

        let backend_style = if self.is_focused(Focus::Backend) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut lines = vec![
            Line::from(Span::styled("Database type", backend_style)),
            Line::from(format!(" ◀ {} ▶", self.app.backend.display_name())),
            Line::from(""),
        ];

        for field in FormField::for_backend(self.app.backend) {
            lines.extend(self.field_lines(*field));
        }
        lines.push(Line::from(""));

        let (button, color) = if self.app.is_connected() {
            ("[ Disconnect ]", Color::Red)
        } else {
            ("[ Connect ]", Color::Green)
        };
        let mut button_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        if self.is_focused(Focus::Toggle) {
            button_style = button_style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(Span::styled(button, button_style)));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            self.app.backend.form_hint(),
            Style::default().fg(Color::DarkGray),
        )));

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
