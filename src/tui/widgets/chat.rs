//! Chat panel widget for the TUI.
//!
//! Displays the conversation: questions, answers and errors. When no session
//! is open it shows a welcome text with example questions for the selected
//! backend instead.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::connection::BackendKind;
use crate::tui::app::ChatMessage;

/// Chat panel widget.
pub struct ChatPanel<'a> {
    messages: &'a [ChatMessage],
    backend: BackendKind,
    connected: bool,
    scroll: usize,
    focused: bool,
}

impl<'a> ChatPanel<'a> {
    pub fn new(
        messages: &'a [ChatMessage],
        backend: BackendKind,
        connected: bool,
        scroll: usize,
        focused: bool,
    ) -> Self {
        Self {
            messages,
            backend,
            connected,
            scroll,
            focused,
        }
    }

    fn welcome_lines(&self) -> Vec<Line<'a>> {
        let mut lines = vec![
            Line::from(Span::styled(
                "Welcome to db-ask!",
                Style::default().fg(Color::Green),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Fill in the connection form and press Connect, then ask questions about your database in plain English.",
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Try asking ({}):", self.backend.display_name()),
                Style::default().fg(Color::Yellow),
            )),
        ];
        lines.extend(self.backend.example_questions().iter().map(|q| {
            Line::from(Span::styled(
                format!("  • {q}"),
                Style::default().fg(Color::Gray),
            ))
        }));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tab switches focus, Ctrl+D disconnects, Ctrl+L clears the chat, Ctrl+C exits.",
            Style::default().fg(Color::DarkGray),
        )));
        lines
    }

    fn message_lines(&self) -> Vec<Line<'a>> {
        let mut lines = Vec::new();
        for message in self.messages {
            let (text, color) = match message {
                ChatMessage::User(text) => (text, Color::Cyan),
                ChatMessage::Answer(text) => (text, Color::Green),
                ChatMessage::Error(text) => (text, Color::Red),
                ChatMessage::System(text) => (text, Color::DarkGray),
            };
            lines.push(Line::from(Span::styled(
                format!("{}:", message.type_label()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            for line in text.lines() {
                lines.push(Line::from(format!("  {line}")));
            }
            lines.push(Line::from(""));
        }
        lines
    }
}

/// Rows a set of lines occupies once wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'_>], width: u16) -> usize {
    let width = usize::from(width.max(1));
    lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum()
}

impl Widget for ChatPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(" Chat ");

        let mut lines = Vec::new();
        if !self.connected {
            lines.extend(self.welcome_lines());
            if !self.messages.is_empty() {
                lines.push(Line::from(""));
            }
        }
        lines.extend(self.message_lines());

        // Keep the newest lines visible; `scroll` counts rows up from the bottom.
        let inner = block.inner(area);
        let total = wrapped_height(&lines, inner.width);
        let max_offset = total.saturating_sub(usize::from(inner.height));
        let offset = max_offset.saturating_sub(self.scroll);
        let offset = u16::try_from(offset).unwrap_or(u16::MAX);

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((offset, 0))
            .render(area, buf);
    }
}
