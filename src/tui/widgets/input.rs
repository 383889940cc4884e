//! Input widget for the TUI.
//!
//! Provides the question field with cursor support.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Calculates the scroll offset needed to keep the cursor visible.
///
/// Returns the number of characters to skip from the start of the text.
pub fn calculate_scroll_offset(cursor: usize, available_width: usize) -> usize {
    if cursor <= available_width {
        0
    } else {
        cursor.saturating_sub(available_width)
    }
}

/// Width left for text inside the bar.
///
/// Border left (1) + prompt "> " (2) + border right (1) + cursor space (1) = 5
pub fn available_width(area: Rect) -> usize {
    area.width.saturating_sub(5) as usize
}

/// Input bar widget.
pub struct InputBar<'a> {
    text: &'a str,
    cursor: usize,
    focused: bool,
    enabled: bool,
}

impl<'a> InputBar<'a> {
    pub fn new(text: &'a str, cursor: usize, focused: bool, enabled: bool) -> Self {
        Self {
            text,
            cursor,
            focused,
            enabled,
        }
    }
}

impl Widget for InputBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(" Question ");

        let prompt_style = Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD);

        let body = if self.text.is_empty() {
            let placeholder = if self.enabled {
                "Ask a question about your data and press Enter"
            } else {
                "Connect to a database to ask questions"
            };
            Span::styled(placeholder, Style::default().fg(Color::DarkGray))
        } else {
            let offset = calculate_scroll_offset(self.cursor, available_width(area));
            let visible: String = self.text.chars().skip(offset).collect();
            Span::raw(visible)
        };

        let line = Line::from(vec![Span::styled("> ", prompt_style), body]);
        Paragraph::new(line).block(block).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_offset_when_cursor_fits() {
        assert_eq!(calculate_scroll_offset(5, 20), 0);
        assert_eq!(calculate_scroll_offset(20, 20), 0);
    }

    #[test]
    fn test_scroll_offset_when_cursor_overflows() {
        assert_eq!(calculate_scroll_offset(25, 20), 5);
    }

    #[test]
    fn test_available_width() {
        assert_eq!(available_width(Rect::new(0, 0, 30, 3)), 25);
        assert_eq!(available_width(Rect::new(0, 0, 3, 3)), 0);
    }
}
