//! UI rendering for the TUI.
//!
//! Defines the layout and renders all UI components.

use super::app::{App, Focus};
use super::widgets::{chat, header, input, sidebar};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    Frame,
};

/// Width of the connection form.
const SIDEBAR_WIDTH: u16 = 34;

/// Renders the entire UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Main layout: header, content, input
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Content (form + chat)
            Constraint::Length(3), // Input
        ])
        .split(area);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(main_layout[1]);

    render_header(frame, main_layout[0], app);
    render_sidebar(frame, content_layout[0], app);
    render_chat(frame, content_layout[1], app);
    render_input(frame, main_layout[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let widget = header::Header::new(app.session_label.as_deref(), app.busy);
    frame.render_widget(widget, area);
}

fn render_sidebar(frame: &mut Frame, area: Rect, app: &App) {
    frame.render_widget(sidebar::Sidebar::new(app), area);
}

fn render_chat(frame: &mut Frame, area: Rect, app: &App) {
    let widget = chat::ChatPanel::new(
        &app.messages,
        app.backend,
        app.is_connected(),
        app.chat_scroll,
        app.focus == Focus::Chat,
    );
    frame.render_widget(widget, area);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == Focus::Input;
    let widget = input::InputBar::new(
        &app.input.text,
        app.input.cursor,
        focused,
        app.is_connected(),
    );
    frame.render_widget(widget, area);

    // Position cursor in input field when focused
    if focused && !app.busy {
        let offset = input::calculate_scroll_offset(app.input.cursor, input::available_width(area));
        let column = (app.input.cursor - offset) as u16;
        // Account for border (1) and prompt "> " (2)
        let cursor_x = area.x + 1 + 2 + column;
        let cursor_y = area.y + 1;
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}
