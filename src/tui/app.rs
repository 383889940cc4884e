//! Application state for the TUI.
//!
//! `App` is pure state: key presses update it and may produce an [`Action`]
//! for the runner to perform against the session manager. Results are fed
//! back through the `on_*` methods.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::connection::{BackendKind, RawFields};
use crate::error::ConnectError;
use crate::query::QueryResult;
use crate::session::{SessionInfo, SessionStatus};

/// A connection form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Path,
    Host,
    Port,
    Database,
    Username,
    Password,
}

impl FormField {
    /// Fields shown for a backend, in form order.
    pub fn for_backend(backend: BackendKind) -> &'static [FormField] {
        match backend {
            BackendKind::Sqlite => &[Self::Path],
            BackendKind::Postgres => &[
                Self::Host,
                Self::Port,
                Self::Database,
                Self::Username,
                Self::Password,
            ],
            BackendKind::SqlServer => &[Self::Host, Self::Database, Self::Username, Self::Password],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Path => "Database path",
            Self::Host => "Host",
            Self::Port => "Port",
            Self::Database => "Database",
            Self::Username => "Username",
            Self::Password => "Password",
        }
    }

    fn value<'a>(&self, fields: &'a RawFields) -> &'a str {
        match self {
            Self::Path => &fields.path,
            Self::Host => &fields.host,
            Self::Port => &fields.port,
            Self::Database => &fields.database,
            Self::Username => &fields.username,
            Self::Password => &fields.secret,
        }
    }

    fn value_mut<'a>(&self, fields: &'a mut RawFields) -> &'a mut String {
        match self {
            Self::Path => &mut fields.path,
            Self::Host => &mut fields.host,
            Self::Port => &mut fields.port,
            Self::Database => &mut fields.database,
            Self::Username => &mut fields.username,
            Self::Password => &mut fields.secret,
        }
    }
}

/// Which element currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Backend,
    Field(FormField),
    Toggle,
    Chat,
    Input,
}

/// Something the runner must do on the app's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connect {
        backend: BackendKind,
        fields: RawFields,
    },
    Disconnect,
    Ask(String),
    Quit,
}

/// A message in the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// A question from the user.
    User(String),
    /// The agent's answer.
    Answer(String),
    /// Why a question or a connect attempt failed.
    Error(String),
    /// Status notices (connected, disconnected, ...).
    System(String),
}

impl ChatMessage {
    /// Returns the message type as a string for display purposes.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::User(_) => "You",
            Self::Answer(_) => "Answer",
            Self::Error(_) => "Error",
            Self::System(_) => "System",
        }
    }
}

/// Input state for text editing.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Default)]
pub struct InputState {
    /// Current input text.
    pub text: String,
    /// Cursor position (character index).
    pub cursor: usize,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Inserts a character at the cursor position.
    pub fn insert(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    /// Deletes the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    /// Deletes the character at the cursor (delete key).
    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    /// Clears the input and returns the previous text.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Main application state.
pub struct App {
    /// Whether the application is still running.
    pub running: bool,
    /// Current focus.
    pub focus: Focus,
    /// Backend selected in the connection form.
    pub backend: BackendKind,
    /// Connection form contents.
    pub fields: RawFields,
    /// Question input state.
    pub input: InputState,
    /// Chat messages.
    pub messages: Vec<ChatMessage>,
    /// Chat scroll offset (lines from bottom).
    pub chat_scroll: usize,
    /// Session status as last reported by the runner.
    pub status: SessionStatus,
    /// Password-free label of the active session.
    pub session_label: Option<String>,
    /// Whether an action is being performed.
    pub busy: bool,
}

impl App {
    /// Creates the app with the connection form pre-filled.
    pub fn new(backend: BackendKind, fields: RawFields) -> Self {
        Self {
            running: true,
            focus: Focus::Toggle,
            backend,
            fields,
            input: InputState::new(),
            messages: Vec::new(),
            chat_scroll: 0,
            status: SessionStatus::Disconnected,
            session_label: None,
            busy: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Elements reachable with Tab, in order.
    pub fn focus_order(&self) -> Vec<Focus> {
        let mut order = Vec::new();
        if !self.is_connected() {
            order.push(Focus::Backend);
            order.extend(
                FormField::for_backend(self.backend)
                    .iter()
                    .map(|f| Focus::Field(*f)),
            );
        }
        order.extend([Focus::Toggle, Focus::Chat, Focus::Input]);
        order
    }

    fn cycle_focus(&mut self, forward: bool) {
        let order = self.focus_order();
        let len = order.len();
        let current = order.iter().position(|f| *f == self.focus);
        self.focus = match (current, forward) {
            (Some(i), true) => order[(i + 1) % len],
            (Some(i), false) => order[(i + len - 1) % len],
            (None, _) => Focus::Toggle,
        };
    }

    /// The current value of a form field.
    pub fn field_value(&self, field: FormField) -> &str {
        field.value(&self.fields)
    }

    /// Adds a message to the chat.
    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.chat_scroll = 0;
    }

    /// Clears all chat messages.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.chat_scroll = 0;
    }

    /// Handles a key press, returning the action it triggers, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.running = false;
                return Some(Action::Quit);
            }
            _ if self.busy => return None,
            KeyCode::Char('l') if ctrl => {
                self.clear_messages();
                return None;
            }
            KeyCode::Char('d') if ctrl => {
                return self.is_connected().then(|| self.begin(Action::Disconnect));
            }
            KeyCode::Tab => {
                self.cycle_focus(true);
                return None;
            }
            KeyCode::BackTab => {
                self.cycle_focus(false);
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Backend => {
                match key.code {
                    KeyCode::Left => self.backend = self.backend.prev(),
                    KeyCode::Right | KeyCode::Char(' ') => self.backend = self.backend.next(),
                    KeyCode::Enter => self.cycle_focus(true),
                    _ => {}
                }
                None
            }
            Focus::Field(field) => {
                match key.code {
                    KeyCode::Char(c) => field.value_mut(&mut self.fields).push(c),
                    KeyCode::Backspace => {
                        field.value_mut(&mut self.fields).pop();
                    }
                    KeyCode::Enter | KeyCode::Down => self.cycle_focus(true),
                    KeyCode::Up => self.cycle_focus(false),
                    _ => {}
                }
                None
            }
            Focus::Toggle => match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => Some(self.toggle_action()),
                _ => None,
            },
            Focus::Chat => {
                match key.code {
                    KeyCode::Up => self.chat_scroll = self.chat_scroll.saturating_add(1),
                    KeyCode::Down => self.chat_scroll = self.chat_scroll.saturating_sub(1),
                    KeyCode::PageUp => self.chat_scroll = self.chat_scroll.saturating_add(10),
                    KeyCode::PageDown => self.chat_scroll = self.chat_scroll.saturating_sub(10),
                    KeyCode::End => self.chat_scroll = 0,
                    _ => {}
                }
                None
            }
            Focus::Input => self.handle_input_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char(c) => self.input.insert(c),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Enter => {
                let question = self.input.text.trim().to_string();
                if question.is_empty() {
                    return None;
                }
                self.input.take();
                self.add_message(ChatMessage::User(question.clone()));
                return Some(self.begin(Action::Ask(question)));
            }
            _ => {}
        }
        None
    }

    fn toggle_action(&mut self) -> Action {
        if self.is_connected() {
            self.begin(Action::Disconnect)
        } else {
            self.begin(Action::Connect {
                backend: self.backend,
                fields: self.fields.clone(),
            })
        }
    }

    fn begin(&mut self, action: Action) -> Action {
        self.busy = true;
        action
    }

    /// Records a successful connect.
    pub fn on_connected(&mut self, info: &SessionInfo) {
        self.busy = false;
        self.status = SessionStatus::Connected(info.backend);
        self.session_label = Some(info.label.clone());
        self.focus = Focus::Input;
        self.add_message(ChatMessage::System(format!(
            "Connected to {}. Ask a question below.",
            info.label
        )));
    }

    /// Records a failed connect, with the backend's troubleshooting hint.
    pub fn on_connect_failed(&mut self, error: &ConnectError) {
        self.busy = false;
        let text = match error.troubleshooting() {
            Some(tip) => format!("{error}\nTip: {tip}"),
            None => error.to_string(),
        };
        self.add_message(ChatMessage::Error(text));
    }

    /// Records that the session has ended.
    pub fn on_disconnected(&mut self) {
        self.busy = false;
        let was_connected = self.is_connected();
        self.status = SessionStatus::Disconnected;
        self.session_label = None;
        if self.focus == Focus::Input || self.focus == Focus::Chat {
            self.focus = Focus::Toggle;
        }
        if was_connected {
            self.add_message(ChatMessage::System("Disconnected.".to_string()));
        }
    }

    /// Records the outcome of a question.
    pub fn on_answer(&mut self, result: QueryResult) {
        self.busy = false;
        match result {
            QueryResult::Answer(text) => self.add_message(ChatMessage::Answer(text)),
            QueryResult::Failure(reason) => self.add_message(ChatMessage::Error(reason)),
        }
    }

    /// Records an error that is not tied to a question's answer.
    pub fn on_error(&mut self, message: impl Into<String>) {
        self.busy = false;
        self.add_message(ChatMessage::Error(message.into()));
    }
}
