//! Terminal User Interface for db-ask.
//!
//! Provides the main TUI application loop using ratatui and crossterm.
//! Session operations run as background tasks so the screen keeps redrawing
//! (and Ctrl+C keeps working) while a connect or a question is in flight.

pub mod app;
mod events;
mod ui;
pub mod widgets;

pub use app::{Action, App};
pub use events::{Event, EventHandler};

use crate::connection::{build_descriptor, BackendKind, RawFields};
use crate::error::{ConnectError, DbAskError, Result};
use crate::query::QueryResult;
use crate::session::{SessionError, SessionInfo, SharedSession};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::panic;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of a session operation, sent back to the event loop.
#[derive(Debug)]
pub enum Outcome {
    Connected(SessionInfo),
    ConnectFailed(ConnectError),
    Disconnected,
    Answered(QueryResult),
    /// The operation was refused before reaching the database.
    Failed(String),
}

/// Performs an action against the session.
///
/// Returns `None` for actions the event loop handles itself.
pub async fn perform(action: Action, session: &SharedSession) -> Option<Outcome> {
    let outcome = match action {
        Action::Quit => return None,
        Action::Connect { backend, fields } => match build_descriptor(backend, &fields) {
            Ok(descriptor) => match session.connect(descriptor).await {
                Ok(info) => Outcome::Connected(info),
                Err(SessionError::Connect(e)) => Outcome::ConnectFailed(e),
                Err(e) => Outcome::Failed(e.to_string()),
            },
            Err(e) => Outcome::Failed(e.to_string()),
        },
        Action::Disconnect => match session.disconnect().await {
            Ok(()) => Outcome::Disconnected,
            Err(e) => Outcome::Failed(e.to_string()),
        },
        Action::Ask(question) => match session.ask(&question).await {
            Ok(result) => Outcome::Answered(result),
            Err(e) => Outcome::Failed(e.to_string()),
        },
    };
    Some(outcome)
}

/// Feeds an outcome back into the app state.
pub fn apply(app: &mut App, outcome: Outcome) {
    match outcome {
        Outcome::Connected(info) => app.on_connected(&info),
        Outcome::ConnectFailed(e) => app.on_connect_failed(&e),
        Outcome::Disconnected => app.on_disconnected(),
        Outcome::Answered(result) => app.on_answer(result),
        Outcome::Failed(message) => app.on_error(message),
    }
}

/// A session operation running in the background.
pub struct InFlight {
    handle: JoinHandle<()>,
    /// Only questions are dropped on quit. A connect or disconnect runs to
    /// completion so no opened handle escapes the final disconnect.
    abort_on_quit: bool,
}

impl InFlight {
    /// Spawns the action and reports its outcome on `tx`.
    pub fn spawn(action: Action, session: &SharedSession, tx: mpsc::Sender<Outcome>) -> Self {
        let abort_on_quit = matches!(action, Action::Ask(_));
        let session = session.clone();
        let handle = tokio::spawn(async move {
            if let Some(outcome) = perform(action, &session).await {
                let _ = tx.send(outcome).await;
            }
        });
        Self {
            handle,
            abort_on_quit,
        }
    }

    /// Winds the operation down before the session is closed.
    pub async fn finish(self) {
        if self.abort_on_quit {
            self.handle.abort();
        }
        let _ = self.handle.await;
    }
}

/// What woke the event loop.
enum Wake {
    Terminal(Result<Event>),
    Finished(Outcome),
}

/// The main TUI application runner.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    event_handler: EventHandler,
}

impl Tui {
    /// Creates a new TUI instance, initializing the terminal.
    pub fn new() -> Result<Self> {
        let terminal = Self::setup_terminal()?;
        Ok(Self {
            terminal,
            event_handler: EventHandler::new(),
        })
    }

    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()
            .map_err(|e| DbAskError::internal(format!("Failed to enable raw mode: {e}")))?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .map_err(|e| DbAskError::internal(format!("Failed to enter alternate screen: {e}")))?;

        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend)
            .map_err(|e| DbAskError::internal(format!("Failed to create terminal: {e}")))
    }

    fn restore_terminal(&mut self) -> Result<()> {
        disable_raw_mode()
            .map_err(|e| DbAskError::internal(format!("Failed to disable raw mode: {e}")))?;

        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )
        .map_err(|e| DbAskError::internal(format!("Failed to leave alternate screen: {e}")))?;

        self.terminal
            .show_cursor()
            .map_err(|e| DbAskError::internal(format!("Failed to show cursor: {e}")))?;

        Ok(())
    }

    /// Runs the event loop until the user quits, then ends the session.
    pub async fn run(&mut self, app: &mut App, session: SharedSession) -> Result<()> {
        // Set up panic hook to restore terminal on panic
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
            original_hook(panic_info);
        }));

        let mut task = None;
        let result = self.run_event_loop(app, &session, &mut task).await;

        if let Some(task) = task.take() {
            task.finish().await;
        }
        if let Err(e) = session.disconnect().await {
            warn!("Error closing session: {}", e);
        }

        // Restore panic hook
        let _ = panic::take_hook();

        result
    }

    async fn run_event_loop(
        &mut self,
        app: &mut App,
        session: &SharedSession,
        task: &mut Option<InFlight>,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Outcome>(8);
        let mut pending_event: Option<JoinHandle<Result<Event>>> = None;

        loop {
            self.terminal
                .draw(|frame| ui::render(frame, app))
                .map_err(|e| DbAskError::internal(format!("Failed to draw: {e}")))?;

            if !app.running {
                break;
            }

            // The poll task is kept across iterations so no key press is lost
            // when an outcome arrives first.
            let wake = {
                let handler = self.event_handler;
                let poll = pending_event
                    .get_or_insert_with(|| tokio::task::spawn_blocking(move || handler.next()));
                tokio::select! {
                    joined = poll => Wake::Terminal(joined.unwrap_or_else(|e| {
                        Err(DbAskError::internal(format!("Event polling failed: {e}")))
                    })),
                    Some(outcome) = rx.recv() => Wake::Finished(outcome),
                }
            };

            match wake {
                Wake::Terminal(event) => {
                    pending_event = None;
                    let Event::Key(key) = event? else {
                        continue;
                    };
                    match app.handle_key(key) {
                        None | Some(Action::Quit) => {}
                        Some(action) => {
                            debug!(?action, "Starting session operation");
                            *task = Some(InFlight::spawn(action, session, tx.clone()));
                        }
                    }
                }
                Wake::Finished(outcome) => {
                    *task = None;
                    apply(app, outcome);
                }
            }
        }

        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

/// Runs the TUI with the connection form pre-filled.
pub async fn run(session: SharedSession, backend: BackendKind, fields: RawFields) -> Result<()> {
    info!(backend = %backend, "Starting TUI");
    let mut app = App::new(backend, fields);
    let mut tui = Tui::new()?;
    tui.run(&mut app, session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::StubAgentFactory;
    use crate::db::MockConnector;
    use crate::session::{SessionManager, SessionStatus};
    use crate::tui::app::ChatMessage;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn shared(connector: MockConnector, factory: StubAgentFactory) -> SharedSession {
        SharedSession::new(SessionManager::new(Arc::new(connector), Arc::new(factory)))
    }

    fn sqlite_app() -> App {
        App::new(BackendKind::Sqlite, RawFields::defaults_for(BackendKind::Sqlite))
    }

    async fn run_action(app: &mut App, session: &SharedSession, action: Action) {
        if let Some(outcome) = perform(action, session).await {
            apply(app, outcome);
        }
    }

    #[tokio::test]
    async fn test_connect_ask_disconnect() {
        let session = shared(MockConnector::new(), StubAgentFactory::answering("There are 3 users."));
        let mut app = sqlite_app();

        let action = app.handle_key(crossterm::event::KeyEvent::from(
            crossterm::event::KeyCode::Enter,
        ));
        run_action(&mut app, &session, action.unwrap()).await;
        assert!(app.is_connected());
        assert_eq!(app.session_label.as_deref(), Some("SQLite: data/todo_app.db"));

        run_action(&mut app, &session, Action::Ask("How many users?".to_string())).await;
        assert_eq!(
            app.messages.last(),
            Some(&ChatMessage::Answer("There are 3 users.".to_string()))
        );

        run_action(&mut app, &session, Action::Disconnect).await;
        assert!(!app.is_connected());
        assert_eq!(session.status().unwrap(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let connector = MockConnector::failing("connection refused");
        let session = shared(connector.clone(), StubAgentFactory::answering("unused"));
        let mut app = App::new(
            BackendKind::Postgres,
            RawFields::defaults_for(BackendKind::Postgres),
        );

        let action = Action::Connect {
            backend: BackendKind::Postgres,
            fields: app.fields.clone(),
        };
        run_action(&mut app, &session, action).await;

        assert!(!app.is_connected());
        assert_eq!(connector.connect_count(), 1);
        let Some(ChatMessage::Error(text)) = app.messages.last() else {
            panic!("expected an error message");
        };
        assert!(text.contains("connection refused"));
        assert!(text.contains("Tip: Check if PostgreSQL is running"));
    }

    #[tokio::test]
    async fn test_invalid_port_never_reaches_the_connector() {
        let connector = MockConnector::new();
        let session = shared(connector.clone(), StubAgentFactory::answering("unused"));
        let mut app = App::new(
            BackendKind::Postgres,
            RawFields::defaults_for(BackendKind::Postgres),
        );
        app.fields.port = "70000".to_string();

        let action = Action::Connect {
            backend: BackendKind::Postgres,
            fields: app.fields.clone(),
        };
        run_action(&mut app, &session, action).await;

        assert_eq!(connector.connect_count(), 0);
        let Some(ChatMessage::Error(text)) = app.messages.last() else {
            panic!("expected an error message");
        };
        assert!(text.contains("Port must be between 1 and 65535"));
    }

    #[tokio::test]
    async fn test_ask_while_disconnected() {
        let session = shared(MockConnector::new(), StubAgentFactory::answering("unused"));
        let mut app = sqlite_app();

        run_action(&mut app, &session, Action::Ask("Anything?".to_string())).await;

        assert_eq!(
            app.messages.last(),
            Some(&ChatMessage::Error(
                "Not connected. Connect to a database first.".to_string()
            ))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_quit_lets_a_pending_connect_finish() {
        let connector = MockConnector::new();
        let session = shared(connector.clone(), StubAgentFactory::answering("unused"));
        let (tx, mut rx) = mpsc::channel(8);

        // Nothing has been polled yet, so an abort would cancel the connect.
        let action = Action::Connect {
            backend: BackendKind::Sqlite,
            fields: RawFields::defaults_for(BackendKind::Sqlite),
        };
        InFlight::spawn(action, &session, tx).finish().await;

        assert_eq!(connector.connect_count(), 1);
        assert!(matches!(rx.recv().await, Some(Outcome::Connected(_))));
        session.disconnect().await.unwrap();
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_quit_drops_a_pending_question() {
        let session = shared(MockConnector::new(), StubAgentFactory::answering("unused"));
        let (tx, mut rx) = mpsc::channel(8);

        InFlight::spawn(Action::Ask("Anything?".to_string()), &session, tx)
            .finish()
            .await;

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_quit_is_not_a_session_operation() {
        let session = shared(MockConnector::new(), StubAgentFactory::answering("unused"));
        assert!(perform(Action::Quit, &session).await.is_none());
    }
}
