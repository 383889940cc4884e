//! Session management for db-ask.
//!
//! Owns at most one active (database, agent) pair. A session moves from
//! Disconnected to Connected through [`SessionManager::connect`] and back
//! through [`SessionManager::disconnect`]; there is no other state.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent::{Agent, AgentFactory};
use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::db::{Connector, DatabaseClient};
use crate::error::ConnectError;
use crate::query::{QueryResult, QueryRunner};

/// Why a session operation was refused.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session is active.
    #[error("Not connected. Connect to a database first.")]
    NotConnected,

    /// Another session operation is still running.
    #[error("Another operation is still in progress. Please wait for it to finish.")]
    Busy,

    /// The connect attempt failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Whether a session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected(BackendKind),
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Password-free facts about an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub backend: BackendKind,
    /// Description shown to the user, e.g. `PostgreSQL: app @ db:5432`.
    pub label: String,
    pub connected_at: DateTime<Local>,
}

/// An active connection with the agent bound to it.
///
/// The agent owns the database handle; shutting the agent down closes it.
pub struct Session {
    info: SessionInfo,
    agent: Box<dyn Agent>,
}

impl Session {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn backend(&self) -> BackendKind {
        self.info.backend
    }

    pub fn label(&self) -> &str {
        &self.info.label
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("info", &self.info).finish()
    }
}

/// Owns the single active session, if any.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    factory: Arc<dyn AgentFactory>,
    session: Option<Session>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            connector,
            factory,
            session: None,
        }
    }

    /// Opens the database the descriptor names and binds an agent to it.
    ///
    /// Rejected while a session is active. A failed attempt leaves nothing
    /// behind: any handle that was opened is closed again and the manager
    /// stays Disconnected.
    pub async fn connect(
        &mut self,
        descriptor: ConnectionDescriptor,
    ) -> Result<&Session, ConnectError> {
        if let Some(session) = &self.session {
            return Err(ConnectError::AlreadyConnected(session.backend()));
        }

        let backend = descriptor.backend();
        let label = descriptor.label();
        let start = Instant::now();
        info!(backend = %backend, target_db = %label, "Connecting");

        let db: Arc<dyn DatabaseClient> = match self.connector.open(&descriptor).await {
            Ok(client) => Arc::from(client),
            Err(e) => {
                warn!(backend = %backend, error = %e, "Connection failed");
                return Err(ConnectError::failed(backend, &e));
            }
        };
        drop(descriptor);

        let agent = match self.factory.create_agent(Arc::clone(&db)).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(backend = %backend, error = %e, "Agent construction failed");
                if let Err(close_err) = db.close().await {
                    warn!(error = %close_err, "Failed to close database after failed connect");
                }
                return Err(ConnectError::failed(backend, &e));
            }
        };

        info!(
            backend = %backend,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Connected"
        );
        let session = self.session.insert(Session {
            info: SessionInfo {
                backend,
                label,
                connected_at: Local::now(),
            },
            agent,
        });
        Ok(&*session)
    }

    /// Ends the active session. Does nothing when Disconnected.
    ///
    /// Errors while closing are logged; the manager is Disconnected afterwards
    /// either way.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Err(e) = session.agent.shutdown().await {
            warn!(backend = %session.backend(), error = %e, "Error while closing session");
        }
        info!(backend = %session.backend(), "Disconnected");
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        match &self.session {
            Some(session) => SessionStatus::Connected(session.backend()),
            None => SessionStatus::Disconnected,
        }
    }
}

/// A [`SessionManager`] shared between tasks.
///
/// Operations never wait for each other: a call that overlaps another one
/// fails with [`SessionError::Busy`].
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionManager>>,
}

impl SharedSession {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Connects and returns the new session's details.
    pub async fn connect(
        &self,
        descriptor: ConnectionDescriptor,
    ) -> Result<SessionInfo, SessionError> {
        let mut manager = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        let session = manager.connect(descriptor).await?;
        Ok(session.info().clone())
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut manager = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        manager.disconnect().await;
        Ok(())
    }

    pub async fn ask(&self, question: &str) -> Result<QueryResult, SessionError> {
        let manager = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        QueryRunner::ask_current(&manager, question).await
    }

    pub fn status(&self) -> Result<SessionStatus, SessionError> {
        let manager = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        Ok(manager.status())
    }
}
