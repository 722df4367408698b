use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use thiserror::Error;

pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub location: DatabaseLocation,
    pub read_only: bool,
}

impl DatabaseTarget {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            read_only: false,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::InMemory,
            read_only: false,
        }
    }

    /// Parses user input: `:memory:` selects an in-memory database, anything
    /// else is treated as a file path.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == IN_MEMORY_DATABASE {
            return Some(Self::in_memory());
        }
        Some(Self::file(trimmed))
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            DatabaseLocation::File(path) => Some(path),
            DatabaseLocation::InMemory => None,
        }
    }

    /// Short name for status bars and history entries.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.location {
            DatabaseLocation::File(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |name| {
                    name.to_string_lossy().into_owned()
                }),
            DatabaseLocation::InMemory => IN_MEMORY_DATABASE.to_string(),
        }
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            DatabaseLocation::File(path) => write!(f, "{}", path.display())?,
            DatabaseLocation::InMemory => f.write_str(IN_MEMORY_DATABASE)?,
        }
        if self.read_only {
            f.write_str(" (read-only)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ConnectionBackend {
    type Connection: Send;

    async fn connect(&self, target: &DatabaseTarget) -> Result<Self::Connection, BackendError>;
    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError>;
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub target_label: Option<String>,
    pub is_connected: bool,
    pub read_only: bool,
    pub last_latency: Option<Duration>,
    pub last_health_check_at: Option<SystemTime>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            target_label: None,
            is_connected: false,
            read_only: false,
            last_latency: None,
            last_health_check_at: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionManagerError {
    #[error("already connected to `{active_target}`")]
    AlreadyConnected { active_target: String },
    #[error("no database is open")]
    NotConnected,
    #[error("connection backend failed: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug)]
struct ActiveConnection<C> {
    target: DatabaseTarget,
    handle: C,
}

#[derive(Debug)]
pub struct ConnectionManager<B: ConnectionBackend> {
    backend: B,
    active: Option<ActiveConnection<B::Connection>>,
    last_latency: Option<Duration>,
    last_health_check_at: Option<SystemTime>,
}

impl<B: ConnectionBackend> ConnectionManager<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
            last_latency: None,
            last_health_check_at: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            target_label: self.active.as_ref().map(|active| active.target.label()),
            is_connected: self.active.is_some(),
            read_only: self
                .active
                .as_ref()
                .is_some_and(|active| active.target.read_only),
            last_latency: self.last_latency,
            last_health_check_at: self.last_health_check_at,
        }
    }

    #[must_use]
    pub fn active_target(&self) -> Option<&DatabaseTarget> {
        self.active.as_ref().map(|active| &active.target)
    }

    #[must_use]
    pub fn connection(&self) -> Option<&B::Connection> {
        self.active.as_ref().map(|active| &active.handle)
    }

    pub async fn connect(
        &mut self,
        target: DatabaseTarget,
    ) -> Result<Duration, ConnectionManagerError> {
        if let Some(active) = &self.active {
            return Err(ConnectionManagerError::AlreadyConnected {
                active_target: active.target.to_string(),
            });
        }

        let started_at = Instant::now();
        let mut handle = self
            .backend
            .connect(&target)
            .await
            .map_err(ConnectionManagerError::Backend)?;
        self.backend
            .ping(&mut handle)
            .await
            .map_err(ConnectionManagerError::Backend)?;

        let latency = started_at.elapsed();
        self.last_latency = Some(latency);
        self.last_health_check_at = Some(SystemTime::now());
        tracing::info!(database = %target, ?latency, "database opened");
        self.active = Some(ActiveConnection { target, handle });

        Ok(latency)
    }

    pub async fn health_check(&mut self) -> Result<Duration, ConnectionManagerError> {
        let active = self
            .active
            .as_mut()
            .ok_or(ConnectionManagerError::NotConnected)?;

        let started_at = Instant::now();
        self.backend
            .ping(&mut active.handle)
            .await
            .map_err(ConnectionManagerError::Backend)?;

        let latency = started_at.elapsed();
        self.last_latency = Some(latency);
        self.last_health_check_at = Some(SystemTime::now());

        Ok(latency)
    }

    pub async fn disconnect(&mut self) -> Result<(), ConnectionManagerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        self.last_latency = None;
        self.last_health_check_at = None;
        tracing::info!(database = %active.target, "database closed");
        self.backend
            .disconnect(active.handle)
            .await
            .map_err(ConnectionManagerError::Backend)
    }
}
