//! Connection and session configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default database file when no path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "entities.db";

/// Default statement timeout applied before tables are materialized.
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Where the embedded store lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// A database file opened (and created if missing) by path.
    Path(PathBuf),
    /// A private in-memory database, discarded on close.
    InMemory,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::Path(PathBuf::from(DEFAULT_DATABASE_PATH))
    }
}

impl From<&str> for ConnectionConfig {
    fn from(path: &str) -> Self {
        ConnectionConfig::Path(PathBuf::from(path))
    }
}

impl From<String> for ConnectionConfig {
    fn from(path: String) -> Self {
        ConnectionConfig::Path(PathBuf::from(path))
    }
}

impl From<&Path> for ConnectionConfig {
    fn from(path: &Path) -> Self {
        ConnectionConfig::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ConnectionConfig {
    fn from(path: PathBuf) -> Self {
        ConnectionConfig::Path(path)
    }
}

impl From<&PathBuf> for ConnectionConfig {
    fn from(path: &PathBuf) -> Self {
        ConnectionConfig::Path(path.clone())
    }
}

/// Session-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Statement timeout in milliseconds.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

const fn default_statement_timeout_ms() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT_MS
}

impl SessionConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
        }
    }
}
