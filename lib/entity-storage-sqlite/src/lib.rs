//! SQLite backend for entity-storage.
//!
//! Provides [`SqliteConnection`], an implementation of
//! [`entity_storage::Connection`] over a single `rusqlite` connection, and
//! helpers that open a [`Database`] or [`Session`] on it.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod connection;

use entity_storage::{
    ConnectionConfig, Database, DatabaseDeclaration, EntityDescriptor, Session, SessionConfig,
    StorageError,
};

pub use connection::SqliteConnection;

pub type SqliteDatabase = Database<SqliteConnection>;
pub type SqliteSession = Session<SqliteConnection>;

/// Open `declaration` on a SQLite database with the default session settings.
pub fn open_database(
    config: impl Into<ConnectionConfig>,
    declaration: DatabaseDeclaration,
) -> Result<SqliteDatabase, StorageError> {
    let connection = SqliteConnection::open(config)?;
    Database::open(connection, declaration, &SessionConfig::default())
}

/// Open a bare session over `entities` with the default session settings.
pub fn open_session(
    config: impl Into<ConnectionConfig>,
    entities: Vec<EntityDescriptor>,
) -> Result<SqliteSession, StorageError> {
    let connection = SqliteConnection::open(config)?;
    Session::new(connection, entities, &SessionConfig::default())
}
