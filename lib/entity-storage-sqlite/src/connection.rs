//! SQLite implementation of `Connection`.

use std::time::Duration;

use entity_storage::{Connection, ConnectionConfig, Output, Resolver, RowCursor, StorageError, Value};
use rusqlite::params_from_iter;
use tracing::{debug, info};

use crate::bind::{from_sql, to_sql};

/// Wrapper around `rusqlite::Connection` that implements [`Connection`].
#[derive(Debug)]
pub struct SqliteConnection(rusqlite::Connection);

impl SqliteConnection {
    /// Open a database file (created if missing) or a private in-memory
    /// database.
    pub fn open(config: impl Into<ConnectionConfig>) -> Result<Self, StorageError> {
        let connection = match config.into() {
            ConnectionConfig::Path(path) => {
                info!(path = %path.display(), "opening sqlite database");
                rusqlite::Connection::open(&path)?
            }
            ConnectionConfig::InMemory => {
                info!("opening in-memory sqlite database");
                rusqlite::Connection::open_in_memory()?
            }
        };
        Ok(Self(connection))
    }

    /// Get the inner rusqlite connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.0
    }
}

/// Forward-only cursor over the rows of one prepared statement.
struct SqliteCursor<'stmt> {
    columns: Vec<String>,
    rows: rusqlite::Rows<'stmt>,
}

impl RowCursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, StorageError> {
        let Some(row) = self.rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            values.push(from_sql(row.get_ref(idx)?, column)?);
        }
        Ok(Some(values))
    }
}

impl Connection for SqliteConnection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError> {
        let rows = self.0.execute(sql, params_from_iter(params.iter().map(to_sql)))?;
        Ok(rows)
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
        resolver: &Resolver,
    ) -> Result<Output, StorageError> {
        let mut stmt = self.0.prepare(sql)?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;
        let mut cursor = SqliteCursor { columns, rows };
        resolver.resolve(&mut cursor)
    }

    fn begin(&self) -> Result<(), StorageError> {
        self.0.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.0.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), StorageError> {
        debug!("rolling back transaction");
        self.0.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn is_autocommit(&self) -> bool {
        self.0.is_autocommit()
    }

    /// SQLite has no per-statement deadline; the busy timeout bounds lock
    /// waits only.
    fn set_statement_timeout(&self, timeout: Duration) -> Result<(), StorageError> {
        self.0.busy_timeout(timeout)?;
        Ok(())
    }

    fn close(self) -> Result<(), StorageError> {
        self.0.close().map_err(|(_, e)| StorageError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_state_follows_begin_and_rollback() {
        let conn = SqliteConnection::open(ConnectionConfig::InMemory).unwrap();
        assert!(conn.is_autocommit());
        conn.begin().unwrap();
        assert!(!conn.is_autocommit());
        conn.rollback().unwrap();
        assert!(conn.is_autocommit());
    }

    #[test]
    fn query_hands_columns_and_rows_to_the_resolver() {
        let conn = SqliteConnection::open(ConnectionConfig::InMemory).unwrap();
        conn.execute("CREATE TABLE t (n INTEGER)", &[]).unwrap();
        for n in [1, 2, 3] {
            conn.execute("INSERT INTO t (n) VALUES (?)", &[Value::Integer(n)])
                .unwrap();
        }
        let out = conn
            .query("SELECT SUM(n) FROM t WHERE n > ?", &[Value::Integer(1)], &Resolver::Long)
            .unwrap();
        assert_eq!(out, Output::Long(5));
    }

    #[test]
    fn statement_timeout_sets_the_busy_timeout() {
        let conn = SqliteConnection::open(ConnectionConfig::InMemory).unwrap();
        conn.set_statement_timeout(Duration::from_millis(1500))
            .unwrap();
        let busy: i64 = conn
            .inner()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy, 1500);
    }

    #[test]
    fn close_consumes_the_connection() {
        let conn = SqliteConnection::open(ConnectionConfig::InMemory).unwrap();
        conn.close().unwrap();
    }
}
