//! The session: one open connection plus the descriptors of its entity set.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::sql::{self, ConflictStrategy, Statement};
use crate::{EntityDescriptor, Output, Record, Resolver, SessionConfig, StorageError, Value};

/// A SQL-executing connection to the embedded store.
///
/// Implemented by storage backends. The session drives transactions through
/// `begin`/`commit`/`rollback` and never assumes more than one statement is
/// in flight.
pub trait Connection {
    /// Execute a statement and return the number of rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError>;

    /// Run a query and hand its cursor to `resolver`.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
        resolver: &Resolver,
    ) -> Result<Output, StorageError>;

    /// Leave auto-commit mode.
    fn begin(&self) -> Result<(), StorageError>;

    fn commit(&self) -> Result<(), StorageError>;

    fn rollback(&self) -> Result<(), StorageError>;

    /// Whether the connection is outside any open transaction.
    fn is_autocommit(&self) -> bool;

    /// Bound how long a statement may block. Backends map this to the
    /// nearest control their driver offers; for sqlite that is the busy
    /// timeout, which limits waiting on a locked database rather than
    /// statement run time.
    fn set_statement_timeout(&self, timeout: Duration) -> Result<(), StorageError>;

    /// Release the underlying handle.
    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// Owns exactly one connection and the entity descriptors it serves.
///
/// The connection moves out on [`Session::close`]; every later operation
/// fails with [`StorageError::SessionClosed`].
pub struct Session<C: Connection> {
    connection: Option<C>,
    entities: Vec<EntityDescriptor>,
}

impl<C: Connection> Session<C> {
    /// Open a session and create every table, in declared order.
    pub fn new(
        connection: C,
        entities: Vec<EntityDescriptor>,
        config: &SessionConfig,
    ) -> Result<Self, StorageError> {
        for (idx, entity) in entities.iter().enumerate() {
            if entities[..idx].iter().any(|e| e.name == entity.name) {
                return Err(StorageError::DuplicateEntity(entity.name.clone()));
            }
        }
        connection.set_statement_timeout(config.statement_timeout())?;
        for entity in &entities {
            let create = sql::create_table_sql(entity);
            info!(entity = %entity.name, table = %entity.table_name, "materializing table");
            debug!(sql = %create, "executing statement");
            connection.execute(&create, &[])?;
        }

        Ok(Self {
            connection: Some(connection),
            entities,
        })
    }

    fn connection(&self) -> Result<&C, StorageError> {
        self.connection.as_ref().ok_or(StorageError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    /// Descriptors in declared order.
    pub fn descriptors(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    pub fn descriptor(&self, entity: &str) -> Result<&EntityDescriptor, StorageError> {
        self.entities
            .iter()
            .find(|e| e.name == entity)
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))
    }

    /// Run `statement` inside a transaction, rolling back on any failure.
    fn execute_in_transaction(&self, statement: &Statement) -> Result<usize, StorageError> {
        let connection = self.connection()?;
        ensure_bindable(&statement.params)?;
        debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");

        connection.begin()?;
        let outcome = connection
            .execute(&statement.sql, &statement.params)
            .and_then(|rows| connection.commit().map(|()| rows));

        if !connection.is_autocommit() {
            if let Err(e) = connection.rollback() {
                warn!(error = %e, sql = %statement.sql, "rollback failed");
            }
        }
        outcome
    }

    pub fn exec_insert(
        &self,
        record: &Record,
        strategy: ConflictStrategy,
    ) -> Result<bool, StorageError> {
        let descriptor = self.descriptor(&record.entity)?;
        let statement = sql::insert(descriptor, record, strategy);
        self.execute_in_transaction(&statement)?;
        Ok(true)
    }

    pub fn exec_delete(&self, record: &Record) -> Result<usize, StorageError> {
        let descriptor = self.descriptor(&record.entity)?;
        let statement = sql::delete(descriptor, record)?;
        self.execute_in_transaction(&statement)
    }

    pub fn exec_update(
        &self,
        record: &Record,
        strategy: ConflictStrategy,
    ) -> Result<usize, StorageError> {
        let descriptor = self.descriptor(&record.entity)?;
        let statement = sql::update(descriptor, record, strategy)?;
        self.execute_in_transaction(&statement)
    }

    /// Execute a literal template with positional parameters.
    pub fn exec_literal(&self, sql: &str, params: &[Value]) -> Result<usize, StorageError> {
        self.execute_in_transaction(&Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
    }

    pub fn query(
        &self,
        sql: &str,
        resolver: &Resolver,
        params: &[Value],
    ) -> Result<Output, StorageError> {
        let connection = self.connection()?;
        ensure_bindable(params)?;
        debug!(sql = %sql, params = params.len(), "executing query");
        connection.query(sql, params, resolver)
    }

    /// Close the connection. Closing twice is an error.
    pub fn close(&mut self) -> Result<(), StorageError> {
        let connection = self.connection.take().ok_or(StorageError::SessionClosed)?;
        info!(entities = self.entities.len(), "closing session");
        connection.close()
    }
}

fn ensure_bindable(params: &[Value]) -> Result<(), StorageError> {
    params
        .iter()
        .enumerate()
        .try_for_each(|(idx, value)| value.ensure_bindable(&format!("parameter {}", idx + 1)))
}
