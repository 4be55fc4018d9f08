//! The root of a declared database: one session, many data-access interfaces.

use once_cell::unsync::OnceCell;
use tracing::{debug, info};

use crate::{
    Connection, Dao, DaoDeclaration, Entity, EntityDescriptor, OperationTable, RecordDeclaration,
    Session, SessionConfig, StorageError,
};

/// A database interface: its entity set and its accessors.
#[derive(Debug, Clone)]
pub struct DatabaseDeclaration {
    pub name: String,
    pub version: u32,
    /// Entities in the order their tables are created.
    pub entities: Vec<RecordDeclaration>,
    pub accessors: Vec<DaoDeclaration>,
}

impl DatabaseDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            entities: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn entity<T: Entity>(self) -> Self {
        self.record(T::declaration())
    }

    pub fn record(mut self, declaration: RecordDeclaration) -> Self {
        self.entities.push(declaration);
        self
    }

    pub fn accessor(mut self, accessor: DaoDeclaration) -> Self {
        self.accessors.push(accessor);
        self
    }
}

struct Accessor {
    declaration: DaoDeclaration,
    table: OnceCell<OperationTable>,
}

/// An open database. Owns its [`Session`]; every [`Dao`] borrows from it.
pub struct Database<C: Connection> {
    name: String,
    version: u32,
    session: Session<C>,
    accessors: Vec<Accessor>,
}

impl<C: Connection> Database<C> {
    /// Build every entity descriptor, then open the session and create the
    /// tables. Accessors are validated on first use.
    pub fn open(
        connection: C,
        declaration: DatabaseDeclaration,
        config: &SessionConfig,
    ) -> Result<Self, StorageError> {
        let DatabaseDeclaration {
            name,
            version,
            entities,
            accessors,
        } = declaration;

        let descriptors = entities
            .iter()
            .map(EntityDescriptor::build)
            .collect::<Result<Vec<_>, _>>()?;

        info!(database = %name, version, entities = descriptors.len(), "opening database");
        let session = Session::new(connection, descriptors, config)?;

        Ok(Self {
            name,
            version,
            session,
            accessors: accessors
                .into_iter()
                .map(|declaration| Accessor {
                    declaration,
                    table: OnceCell::new(),
                })
                .collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// The data-access interface named `name`, building its dispatch table
    /// on first access.
    pub fn dao(&self, name: &str) -> Result<Dao<'_, C>, StorageError> {
        let accessor = self
            .accessors
            .iter()
            .find(|a| a.declaration.name == name)
            .ok_or_else(|| StorageError::UnknownAccessor(name.to_string()))?;

        let table = accessor.table.get_or_try_init(|| {
            debug!(database = %self.name, accessor = name, "building dispatch table");
            OperationTable::build(&accessor.declaration, &self.session)
        })?;
        Ok(Dao::new(&self.session, table))
    }

    pub fn close(mut self) -> Result<(), StorageError> {
        info!(database = %self.name, "closing database");
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::RecordingConnection;
    use crate::{
        Argument, FieldDeclaration, OperationDeclaration, Output, Record, ReturnContract,
        SchemaError,
    };

    fn user() -> RecordDeclaration {
        RecordDeclaration::new("User")
            .entity(None)
            .unique(["name"])
            .field(
                FieldDeclaration::new("id", "i64")
                    .primary_key(true)
                    .auto_increment(true),
            )
            .field(FieldDeclaration::new("name", "String"))
    }

    fn app() -> DatabaseDeclaration {
        DatabaseDeclaration::new("AppDatabase")
            .record(user())
            .accessor(
                DaoDeclaration::new("UserDao")
                    .operation(OperationDeclaration::insert("add").returns(ReturnContract::Bool))
                    .operation(
                        OperationDeclaration::query("count", "SELECT COUNT(*) FROM user")
                            .returns(ReturnContract::Int),
                    ),
            )
            .accessor(
                DaoDeclaration::new("BrokenDao").operation(OperationDeclaration::new("nothing")),
            )
    }

    #[test]
    fn open_creates_tables_before_any_accessor_is_used() {
        let conn = RecordingConnection::default();
        let db = Database::open(conn.clone(), app(), &SessionConfig::default()).unwrap();
        assert_eq!(db.name(), "AppDatabase");
        assert_eq!(db.version(), 1);
        assert_eq!(conn.calls(), vec!["timeout", "execute"]);
        assert_eq!(db.session().descriptors().len(), 1);
    }

    #[test]
    fn record_without_entity_metadata_aborts_open() {
        let conn = RecordingConnection::default();
        let decl = DatabaseDeclaration::new("Bad")
            .record(RecordDeclaration::new("Plain").field(FieldDeclaration::new("x", "i32")));
        let err = Database::open(conn.clone(), decl, &SessionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StorageError::Schema(SchemaError::MissingEntityMetadata(name)) if name == "Plain"
        ));
        assert!(conn.calls().is_empty());
    }

    #[test]
    fn accessors_are_validated_lazily() {
        let conn = RecordingConnection::default();
        let db = Database::open(conn, app(), &SessionConfig::default()).unwrap();

        assert!(matches!(
            db.dao("BrokenDao").err().unwrap(),
            StorageError::UnannotatedOperation(_)
        ));
        assert!(db.dao("UserDao").is_ok());
    }

    #[test]
    fn dao_dispatches_through_the_shared_session() {
        let conn = RecordingConnection::default();
        let db = Database::open(conn.clone(), app(), &SessionConfig::default()).unwrap();
        *conn.query_output.borrow_mut() = Some(Output::Int(4));

        let users = db.dao("UserDao").unwrap();
        let added = users
            .call(
                "add",
                &[Argument::Record(Record::new("User").with_value("name", "john"))],
            )
            .unwrap();
        assert_eq!(added, Output::Bool(true));

        let again = db.dao("UserDao").unwrap();
        assert_eq!(again.call("count", &[]).unwrap(), Output::Int(4));
        assert_eq!(again.name(), "UserDao");
    }

    #[test]
    fn unknown_accessor_is_rejected() {
        let conn = RecordingConnection::default();
        let db = Database::open(conn, app(), &SessionConfig::default()).unwrap();
        assert!(matches!(
            db.dao("Nope").err().unwrap(),
            StorageError::UnknownAccessor(name) if name == "Nope"
        ));
    }

    #[test]
    fn close_releases_the_connection() {
        let conn = RecordingConnection::default();
        let db = Database::open(conn.clone(), app(), &SessionConfig::default()).unwrap();
        db.close().unwrap();
        assert_eq!(conn.calls().last().map(String::as_str), Some("close"));
    }
}
