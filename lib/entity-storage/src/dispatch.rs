//! Operation dispatch for data-access interfaces.
//!
//! A [`DaoDeclaration`] lists the operations of one data-access interface.
//! [`OperationTable::build`] validates every operation once and binds it to a
//! handler, so a call is a table lookup followed by a session primitive.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::sql::ConflictStrategy;
use crate::value::flatten_params;
use crate::{Argument, Connection, Output, Record, Resolver, ReturnContract, Session, StorageError};

/// Body invoked for operations that carry no capability.
pub type DefaultBody = Arc<dyn Fn(&[Argument]) -> Result<Output, StorageError> + Send + Sync>;

/// The declared role of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Insert {
        strategy: ConflictStrategy,
    },
    /// Update by instance, or by literal template when `sql` is set.
    Update {
        strategy: ConflictStrategy,
        sql: Option<String>,
    },
    /// Delete by instance, or by literal template when `sql` is set.
    Delete {
        sql: Option<String>,
    },
    Query {
        sql: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Query,
    Unannotated,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Query => "query",
            OperationKind::Unannotated => "unannotated",
        };
        f.write_str(name)
    }
}

/// A declared operation before validation.
#[derive(Clone)]
pub struct OperationDeclaration {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub returns: ReturnContract,
    pub default_body: Option<DefaultBody>,
}

impl fmt::Debug for OperationDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDeclaration")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("returns", &self.returns)
            .field("default_body", &self.default_body.is_some())
            .finish()
    }
}

impl OperationDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            returns: ReturnContract::Void,
            default_body: None,
        }
    }

    pub fn insert(name: impl Into<String>) -> Self {
        Self::new(name).capability(Capability::Insert {
            strategy: ConflictStrategy::default(),
        })
    }

    pub fn update(name: impl Into<String>) -> Self {
        Self::new(name).capability(Capability::Update {
            strategy: ConflictStrategy::default(),
            sql: None,
        })
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(name).capability(Capability::Delete { sql: None })
    }

    pub fn delete_where(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(name).capability(Capability::Delete {
            sql: Some(sql.into()),
        })
    }

    pub fn query(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(name).capability(Capability::Query { sql: sql.into() })
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn returns(mut self, returns: ReturnContract) -> Self {
        self.returns = returns;
        self
    }

    pub fn default_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&[Argument]) -> Result<Output, StorageError> + Send + Sync + 'static,
    {
        self.default_body = Some(Arc::new(body));
        self
    }
}

/// The operations of one data-access interface.
#[derive(Debug, Clone)]
pub struct DaoDeclaration {
    pub name: String,
    pub operations: Vec<OperationDeclaration>,
}

impl DaoDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn operation(mut self, operation: OperationDeclaration) -> Self {
        self.operations.push(operation);
        self
    }
}

/// A validated operation: exactly one capability kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub name: String,
    pub kind: OperationKind,
    pub sql: Option<String>,
    pub conflict_strategy: ConflictStrategy,
    pub returns: ReturnContract,
}

impl OperationDescriptor {
    /// Validate a declaration. Zero capabilities without a default body and
    /// multiple capabilities both fail here, before any call is made.
    pub fn resolve(declaration: &OperationDeclaration) -> Result<Self, StorageError> {
        let name = declaration.name.clone();
        let returns = declaration.returns.clone();

        let (kind, sql, conflict_strategy) = match declaration.capabilities.as_slice() {
            [] => {
                if declaration.default_body.is_none() {
                    return Err(StorageError::UnannotatedOperation(name));
                }
                (OperationKind::Unannotated, None, ConflictStrategy::default())
            }
            [Capability::Insert { strategy }] => (OperationKind::Insert, None, *strategy),
            [Capability::Update { strategy, sql }] => (OperationKind::Update, sql.clone(), *strategy),
            [Capability::Delete { sql }] => {
                (OperationKind::Delete, sql.clone(), ConflictStrategy::default())
            }
            [Capability::Query { sql }] => (
                OperationKind::Query,
                Some(sql.clone()),
                ConflictStrategy::default(),
            ),
            many => {
                return Err(StorageError::AmbiguousCapability {
                    operation: name,
                    count: many.len(),
                });
            }
        };

        let supported = match kind {
            OperationKind::Insert => {
                matches!(returns, ReturnContract::Void | ReturnContract::Bool)
            }
            OperationKind::Update | OperationKind::Delete => matches!(
                returns,
                ReturnContract::Void
                    | ReturnContract::Bool
                    | ReturnContract::Int
                    | ReturnContract::Long
            ),
            OperationKind::Query | OperationKind::Unannotated => true,
        };
        if !supported {
            return Err(StorageError::UnsupportedReturnContract {
                operation: name,
                contract: returns.to_string(),
            });
        }

        Ok(Self {
            name,
            kind,
            sql,
            conflict_strategy,
            returns,
        })
    }
}

/// What a call does, fixed when the table is built.
enum Handler {
    Insert(ConflictStrategy),
    UpdateInstance(ConflictStrategy),
    DeleteInstance,
    /// Literal mutating template (Update/Delete with SQL, or a void Query).
    Literal(String),
    Query { sql: String, resolver: Resolver },
    Default(DefaultBody),
}

struct Operation {
    descriptor: OperationDescriptor,
    handler: Handler,
}

/// Dispatch table for one data-access interface.
pub struct OperationTable {
    name: String,
    operations: HashMap<String, Operation>,
}

impl OperationTable {
    /// Validate every declared operation and bind it to a handler.
    pub fn build<C: Connection>(
        declaration: &DaoDeclaration,
        session: &Session<C>,
    ) -> Result<Self, StorageError> {
        let mut operations = HashMap::with_capacity(declaration.operations.len());

        for op in &declaration.operations {
            if operations.contains_key(&op.name) {
                return Err(StorageError::DuplicateOperation(op.name.clone()));
            }
            let descriptor = OperationDescriptor::resolve(op)?;
            let handler = match (descriptor.kind, descriptor.sql.clone()) {
                (OperationKind::Insert, _) => Handler::Insert(descriptor.conflict_strategy),
                (OperationKind::Update, None) => {
                    Handler::UpdateInstance(descriptor.conflict_strategy)
                }
                (OperationKind::Delete, None) => Handler::DeleteInstance,
                (OperationKind::Update | OperationKind::Delete, Some(sql)) => Handler::Literal(sql),
                (OperationKind::Query, sql) => {
                    let sql = sql.unwrap_or_default();
                    match Resolver::for_contract(&descriptor.returns, |e| session.descriptor(e))? {
                        Some(resolver) => Handler::Query { sql, resolver },
                        None => Handler::Literal(sql),
                    }
                }
                (OperationKind::Unannotated, _) => match &op.default_body {
                    Some(body) => Handler::Default(Arc::clone(body)),
                    None => return Err(StorageError::UnannotatedOperation(op.name.clone())),
                },
            };

            debug!(dao = %declaration.name, operation = %descriptor.name, kind = %descriptor.kind, "bound operation");
            operations.insert(descriptor.name.clone(), Operation { descriptor, handler });
        }

        Ok(Self {
            name: declaration.name.clone(),
            operations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self, operation: &str) -> Option<&OperationDescriptor> {
        self.operations.get(operation).map(|op| &op.descriptor)
    }
}

/// A live data-access interface bound to a session.
pub struct Dao<'s, C: Connection> {
    session: &'s Session<C>,
    table: &'s OperationTable,
}

impl<'s, C: Connection> Dao<'s, C> {
    pub fn new(session: &'s Session<C>, table: &'s OperationTable) -> Self {
        Self { session, table }
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Invoke a declared operation with positional arguments.
    pub fn call(&self, operation: &str, args: &[Argument]) -> Result<Output, StorageError> {
        let op = self
            .table
            .operations
            .get(operation)
            .ok_or_else(|| StorageError::UnknownOperation(operation.to_string()))?;
        let descriptor = &op.descriptor;
        debug!(dao = %self.table.name, operation, kind = %descriptor.kind, "dispatching");

        match &op.handler {
            Handler::Insert(strategy) => {
                let record = instance(descriptor, args)?;
                let inserted = self.session.exec_insert(record, *strategy)?;
                Ok(coerce_affirmed(inserted, &descriptor.returns))
            }
            Handler::UpdateInstance(strategy) => {
                let record = instance(descriptor, args)?;
                let rows = self.session.exec_update(record, *strategy)?;
                coerce_rows(rows, &descriptor.returns)
            }
            Handler::DeleteInstance => {
                let record = instance(descriptor, args)?;
                let rows = self.session.exec_delete(record)?;
                coerce_rows(rows, &descriptor.returns)
            }
            Handler::Literal(sql) => {
                let params = flatten_params(&descriptor.name, args)?;
                let rows = self.session.exec_literal(sql, &params)?;
                coerce_rows(rows, &descriptor.returns)
            }
            Handler::Query { sql, resolver } => {
                let params = flatten_params(&descriptor.name, args)?;
                self.session.query(sql, resolver, &params)
            }
            Handler::Default(body) => body(args),
        }
    }
}

/// The single record argument of an instance operation.
fn instance<'a>(
    descriptor: &OperationDescriptor,
    args: &'a [Argument],
) -> Result<&'a Record, StorageError> {
    match args {
        [Argument::Record(record)] => Ok(record),
        _ => Err(StorageError::InvalidArguments {
            operation: descriptor.name.clone(),
            reason: format!(
                "{} by instance takes exactly one record, got {} argument(s)",
                descriptor.kind,
                args.len()
            ),
        }),
    }
}

fn coerce_affirmed(affirmed: bool, returns: &ReturnContract) -> Output {
    match returns {
        ReturnContract::Bool => Output::Bool(affirmed),
        _ => Output::Unit,
    }
}

/// Coerce a rows-affected count to the declared contract.
fn coerce_rows(rows: usize, returns: &ReturnContract) -> Result<Output, StorageError> {
    let out_of_range = |expected| StorageError::ReturnMismatch {
        expected,
        actual: format!("{rows} rows affected"),
    };
    Ok(match returns {
        ReturnContract::Bool => Output::Bool(rows > 0),
        ReturnContract::Int => {
            Output::Int(i32::try_from(rows).map_err(|_| out_of_range("integer"))?)
        }
        ReturnContract::Long => Output::Long(i64::try_from(rows).map_err(|_| out_of_range("long"))?),
        _ => Output::Unit,
    })
}
