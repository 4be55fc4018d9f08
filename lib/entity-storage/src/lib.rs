//! Entity Storage - declarative record mapping over an embedded SQL store.
//!
//! Record types declare their table shape with `#[derive(Entity)]`; data-access
//! interfaces declare their operations as [`DaoDeclaration`]s. A [`Database`]
//! materializes the tables through one [`Session`] and dispatches every call
//! to generated or literal SQL.
//!
//! # Core Concepts
//!
//! - **Descriptor**: the validated column layout of an entity
//!   ([`EntityDescriptor`]), built once from its declaration.
//! - **Session**: one connection plus the entity set it serves. Every
//!   mutation runs in its own transaction.
//! - **Dispatch table**: each data-access operation is validated once and
//!   bound to a handler ([`OperationTable`]).
//!
//! # Backends
//!
//! Backends implement [`Connection`] and [`RowCursor`]. The sqlite backend
//! lives in `entity-storage-sqlite`.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod config;
mod database;
mod descriptor;
mod dispatch;
mod entity;
mod error;
mod resolver;
mod session;
pub mod sql;
mod value;

pub use config::{
    ConnectionConfig, DEFAULT_DATABASE_PATH, DEFAULT_STATEMENT_TIMEOUT_MS, SessionConfig,
};
pub use database::{Database, DatabaseDeclaration};
pub use descriptor::{
    EntityAttributes, EntityDescriptor, FieldDeclaration, FieldDescriptor, RecordDeclaration,
    ValueKind,
};
pub use dispatch::{
    Capability, Dao, DaoDeclaration, DefaultBody, OperationDeclaration, OperationDescriptor,
    OperationKind, OperationTable,
};
pub use entity::Entity;
pub use error::{SchemaError, StorageError};
pub use resolver::{Output, Resolver, ReturnContract, RowCursor};
pub use session::{Connection, Session};
pub use sql::{ConflictStrategy, Statement};
pub use value::{Argument, Record, Value};

// Re-export derive macro
pub use entity_storage_derive::Entity;
