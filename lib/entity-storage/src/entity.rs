//! Entity trait for record types mapped to tables.
//!
//! Add `#[derive(Entity)]` and an `#[entity(...)]` attribute to a
//! serde-enabled struct to generate the implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::{EntityDescriptor, RecordDeclaration, SchemaError};

/// Trait for record types that map onto a table.
///
/// # Example
///
/// ```text
/// #[derive(Entity, Serialize, Deserialize)]
/// #[entity(table = "user", unique(name))]
/// pub struct User {
///     #[column(primary_key, auto_increment)]
///     pub id: i64,
///     pub name: String,
/// }
/// ```
///
/// # Column Naming
///
/// Columns are named after the Rust fields, and record values are read from
/// and written to serde's output under the same names, so serde renames are
/// not supported on entity fields.
///
/// Use `#[column(skip)]` to keep a field out of the table.
pub trait Entity: Serialize + DeserializeOwned {
    /// The record type's name, used to look up its descriptor in a session.
    fn entity_name() -> &'static str;

    /// The raw metadata declared on the type.
    fn declaration() -> RecordDeclaration;

    /// Build the validated descriptor for this type.
    fn descriptor() -> Result<EntityDescriptor, SchemaError> {
        EntityDescriptor::build(&Self::declaration())
    }
}
