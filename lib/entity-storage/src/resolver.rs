//! Result resolvers: turn a row cursor into the value an operation returns.
//!
//! A [`Resolver`] is chosen once per operation from its [`ReturnContract`]
//! and then reused for every call. Every resolver drains the cursor before
//! returning, so the backend may release the statement right after.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::{EntityDescriptor, Record, StorageError, Value, ValueKind};

/// Forward-only access to the rows of an executed query.
pub trait RowCursor {
    /// Column names in result order.
    fn columns(&self) -> &[String];

    /// Advance to the next row, `None` once the result is exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, StorageError>;
}

/// The declared return type of a data-access operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnContract {
    Void,
    Bool,
    Int,
    Long,
    Text,
    /// A single record; `optional` turns "no rows" into `None`.
    Record { entity: String, optional: bool },
    RecordList { entity: String },
    ScalarList(ValueKind),
}

impl ReturnContract {
    pub fn record(entity: impl Into<String>) -> Self {
        ReturnContract::Record {
            entity: entity.into(),
            optional: false,
        }
    }

    pub fn optional_record(entity: impl Into<String>) -> Self {
        ReturnContract::Record {
            entity: entity.into(),
            optional: true,
        }
    }

    pub fn record_list(entity: impl Into<String>) -> Self {
        ReturnContract::RecordList {
            entity: entity.into(),
        }
    }
}

impl fmt::Display for ReturnContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnContract::Void => f.write_str("void"),
            ReturnContract::Bool => f.write_str("boolean"),
            ReturnContract::Int => f.write_str("integer"),
            ReturnContract::Long => f.write_str("long"),
            ReturnContract::Text => f.write_str("string"),
            ReturnContract::Record {
                entity,
                optional: false,
            } => write!(f, "{entity}"),
            ReturnContract::Record {
                entity,
                optional: true,
            } => write!(f, "Option<{entity}>"),
            ReturnContract::RecordList { entity } => write!(f, "Vec<{entity}>"),
            ReturnContract::ScalarList(kind) => write!(f, "Vec<{kind:?}>"),
        }
    }
}

/// The value produced by a data-access operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Unit,
    Bool(bool),
    Int(i32),
    Long(i64),
    Text(String),
    Record(Option<Record>),
    Records(Vec<Record>),
    Scalars(Vec<Value>),
}

impl Output {
    fn variant(&self) -> String {
        match self {
            Output::Unit => "unit".to_string(),
            Output::Bool(_) => "boolean".to_string(),
            Output::Int(_) => "integer".to_string(),
            Output::Long(_) => "long".to_string(),
            Output::Text(_) => "string".to_string(),
            Output::Record(_) => "record".to_string(),
            Output::Records(_) => "record list".to_string(),
            Output::Scalars(_) => "scalar list".to_string(),
        }
    }

    fn mismatch(self, expected: &'static str) -> StorageError {
        StorageError::ReturnMismatch {
            expected,
            actual: self.variant(),
        }
    }

    pub fn into_unit(self) -> Result<(), StorageError> {
        match self {
            Output::Unit => Ok(()),
            other => Err(other.mismatch("unit")),
        }
    }

    pub fn into_bool(self) -> Result<bool, StorageError> {
        match self {
            Output::Bool(b) => Ok(b),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn into_int(self) -> Result<i32, StorageError> {
        match self {
            Output::Int(n) => Ok(n),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn into_long(self) -> Result<i64, StorageError> {
        match self {
            Output::Long(n) => Ok(n),
            other => Err(other.mismatch("long")),
        }
    }

    pub fn into_text(self) -> Result<String, StorageError> {
        match self {
            Output::Text(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T, StorageError> {
        self.into_optional_entity()?.ok_or(StorageError::NoSuchRow)
    }

    pub fn into_optional_entity<T: DeserializeOwned>(self) -> Result<Option<T>, StorageError> {
        match self {
            Output::Record(record) => record.map(Record::into_entity).transpose(),
            other => Err(other.mismatch("record")),
        }
    }

    pub fn into_entities<T: DeserializeOwned>(self) -> Result<Vec<T>, StorageError> {
        match self {
            Output::Records(records) => records.into_iter().map(Record::into_entity).collect(),
            other => Err(other.mismatch("record list")),
        }
    }

    pub fn into_scalars<T: DeserializeOwned>(self) -> Result<Vec<T>, StorageError> {
        match self {
            Output::Scalars(values) => values
                .into_iter()
                .map(|v| {
                    let json = v.into_json("scalar list")?;
                    serde_json::from_value(json).map_err(StorageError::from)
                })
                .collect(),
            other => Err(other.mismatch("scalar list")),
        }
    }
}

/// Strategy converting a cursor into an [`Output`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolver {
    Bool,
    Int,
    Long,
    Text,
    Record {
        descriptor: EntityDescriptor,
        optional: bool,
    },
    RecordList(EntityDescriptor),
    ScalarList(ValueKind),
}

impl Resolver {
    /// Pick the resolver for a query contract. `lookup` resolves entity
    /// names to descriptors. Returns `None` for `Void`, which has nothing to
    /// resolve.
    pub fn for_contract<'a>(
        contract: &ReturnContract,
        lookup: impl Fn(&str) -> Result<&'a EntityDescriptor, StorageError>,
    ) -> Result<Option<Self>, StorageError> {
        let resolver = match contract {
            ReturnContract::Void => return Ok(None),
            ReturnContract::Bool => Resolver::Bool,
            ReturnContract::Int => Resolver::Int,
            ReturnContract::Long => Resolver::Long,
            ReturnContract::Text => Resolver::Text,
            ReturnContract::Record { entity, optional } => Resolver::Record {
                descriptor: lookup(entity)?.clone(),
                optional: *optional,
            },
            ReturnContract::RecordList { entity } => {
                Resolver::RecordList(lookup(entity)?.clone())
            }
            ReturnContract::ScalarList(kind) => Resolver::ScalarList(*kind),
        };
        Ok(Some(resolver))
    }

    pub fn resolve(&self, cursor: &mut dyn RowCursor) -> Result<Output, StorageError> {
        match self {
            Resolver::Bool => {
                let first = first_column(cursor)?;
                Ok(Output::Bool(to_bool(&first)))
            }
            Resolver::Int => {
                let n = to_long(&first_column(cursor)?)?;
                let n = i32::try_from(n).map_err(|_| StorageError::ReturnMismatch {
                    expected: "integer",
                    actual: format!("out-of-range value {n}"),
                })?;
                Ok(Output::Int(n))
            }
            Resolver::Long => Ok(Output::Long(to_long(&first_column(cursor)?)?)),
            Resolver::Text => Ok(Output::Text(to_text(first_column(cursor)?))),
            Resolver::Record {
                descriptor,
                optional,
            } => {
                let columns = cursor.columns().to_vec();
                let first = cursor.next_row()?;
                drain(cursor)?;
                match first {
                    Some(row) => Ok(Output::Record(Some(map_row(descriptor, &columns, row)?))),
                    None if *optional => Ok(Output::Record(None)),
                    None => Err(StorageError::NoSuchRow),
                }
            }
            Resolver::RecordList(descriptor) => {
                let columns = cursor.columns().to_vec();
                let mut records = Vec::new();
                while let Some(row) = cursor.next_row()? {
                    records.push(map_row(descriptor, &columns, row)?);
                }
                Ok(Output::Records(records))
            }
            Resolver::ScalarList(kind) => {
                let mut values = Vec::new();
                while let Some(row) = cursor.next_row()? {
                    let value = row.into_iter().next().unwrap_or(Value::Null);
                    values.push(coerce(value, *kind)?);
                }
                Ok(Output::Scalars(values))
            }
        }
    }
}

fn drain(cursor: &mut dyn RowCursor) -> Result<(), StorageError> {
    while cursor.next_row()?.is_some() {}
    Ok(())
}

/// Column 1 of the first row, `Null` for an empty result.
fn first_column(cursor: &mut dyn RowCursor) -> Result<Value, StorageError> {
    let value = cursor
        .next_row()?
        .and_then(|row| row.into_iter().next())
        .unwrap_or(Value::Null);
    drain(cursor)?;
    Ok(value)
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Integer(n) => *n != 0,
        Value::Real(f) => *f != 0.0,
        Value::Text(s) => s == "1" || s.eq_ignore_ascii_case("true"),
    }
}

fn to_long(value: &Value) -> Result<i64, StorageError> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Integer(n) => Ok(*n),
        Value::Real(f) => Ok(f.trunc() as i64),
        Value::Text(s) => s.trim().parse().map_err(|_| StorageError::ReturnMismatch {
            expected: "integer",
            actual: format!("text {s:?}"),
        }),
    }
}

fn to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s,
        Value::Integer(n) => n.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

/// Convert a stored value to the representation of a declared kind.
fn coerce(value: Value, kind: ValueKind) -> Result<Value, StorageError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(match kind {
        ValueKind::Integer | ValueKind::Long => Value::Integer(to_long(&value)?),
        ValueKind::Float | ValueKind::Double => match value {
            Value::Integer(n) => Value::Real(n as f64),
            Value::Bool(b) => Value::Real(if b { 1.0 } else { 0.0 }),
            Value::Text(s) => {
                Value::Real(s.trim().parse().map_err(|_| StorageError::ReturnMismatch {
                    expected: "real",
                    actual: format!("text {s:?}"),
                })?)
            }
            other => other,
        },
        ValueKind::Text => Value::Text(to_text(value)),
        ValueKind::Boolean => Value::Bool(to_bool(&value)),
    })
}

/// Map one row onto a record by matching column names to field names.
fn map_row(
    descriptor: &EntityDescriptor,
    columns: &[String],
    row: Vec<Value>,
) -> Result<Record, StorageError> {
    let mut record = Record::new(descriptor.name.clone());
    for (column, value) in columns.iter().zip(row) {
        if let Some(field) = descriptor.field_for_column(column) {
            record
                .values
                .insert(field.name.clone(), coerce(value, field.kind)?);
        }
    }
    Ok(record)
}
