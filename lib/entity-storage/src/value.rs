//! Runtime values, detached records and positional call arguments.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde_json::{Map, Number};

use crate::{Entity, StorageError};

/// A value that can be bound to a statement parameter or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON scalar into a `Value`. Arrays and objects have no
    /// column representation.
    pub(crate) fn from_json(
        value: serde_json::Value,
        context: &str,
    ) -> Result<Self, StorageError> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    i64::try_from(u).map(Value::Integer).map_err(|_| {
                        StorageError::UnsupportedValueKind {
                            context: context.to_string(),
                            kind: "unsigned integer above i64::MAX",
                        }
                    })
                } else {
                    n.as_f64()
                        .map(Value::Real)
                        .ok_or_else(|| non_finite(context))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err(StorageError::UnsupportedValueKind {
                context: context.to_string(),
                kind: "array",
            }),
            serde_json::Value::Object(_) => Err(StorageError::UnsupportedValueKind {
                context: context.to_string(),
                kind: "object",
            }),
        }
    }

    /// Convert into JSON for deserialization. Non-finite reals have no
    /// JSON form.
    pub(crate) fn into_json(self, context: &str) -> Result<serde_json::Value, StorageError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::Number(i.into()),
            Value::Real(f) => Number::from_f64(f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| non_finite(context))?,
            Value::Text(s) => serde_json::Value::String(s),
            Value::Bool(b) => serde_json::Value::Bool(b),
        })
    }

    /// Reject values the store cannot hold faithfully (NaN is stored as NULL).
    pub(crate) fn ensure_bindable(&self, context: &str) -> Result<(), StorageError> {
        match self {
            Value::Real(f) if !f.is_finite() => Err(non_finite(context)),
            _ => Ok(()),
        }
    }
}

fn non_finite(context: &str) -> StorageError {
    StorageError::UnsupportedValueKind {
        context: context.to_string(),
        kind: "non-finite real",
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Real(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A structured record detached from its Rust type.
///
/// Values are keyed by declared field name. Records travel through the
/// dispatcher and session; `from_entity` and `into_entity` cross the serde
/// boundary in each direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity: String,
    pub values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Serialize an entity instance into a record.
    ///
    /// Only declared columns are kept; fields marked `#[column(skip)]` never
    /// reach the record, so reading the type back needs `#[serde(default)]`
    /// on them.
    pub fn from_entity<T: Entity>(item: &T) -> Result<Self, StorageError> {
        let entity = T::entity_name();
        let columns: BTreeSet<String> = T::declaration()
            .fields
            .into_iter()
            .map(|f| f.name)
            .collect();
        let json = serde_json::to_value(item)?;
        let serde_json::Value::Object(obj) = json else {
            return Err(StorageError::UnsupportedValueKind {
                context: entity.to_string(),
                kind: "non-object record",
            });
        };

        let mut values = BTreeMap::new();
        for (key, value) in obj {
            if !columns.contains(&key) {
                continue;
            }
            let context = format!("{entity}.{key}");
            values.insert(key, Value::from_json(value, &context)?);
        }

        Ok(Self {
            entity: entity.to_string(),
            values,
        })
    }

    /// Deserialize the record into a typed value.
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T, StorageError> {
        let obj: Map<String, serde_json::Value> = self
            .values
            .into_iter()
            .map(|(k, v)| {
                let context = format!("{}.{k}", self.entity);
                v.into_json(&context).map(|json| (k, json))
            })
            .collect::<Result<_, StorageError>>()?;
        Ok(serde_json::from_value(serde_json::Value::Object(obj))?)
    }

    /// Value of a field, `Null` when the record does not carry it.
    pub fn get(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }
}

/// A positional argument passed to a data-access operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    /// Expanded into consecutive positional parameters of a literal template.
    List(Vec<Value>),
    Record(Record),
}

impl Argument {
    /// Build a record argument from an entity instance.
    pub fn record<T: Entity>(item: &T) -> Result<Self, StorageError> {
        Record::from_entity(item).map(Argument::Record)
    }

    pub fn list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Argument::List(values.into_iter().map(Into::into).collect())
    }
}

macro_rules! argument_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Argument {
                fn from(v: $ty) -> Self {
                    Argument::Value(v.into())
                }
            }
        )*
    };
}

argument_from!(Value, &str, String, &String, i32, i64, f32, f64, bool);

impl From<Record> for Argument {
    fn from(r: Record) -> Self {
        Argument::Record(r)
    }
}

/// Flatten arguments into positional parameters for a literal template.
pub(crate) fn flatten_params(
    operation: &str,
    args: &[Argument],
) -> Result<Vec<Value>, StorageError> {
    let mut params = Vec::with_capacity(args.len());
    for (idx, arg) in args.iter().enumerate() {
        match arg {
            Argument::Value(v) => params.push(v.clone()),
            Argument::List(values) => params.extend(values.iter().cloned()),
            Argument::Record(_) => {
                return Err(StorageError::UnsupportedValueKind {
                    context: format!("{operation} argument {}", idx + 1),
                    kind: "record",
                });
            }
        }
    }
    Ok(params)
}
