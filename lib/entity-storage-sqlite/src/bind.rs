//! Conversion between entity-storage values and SQLite values.

use entity_storage::{StorageError, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Convert a parameter for binding. Booleans are stored as 0/1.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(n) => SqlValue::Integer(*n),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}

/// Convert a column value read from a row.
pub(crate) fn from_sql(value: ValueRef<'_>, column: &str) -> Result<Value, StorageError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(n) => Ok(Value::Integer(n)),
        ValueRef::Real(f) => Ok(Value::Real(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| StorageError::StorageError(format!("column {column}: {e}"))),
        ValueRef::Blob(_) => Err(StorageError::UnsupportedValueKind {
            context: format!("column {column}"),
            kind: "blob",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(to_sql(&Value::Bool(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&Value::Bool(false)), SqlValue::Integer(0));
        assert_eq!(to_sql(&Value::Null), SqlValue::Null);
    }

    #[test]
    fn text_columns_read_as_text() {
        assert_eq!(
            from_sql(ValueRef::Text(b"john"), "name").unwrap(),
            Value::Text("john".to_string())
        );
    }

    #[test]
    fn blob_columns_are_unsupported() {
        assert!(matches!(
            from_sql(ValueRef::Blob(&[1, 2]), "payload"),
            Err(StorageError::UnsupportedValueKind { kind: "blob", .. })
        ));
    }
}
