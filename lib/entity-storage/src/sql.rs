//! SQL statement generation from entity descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EntityDescriptor, FieldDescriptor, Record, StorageError, Value};

/// Behavior on constraint violation during insert/update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictStrategy {
    #[default]
    Abort,
    Replace,
    Ignore,
    Fail,
    Rollback,
}

impl ConflictStrategy {
    pub fn as_sql(self) -> &'static str {
        match self {
            ConflictStrategy::Abort => "ABORT",
            ConflictStrategy::Replace => "REPLACE",
            ConflictStrategy::Ignore => "IGNORE",
            ConflictStrategy::Fail => "FAIL",
            ConflictStrategy::Rollback => "ROLLBACK",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Statement text together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn assignments<'a>(fields: impl Iterator<Item = &'a FieldDescriptor>, separator: &str) -> String {
    fields
        .map(|f| format!("{} = ?", quote(&f.name)))
        .collect::<Vec<_>>()
        .join(separator)
}

fn bind<'a>(record: &Record, fields: impl Iterator<Item = &'a FieldDescriptor>) -> Vec<Value> {
    fields.map(|f| record.get(&f.name)).collect()
}

fn key_fields(desc: &EntityDescriptor) -> Result<Vec<&FieldDescriptor>, StorageError> {
    let keys: Vec<_> = desc.primary_key_fields().collect();
    if keys.is_empty() {
        return Err(StorageError::MissingPrimaryKey(desc.name.clone()));
    }
    Ok(keys)
}

/// `CREATE TABLE IF NOT EXISTS` for an entity.
///
/// A single key column carries its constraint inline; a composite key is
/// declared once as a table constraint over the key columns in sorted order.
pub fn create_table_sql(desc: &EntityDescriptor) -> String {
    let keys: Vec<&FieldDescriptor> = desc.primary_key_fields().collect();
    let composite = keys.len() > 1;

    let mut columns: Vec<String> = desc
        .fields
        .values()
        .map(|f| {
            let mut column = format!("{} {}", quote(&f.name), f.kind.column_type());
            if f.primary_key && !composite {
                column.push_str(" PRIMARY KEY");
                if f.auto_increment {
                    column.push_str(" AUTOINCREMENT");
                }
            }
            if f.primary_key {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();

    if composite {
        let cols: Vec<String> = keys.iter().map(|f| quote(&f.name)).collect();
        columns.push(format!("PRIMARY KEY({})", cols.join(", ")));
    }
    for group in &desc.unique_groups {
        let cols: Vec<String> = group.iter().map(|c| quote(c)).collect();
        columns.push(format!("UNIQUE({})", cols.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(&desc.table_name),
        columns.join(", ")
    )
}

/// INSERT for an instance; auto-increment columns are left to the store.
pub fn insert(
    desc: &EntityDescriptor,
    record: &Record,
    strategy: ConflictStrategy,
) -> Statement {
    let fields: Vec<_> = desc.fields.values().filter(|f| !f.auto_increment).collect();
    let columns: Vec<String> = fields.iter().map(|f| quote(&f.name)).collect();
    let placeholders = vec!["?"; fields.len()].join(", ");

    Statement {
        sql: format!(
            "INSERT OR {} INTO {} ({}) VALUES ({})",
            strategy,
            quote(&desc.table_name),
            columns.join(", "),
            placeholders
        ),
        params: bind(record, fields.into_iter()),
    }
}

/// DELETE for an instance, keyed by its primary-key values.
pub fn delete(desc: &EntityDescriptor, record: &Record) -> Result<Statement, StorageError> {
    let keys = key_fields(desc)?;

    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            quote(&desc.table_name),
            assignments(keys.iter().copied(), " AND ")
        ),
        params: bind(record, keys.into_iter()),
    })
}

/// UPDATE for an instance. Parameters are the non-key values followed by the
/// key values, matching the SET and WHERE clause order.
pub fn update(
    desc: &EntityDescriptor,
    record: &Record,
    strategy: ConflictStrategy,
) -> Result<Statement, StorageError> {
    let keys = key_fields(desc)?;
    let values: Vec<_> = desc.value_fields().collect();
    if values.is_empty() {
        return Err(StorageError::NothingToUpdate(desc.name.clone()));
    }

    let sql = format!(
        "UPDATE OR {} {} SET {} WHERE {}",
        strategy,
        quote(&desc.table_name),
        assignments(values.iter().copied(), ", "),
        assignments(keys.iter().copied(), " AND ")
    );
    let params = bind(record, values.into_iter().chain(keys));

    Ok(Statement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDeclaration, RecordDeclaration};

    fn user() -> EntityDescriptor {
        EntityDescriptor::build(
            &RecordDeclaration::new("User")
                .entity(None)
                .unique(["name"])
                .field(
                    FieldDeclaration::new("id", "i64")
                        .primary_key(true)
                        .auto_increment(true),
                )
                .field(FieldDeclaration::new("name", "String")),
        )
        .unwrap()
    }

    fn shipment() -> EntityDescriptor {
        EntityDescriptor::build(
            &RecordDeclaration::new("Shipment")
                .entity(Some("shipment"))
                .unique(["carrier", "tracking"])
                .field(FieldDeclaration::new("weight", "f64"))
                .field(FieldDeclaration::new("tracking", "String"))
                .field(FieldDeclaration::new("uuid", "i64").primary_key(true))
                .field(FieldDeclaration::new("carrier", "String")),
        )
        .unwrap()
    }

    fn keyless() -> EntityDescriptor {
        EntityDescriptor::build(
            &RecordDeclaration::new("Log")
                .entity(None)
                .field(FieldDeclaration::new("line", "String")),
        )
        .unwrap()
    }

    #[test]
    fn create_table_lists_sorted_columns_and_key_clauses() {
        assert_eq!(
            create_table_sql(&user()),
            "CREATE TABLE IF NOT EXISTS `user` (`id` INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, `name` TEXT, UNIQUE(`name`))"
        );
    }

    #[test]
    fn composite_unique_group_yields_one_clause_in_declared_order() {
        let sql = create_table_sql(&shipment());
        assert_eq!(sql.matches("UNIQUE(").count(), 1);
        assert!(sql.ends_with("UNIQUE(`carrier`, `tracking`))"));
        assert!(sql.contains(
            "(`carrier` TEXT, `tracking` TEXT, `uuid` INTEGER PRIMARY KEY NOT NULL, `weight` REAL,"
        ));
    }

    #[test]
    fn insert_skips_auto_increment_columns() {
        let record = Record::new("User").with_value("id", 0).with_value("name", "john");
        let stmt = insert(&user(), &record, ConflictStrategy::Abort);
        assert_eq!(stmt.sql, "INSERT OR ABORT INTO `user` (`name`) VALUES (?)");
        assert_eq!(stmt.params, vec![Value::Text("john".to_string())]);
    }

    #[test]
    fn insert_binds_in_column_order_with_missing_values_as_null() {
        let record = Record::new("Shipment")
            .with_value("uuid", 7)
            .with_value("carrier", "acme")
            .with_value("weight", 1.5);
        let stmt = insert(&shipment(), &record, ConflictStrategy::Replace);
        assert_eq!(
            stmt.sql,
            "INSERT OR REPLACE INTO `shipment` (`carrier`, `tracking`, `uuid`, `weight`) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Text("acme".to_string()),
                Value::Null,
                Value::Integer(7),
                Value::Real(1.5),
            ]
        );
    }

    #[test]
    fn update_binds_values_then_keys() {
        let record = Record::new("Shipment")
            .with_value("uuid", 42)
            .with_value("carrier", "acme")
            .with_value("tracking", "T-1")
            .with_value("weight", 2.0);
        let stmt = update(&shipment(), &record, ConflictStrategy::Abort).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE OR ABORT `shipment` SET `carrier` = ?, `tracking` = ?, `weight` = ? WHERE `uuid` = ?"
        );
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[3], Value::Integer(42));
        assert_eq!(stmt.params[0], Value::Text("acme".to_string()));
    }

    #[test]
    fn composite_keys_join_with_and() {
        let desc = EntityDescriptor::build(
            &RecordDeclaration::new("Membership")
                .entity(None)
                .field(FieldDeclaration::new("user", "i64").primary_key(true))
                .field(FieldDeclaration::new("group", "i64").primary_key(true))
                .field(FieldDeclaration::new("role", "String")),
        )
        .unwrap();
        let record = Record::new("Membership")
            .with_value("user", 1)
            .with_value("group", 2)
            .with_value("role", "admin");

        let stmt = delete(&desc, &record).unwrap();
        assert_eq!(
            stmt.sql,
            "DELETE FROM `membership` WHERE `group` = ? AND `user` = ?"
        );
        assert_eq!(stmt.params, vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn composite_key_is_declared_once_as_a_table_constraint() {
        let desc = EntityDescriptor::build(
            &RecordDeclaration::new("Membership")
                .entity(None)
                .unique(["role"])
                .field(FieldDeclaration::new("user", "i64").primary_key(true))
                .field(FieldDeclaration::new("group", "i64").primary_key(true))
                .field(FieldDeclaration::new("role", "String")),
        )
        .unwrap();
        let sql = create_table_sql(&desc);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `membership` (`group` INTEGER NOT NULL, `role` TEXT, `user` INTEGER NOT NULL, PRIMARY KEY(`group`, `user`), UNIQUE(`role`))"
        );
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn delete_and_update_require_a_primary_key() {
        let record = Record::new("Log").with_value("line", "x");
        assert!(matches!(
            delete(&keyless(), &record),
            Err(StorageError::MissingPrimaryKey(name)) if name == "Log"
        ));
        assert!(matches!(
            update(&keyless(), &record, ConflictStrategy::Abort),
            Err(StorageError::MissingPrimaryKey(_))
        ));
    }

    #[test]
    fn update_without_value_columns_is_rejected() {
        let desc = EntityDescriptor::build(
            &RecordDeclaration::new("Tag")
                .entity(None)
                .field(FieldDeclaration::new("name", "String").primary_key(true)),
        )
        .unwrap();
        let record = Record::new("Tag").with_value("name", "rust");
        assert!(matches!(
            update(&desc, &record, ConflictStrategy::Abort),
            Err(StorageError::NothingToUpdate(_))
        ));
    }
}
