//! Record declarations and the entity descriptors built from them.
//!
//! A [`RecordDeclaration`] is the raw metadata attached to a record type
//! (normally produced by `#[derive(Entity)]`). [`EntityDescriptor::build`]
//! validates it and resolves every field to a [`ValueKind`]. Nothing here
//! inspects live values; the descriptor is all the SQL generator and the
//! resolvers ever see.

use std::collections::BTreeMap;

use crate::SchemaError;

/// Semantic kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Long,
    Float,
    Double,
    Text,
    Boolean,
}

impl ValueKind {
    /// Resolve a declared Rust type name. `Option<T>` resolves as `T`.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let compact: String = type_name.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = compact
            .strip_prefix("Option<")
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(&compact);
        let inner = inner.rsplit("::").next().unwrap_or(inner);

        match inner {
            "i8" | "i16" | "i32" | "u8" | "u16" => Some(ValueKind::Integer),
            "i64" | "u32" | "isize" => Some(ValueKind::Long),
            "f32" => Some(ValueKind::Float),
            "f64" => Some(ValueKind::Double),
            "String" | "str" => Some(ValueKind::Text),
            "bool" => Some(ValueKind::Boolean),
            _ => None,
        }
    }

    /// The storage column type for this kind.
    pub fn column_type(self) -> &'static str {
        match self {
            ValueKind::Integer | ValueKind::Long => "INTEGER",
            ValueKind::Float | ValueKind::Double => "REAL",
            ValueKind::Text => "TEXT",
            ValueKind::Boolean => "BOOLEAN",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Long)
    }
}

/// Table-level metadata declared on a record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAttributes {
    /// Explicit table name; the lower-cased type name is used when absent.
    pub table: Option<String>,
    pub unique_groups: Vec<Vec<String>>,
}

/// A declared field before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub name: String,
    pub type_name: String,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }
}

/// Everything declared on a record type.
///
/// `entity` is `None` when the type carries no entity metadata at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDeclaration {
    pub type_name: String,
    pub entity: Option<EntityAttributes>,
    pub fields: Vec<FieldDeclaration>,
}

impl RecordDeclaration {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            entity: None,
            fields: Vec::new(),
        }
    }

    /// Mark the declaration as an entity, optionally naming its table.
    pub fn entity(mut self, table: Option<&str>) -> Self {
        let attrs = self.entity.get_or_insert_with(EntityAttributes::default);
        attrs.table = table.map(str::to_string);
        self
    }

    /// Add a unique group. Marks the declaration as an entity.
    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity
            .get_or_insert_with(EntityAttributes::default)
            .unique_groups
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub primary_key: bool,
    pub auto_increment: bool,
}

/// Validated metadata for one record type.
///
/// Fields are kept in a `BTreeMap`, so iteration is always in
/// lexicographic field-name order. Generated column lists rely on that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: String,
    pub table_name: String,
    pub fields: BTreeMap<String, FieldDescriptor>,
    pub unique_groups: Vec<Vec<String>>,
}

impl EntityDescriptor {
    pub fn build(declaration: &RecordDeclaration) -> Result<Self, SchemaError> {
        let entity = &declaration.type_name;
        let attrs = declaration
            .entity
            .as_ref()
            .ok_or_else(|| SchemaError::MissingEntityMetadata(entity.clone()))?;

        let table_name = match attrs.table.as_deref() {
            Some(table) if !table.trim().is_empty() => table.to_string(),
            _ => entity.to_lowercase(),
        };

        let mut fields = BTreeMap::new();
        for field in &declaration.fields {
            let kind = ValueKind::from_type_name(&field.type_name).ok_or_else(|| {
                SchemaError::UnsupportedFieldKind {
                    entity: entity.clone(),
                    field: field.name.clone(),
                    type_name: field.type_name.clone(),
                }
            })?;

            if field.auto_increment && !field.primary_key {
                return Err(SchemaError::AutoIncrementWithoutPrimaryKey {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
            if field.auto_increment && !kind.is_integer() {
                return Err(SchemaError::AutoIncrementNotInteger {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }

            let descriptor = FieldDescriptor {
                name: field.name.clone(),
                kind,
                primary_key: field.primary_key,
                auto_increment: field.auto_increment,
            };
            if fields.insert(field.name.clone(), descriptor).is_some() {
                return Err(SchemaError::DuplicateField {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let keys = fields.values().filter(|f| f.primary_key).count();
        if let Some(field) = fields.values().find(|f| f.auto_increment && keys > 1) {
            return Err(SchemaError::AutoIncrementInCompositeKey {
                entity: entity.clone(),
                field: field.name.clone(),
            });
        }

        for group in &attrs.unique_groups {
            if group.is_empty() {
                return Err(SchemaError::EmptyUniqueGroup(entity.clone()));
            }
            if let Some(unknown) = group.iter().find(|f| !fields.contains_key(*f)) {
                return Err(SchemaError::UnknownUniqueField {
                    entity: entity.clone(),
                    field: unknown.clone(),
                });
            }
        }

        Ok(Self {
            name: entity.clone(),
            table_name,
            fields,
            unique_groups: attrs.unique_groups.clone(),
        })
    }

    /// Primary-key fields in sorted-name order.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values().filter(|f| f.primary_key)
    }

    /// Non-key fields in sorted-name order.
    pub fn value_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values().filter(|f| !f.primary_key)
    }

    pub fn has_primary_key(&self) -> bool {
        self.fields.values().any(|f| f.primary_key)
    }

    /// Case-insensitive field lookup used when mapping result columns.
    pub fn field_for_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.get(column).or_else(|| {
            self.fields
                .values()
                .find(|f| f.name.eq_ignore_ascii_case(column))
        })
    }
}
