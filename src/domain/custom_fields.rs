//! Tenant-defined custom fields
//!
//! A [`SchemaDefinition`] is built once per entity kind per run from the custom field
//! catalog and then shared read-only by every worker of that kind. It decides which
//! columns the kind's custom field table has and which values of an item survive
//! into its [`CustomFieldRecord`].

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::entity_kind::EntityKind;
use super::record::{ColumnType, ColumnValue, MappingError, Record, RecordTarget, ValueSanitizer};
use super::value_path::lookup;

static COLUMN_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// PostgreSQL truncates identifiers beyond this many bytes
pub const MAX_COLUMN_NAME_BYTES: usize = 63;

/// Whether `name` can be used unquoted as a column or table identifier
pub fn is_valid_identifier(name: &str) -> bool {
    COLUMN_IDENTIFIER.is_match(name)
}

/// Whether `name` survives as a quoted column name on every supported destination
pub fn is_quotable_column_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_COLUMN_NAME_BYTES && !name.chars().any(char::is_control)
}

/// One discovered custom field: opaque id from the source, column name for the sink
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CustomFieldDefinition {
    pub field_id: String,
    pub field_name: String,
}

impl CustomFieldDefinition {
    pub fn new(field_id: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            field_name: field_name.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("custom field catalog is empty")]
    EmptyCatalog,

    #[error("custom field '{field_id}' has name '{field_name}', which cannot be used as a column name")]
    InvalidColumnName { field_id: String, field_name: String },

    #[error("custom fields '{first_id}' and '{second_id}' both map to column '{field_name}'")]
    DuplicateName {
        field_name: String,
        first_id: String,
        second_id: String,
    },

    #[error("custom field '{field_id}' is listed with two different names")]
    ConflictingDefinition { field_id: String },

    #[error("custom field '{field_id}' collides with the primary key column '{field_name}'")]
    PrimaryKeyCollision { field_id: String, field_name: String },
}

/// Custom field columns of one entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDefinition {
    kind: EntityKind,
    primary_key: &'static str,
    fields: Vec<CustomFieldDefinition>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

impl SchemaDefinition {
    /// Validates `definitions` (in catalog order) into a schema.
    ///
    /// Column names are compared case-insensitively because most destinations
    /// fold identifier case.
    pub fn new(kind: EntityKind, definitions: Vec<CustomFieldDefinition>) -> Result<Self, SchemaError> {
        if definitions.is_empty() {
            return Err(SchemaError::EmptyCatalog);
        }

        let primary_key = kind.primary_key();
        let mut fields: Vec<CustomFieldDefinition> = Vec::with_capacity(definitions.len());
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(definitions.len());
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(definitions.len());

        for definition in definitions {
            if let Some(&existing) = by_id.get(&definition.field_id) {
                if fields[existing].field_name == definition.field_name {
                    continue;
                }
                return Err(SchemaError::ConflictingDefinition {
                    field_id: definition.field_id,
                });
            }

            if !is_quotable_column_name(&definition.field_name) {
                return Err(SchemaError::InvalidColumnName {
                    field_id: definition.field_id,
                    field_name: definition.field_name,
                });
            }

            let folded = definition.field_name.to_ascii_lowercase();
            if folded == primary_key.to_ascii_lowercase() {
                return Err(SchemaError::PrimaryKeyCollision {
                    field_id: definition.field_id,
                    field_name: definition.field_name,
                });
            }
            if let Some(&existing) = by_name.get(&folded) {
                return Err(SchemaError::DuplicateName {
                    field_name: definition.field_name,
                    first_id: fields[existing].field_id.clone(),
                    second_id: definition.field_id,
                });
            }

            by_id.insert(definition.field_id.clone(), fields.len());
            by_name.insert(folded, fields.len());
            fields.push(definition);
        }

        Ok(Self {
            kind,
            primary_key,
            fields,
            by_id,
        })
    }

    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    pub const fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    pub fn fields(&self) -> &[CustomFieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|f| f.field_name.as_str()).collect()
    }

    pub fn field_name(&self, field_id: &str) -> Option<&str> {
        self.by_id
            .get(field_id)
            .map(|&index| self.fields[index].field_name.as_str())
    }

    /// Pulls the custom field values out of one raw item.
    ///
    /// Returns `Ok(None)` when the item carries no `CustomFieldValues` list at all.
    /// Values for ids outside this schema are dropped and reported back.
    pub fn extract(
        &self,
        item: &Value,
        sanitizer: &ValueSanitizer,
    ) -> Result<Option<CustomFieldExtraction>, MappingError> {
        let Some(returned) = lookup(item, &["CustomFieldValues"]).and_then(Value::as_array) else {
            return Ok(None);
        };

        let primary_key = ColumnValue::from_json(lookup(item, &[self.primary_key]), ColumnType::Text)
            .map(|value| sanitizer.sanitize(value))
            .map_err(|source| MappingError::Conversion {
                column: self.primary_key.to_string(),
                source,
            })?;
        let Some(primary_key) = primary_key.as_text().map(str::to_string) else {
            return Err(MappingError::MissingPrimaryKey {
                column: self.primary_key,
            });
        };

        let mut values: Vec<ColumnValue> = vec![ColumnValue::Text(None); self.fields.len()];
        let mut unknown_field_ids = Vec::new();

        for entry in returned {
            let Some(field_id) = lookup(entry, &["CustomFieldTypeId"]).and_then(Value::as_str) else {
                continue;
            };
            let Some(&index) = self.by_id.get(field_id) else {
                unknown_field_ids.push(field_id.to_string());
                continue;
            };
            let value = ColumnValue::from_json(lookup(entry, &["Value"]), ColumnType::Text).map_err(|source| {
                MappingError::Conversion {
                    column: self.fields[index].field_name.clone(),
                    source,
                }
            })?;
            values[index] = sanitizer.sanitize(value);
        }

        Ok(Some(CustomFieldExtraction {
            record: CustomFieldRecord {
                kind: self.kind,
                primary_key_column: self.primary_key,
                primary_key,
                values: self
                    .fields
                    .iter()
                    .map(|f| f.field_name.clone())
                    .zip(values)
                    .collect(),
            },
            unknown_field_ids,
        }))
    }
}

/// Custom field values of one item, one slot per schema field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomFieldRecord {
    kind: EntityKind,
    primary_key_column: &'static str,
    primary_key: String,
    values: Vec<(String, ColumnValue)>,
}

impl CustomFieldRecord {
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn value(&self, field_name: &str) -> Option<&ColumnValue> {
        self.values
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn into_record(self) -> Record {
        let mut record = Record::with_capacity(RecordTarget::CustomFields(self.kind), self.values.len() + 1);
        record.push(self.primary_key_column, ColumnValue::Text(Some(self.primary_key)));
        for (name, value) in self.values {
            record.push(name, value);
        }
        record
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomFieldExtraction {
    pub record: CustomFieldRecord,
    pub unknown_field_ids: Vec<String>,
}
