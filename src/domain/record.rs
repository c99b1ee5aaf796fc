//! Typed destination records
//!
//! A [`Record`] is one row bound for either an entity table or a custom field table.
//! Values carry their column type even when null so that the persistence layer can
//! bind typed NULLs (PostgreSQL rejects an untyped text NULL in a boolean column).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::entity_kind::EntityKind;

/// Destination column types used by entity and custom field tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl ColumnType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
        }
    }
}

/// A nullable, typed column value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Real(Option<f64>),
    Boolean(Option<bool>),
}

impl ColumnValue {
    pub const fn null(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Text => Self::Text(None),
            ColumnType::Integer => Self::Integer(None),
            ColumnType::Real => Self::Real(None),
            ColumnType::Boolean => Self::Boolean(None),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Text(None) | Self::Integer(None) | Self::Real(None) | Self::Boolean(None)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => text.as_deref(),
            _ => None,
        }
    }

    /// Converts a raw JSON value into `column_type`.
    ///
    /// Numbers and booleans are accepted in their string form as well, since the
    /// API is not consistent about quoting them.
    pub fn from_json(value: Option<&Value>, column_type: ColumnType) -> Result<Self, ConversionError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(Self::null(column_type));
        };

        let converted = match (column_type, value) {
            (ColumnType::Text, Value::String(s)) => Some(Self::Text(Some(s.clone()))),
            (ColumnType::Text, Value::Number(n)) => Some(Self::Text(Some(n.to_string()))),
            (ColumnType::Text, Value::Bool(b)) => Some(Self::Text(Some(b.to_string()))),

            (ColumnType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_f64_to_i64))
                .map(|i| Self::Integer(Some(i))),
            (ColumnType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(|i| Self::Integer(Some(i)))
            }

            (ColumnType::Real, Value::Number(n)) => n.as_f64().map(|f| Self::Real(Some(f))),
            (ColumnType::Real, Value::String(s)) => {
                s.trim().parse::<f64>().ok().map(|f| Self::Real(Some(f)))
            }

            (ColumnType::Boolean, Value::Bool(b)) => Some(Self::Boolean(Some(*b))),
            (ColumnType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(Self::Boolean(Some(false))),
                Some(1) => Some(Self::Boolean(Some(true))),
                _ => None,
            },
            (ColumnType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Self::Boolean(Some(true))),
                "false" => Some(Self::Boolean(Some(false))),
                _ => None,
            },

            _ => None,
        };

        converted.ok_or_else(|| ConversionError {
            expected: column_type,
            found: json_type_name(value),
        })
    }
}

/// 2^63, the first whole number above `i64::MAX` that `f64` represents exactly
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn whole_f64_to_i64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_UPPER_BOUND..I64_UPPER_BOUND).contains(&f)).then(|| f as i64)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {} but found {found}", .expected.name())]
pub struct ConversionError {
    pub expected: ColumnType,
    pub found: &'static str,
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Failure to turn one raw item into records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("item is not a JSON object")]
    NotAnObject,

    #[error("item has no value for primary key '{column}'")]
    MissingPrimaryKey { column: &'static str },

    #[error("column '{column}': {source}")]
    Conversion {
        column: String,
        #[source]
        source: ConversionError,
    },
}

/// Which table family a record belongs to; concrete table names come from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordTarget {
    Entity(EntityKind),
    CustomFields(EntityKind),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub value: ColumnValue,
}

/// One destination row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    target: RecordTarget,
    columns: Vec<Column>,
}

impl Record {
    pub fn with_capacity(target: RecordTarget, capacity: usize) -> Self {
        Self {
            target,
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: ColumnValue) {
        self.columns.push(Column {
            name: name.into(),
            value,
        });
    }

    pub const fn target(&self) -> RecordTarget {
        self.target
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_parts(self) -> (RecordTarget, Vec<Column>) {
        (self.target, self.columns)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.value)
    }
}

/// Normalizes values before they reach the destination.
///
/// Empty strings become NULL and strings that would not fit the configured string
/// column width are cut to `string_length - 1` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSanitizer {
    string_length: usize,
}

impl ValueSanitizer {
    pub const fn new(string_length: usize) -> Self {
        Self { string_length }
    }

    pub fn sanitize(&self, value: ColumnValue) -> ColumnValue {
        match value {
            ColumnValue::Text(Some(text)) if text.is_empty() => ColumnValue::Text(None),
            ColumnValue::Text(Some(text)) if text.chars().count() >= self.string_length => {
                let keep = self.string_length.saturating_sub(1);
                ColumnValue::Text(Some(text.chars().take(keep).collect()))
            }
            other => other,
        }
    }
}
