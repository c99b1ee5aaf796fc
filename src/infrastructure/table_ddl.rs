//! Dialect-aware SQL for the destination tables
//!
//! Every identifier is quoted, so table and column names keep the casing used by
//! IncidentIQ (`AssetId`, `LocationRoomId`, ...).

use super::config::TableNames;
use crate::domain::field_map::fields_for;
use crate::domain::{ColumnType, EntityKind, RecordTarget, SchemaDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let scheme = connection_string.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${index}"),
        }
    }

    pub const fn supports_schemas(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Where and how rows of each record target are stored
#[derive(Debug, Clone)]
pub struct TableLayout {
    dialect: Dialect,
    namespace: Option<String>,
    string_length: usize,
    tables: TableNames,
}

impl TableLayout {
    pub fn new(dialect: Dialect, namespace: Option<String>, string_length: usize, tables: TableNames) -> Self {
        Self {
            dialect,
            namespace: namespace.filter(|_| dialect.supports_schemas()),
            string_length,
            tables,
        }
    }

    pub fn table_name(&self, target: RecordTarget) -> Option<&str> {
        match target {
            RecordTarget::Entity(kind) => Some(self.tables.entity_table(kind)),
            RecordTarget::CustomFields(kind) => self.tables.custom_table(kind),
        }
    }

    /// Quoted, namespace-qualified table name
    pub fn qualified(&self, table: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}.{}", quote(namespace), quote(table)),
            None => quote(table),
        }
    }

    pub fn create_namespace(&self) -> Option<String> {
        self.namespace
            .as_ref()
            .map(|namespace| format!("CREATE SCHEMA IF NOT EXISTS {}", quote(namespace)))
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified(table))
    }

    fn sql_type(&self, column_type: ColumnType) -> String {
        match (self.dialect, column_type) {
            (Dialect::Sqlite, ColumnType::Text) => "TEXT".to_string(),
            (Dialect::Postgres, ColumnType::Text) => format!("VARCHAR({})", self.string_length),
            (_, ColumnType::Integer) => "BIGINT".to_string(),
            (Dialect::Sqlite, ColumnType::Real) => "REAL".to_string(),
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION".to_string(),
            (_, ColumnType::Boolean) => "BOOLEAN".to_string(),
        }
    }

    fn create_table<'a>(&self, table: &str, columns: impl Iterator<Item = (&'a str, ColumnType)>, primary_key: &str) -> String {
        let definitions: Vec<String> = columns
            .map(|(name, column_type)| {
                let constraint = if name == primary_key { " PRIMARY KEY" } else { "" };
                format!("{} {}{}", quote(name), self.sql_type(column_type), constraint)
            })
            .collect();
        format!("CREATE TABLE {} ({})", self.qualified(table), definitions.join(", "))
    }

    pub fn create_entity_table(&self, kind: EntityKind) -> String {
        self.create_table(
            self.tables.entity_table(kind),
            fields_for(kind).iter().map(|field| (field.column, field.column_type)),
            kind.primary_key(),
        )
    }

    /// `None` when the schema's kind has no custom field table
    pub fn create_custom_table(&self, schema: &SchemaDefinition) -> Option<String> {
        let table = self.tables.custom_table(schema.kind())?;
        let columns = std::iter::once((schema.primary_key(), ColumnType::Text)).chain(
            schema
                .fields()
                .iter()
                .map(|field| (field.field_name.as_str(), ColumnType::Text)),
        );
        Some(self.create_table(table, columns, schema.primary_key()))
    }

    pub fn insert(&self, table: &str, columns: &[&str]) -> String {
        let names: Vec<String> = columns.iter().map(|name| quote(name)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.dialect.placeholder(i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified(table),
            names.join(", "),
            placeholders.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CustomFieldDefinition;

    fn layout(dialect: Dialect) -> TableLayout {
        TableLayout::new(dialect, Some("iiq".to_string()), 4000, TableNames::default())
    }

    #[test]
    fn detects_dialects() {
        assert_eq!(Dialect::from_connection_string("sqlite://sync.db"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_connection_string("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_connection_string("postgresql://u@h/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_connection_string("mssql://u@h/db"), None);
    }

    #[test]
    fn sqlite_ignores_the_namespace() {
        let sqlite = layout(Dialect::Sqlite);
        assert_eq!(sqlite.create_namespace(), None);
        assert_eq!(sqlite.drop_table("Teams"), r#"DROP TABLE IF EXISTS "Teams""#);

        let postgres = layout(Dialect::Postgres);
        assert_eq!(postgres.create_namespace().as_deref(), Some(r#"CREATE SCHEMA IF NOT EXISTS "iiq""#));
        assert_eq!(postgres.qualified("Teams"), r#""iiq"."Teams""#);
    }

    #[test]
    fn entity_tables_follow_the_field_list() {
        let sql = layout(Dialect::Postgres).create_entity_table(EntityKind::Team);
        assert_eq!(
            sql,
            r#"CREATE TABLE "iiq"."Teams" ("TeamId" VARCHAR(4000) PRIMARY KEY, "SiteId" VARCHAR(4000), "TeamName" VARCHAR(4000), "MembersCount" BIGINT)"#
        );
    }

    #[test]
    fn custom_tables_have_one_text_column_per_field() {
        let schema = SchemaDefinition::new(
            EntityKind::User,
            vec![
                CustomFieldDefinition::new("f1", "BusRoute"),
                CustomFieldDefinition::new("f2", "Locker"),
            ],
        )
        .unwrap();
        let sql = layout(Dialect::Sqlite).create_custom_table(&schema).unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "UserCustomFields" ("UserId" TEXT PRIMARY KEY, "BusRoute" TEXT, "Locker" TEXT)"#
        );
    }

    #[test]
    fn insert_placeholders_match_the_dialect() {
        assert_eq!(
            layout(Dialect::Sqlite).insert("Teams", &["TeamId", "TeamName"]),
            r#"INSERT INTO "Teams" ("TeamId", "TeamName") VALUES (?, ?)"#
        );
        assert_eq!(
            layout(Dialect::Postgres).insert("Teams", &["TeamId", "TeamName"]),
            r#"INSERT INTO "iiq"."Teams" ("TeamId", "TeamName") VALUES ($1, $2)"#
        );
    }
}
