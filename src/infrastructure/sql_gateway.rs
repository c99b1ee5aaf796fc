//! sqlx implementation of the persistence gateway
//!
//! Each unit of work begins its own transaction on commit, so concurrent pages
//! never share a session.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Transaction};
use tracing::{debug, info, warn};

use super::config::DestinationConfig;
use super::database_connection::DatabaseConnection;
use super::table_ddl::TableLayout;
use crate::domain::record::Column;
use crate::domain::{
    ColumnValue, EntityKind, PersistenceError, PersistenceGateway, Record, RecordTarget, SchemaDefinition, UnitOfWork,
};

impl From<sqlx::Error> for PersistenceError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database(error.to_string())
    }
}

fn bind_value<'q>(query: Query<'q, Any, AnyArguments<'q>>, value: ColumnValue) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        ColumnValue::Text(value) => query.bind(value),
        ColumnValue::Integer(value) => query.bind(value),
        ColumnValue::Real(value) => query.bind(value),
        ColumnValue::Boolean(value) => query.bind(value),
    }
}

pub struct SqlGateway {
    pool: AnyPool,
    layout: Arc<TableLayout>,
}

impl SqlGateway {
    pub fn new(connection: &DatabaseConnection, destination: &DestinationConfig) -> Self {
        let layout = TableLayout::new(
            connection.dialect(),
            destination.schema.clone(),
            destination.string_length,
            destination.tables.clone(),
        );
        Self {
            pool: connection.pool().clone(),
            layout: Arc::new(layout),
        }
    }

    async fn execute(&self, sql: &str) -> Result<(), PersistenceError> {
        debug!("{}", sql);
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for SqlGateway {
    async fn open_unit_of_work(&self) -> Result<Box<dyn UnitOfWork>, PersistenceError> {
        Ok(Box::new(SqlUnitOfWork::new(self.pool.clone(), Arc::clone(&self.layout))))
    }

    async fn recreate_entity_table(&self, kind: EntityKind) -> Result<(), PersistenceError> {
        if let Some(sql) = self.layout.create_namespace() {
            self.execute(&sql).await?;
        }
        if let Some(custom) = self.layout.table_name(RecordTarget::CustomFields(kind)) {
            self.execute(&self.layout.drop_table(custom)).await?;
        }
        let table = self
            .layout
            .table_name(RecordTarget::Entity(kind))
            .ok_or_else(|| PersistenceError::UnmappedTarget(kind.to_string()))?;
        self.execute(&self.layout.drop_table(table)).await?;
        self.execute(&self.layout.create_entity_table(kind)).await?;

        info!("🧱 Recreated destination table {} for {}", table, kind);
        Ok(())
    }

    async fn materialize_custom_schema(&self, schema: &SchemaDefinition) -> Result<(), PersistenceError> {
        let kind = schema.kind();
        let (Some(table), Some(create)) = (
            self.layout.table_name(RecordTarget::CustomFields(kind)),
            self.layout.create_custom_table(schema),
        ) else {
            return Err(PersistenceError::UnmappedTarget(format!("{kind} custom fields")));
        };

        self.execute(&self.layout.drop_table(table)).await?;
        self.execute(&create).await?;
        info!("🧱 Created custom field table {} with {} columns", table, schema.len() + 1);
        Ok(())
    }
}

pub struct SqlUnitOfWork {
    pool: AnyPool,
    layout: Arc<TableLayout>,
    pending: Vec<Record>,
    transaction: Option<Transaction<'static, Any>>,
    closed: bool,
}

impl SqlUnitOfWork {
    fn new(pool: AnyPool, layout: Arc<TableLayout>) -> Self {
        Self {
            pool,
            layout,
            pending: Vec::new(),
            transaction: None,
            closed: false,
        }
    }
}

#[async_trait]
impl UnitOfWork for SqlUnitOfWork {
    fn add_all(&mut self, records: Vec<Record>) {
        self.pending.extend(records);
    }

    async fn commit(&mut self) -> Result<usize, PersistenceError> {
        if self.closed {
            return Err(PersistenceError::Closed);
        }

        let records = std::mem::take(&mut self.pending);
        let count = records.len();
        let transaction = self.transaction.insert(self.pool.begin().await?);

        for record in records {
            let (target, columns) = record.into_parts();
            let table = self
                .layout
                .table_name(target)
                .ok_or_else(|| PersistenceError::UnmappedTarget(format!("{target:?}")))?;
            let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
            let sql = self.layout.insert(table, &names);

            let query = columns
                .into_iter()
                .fold(sqlx::query(&sql), |query, Column { value, .. }| bind_value(query, value));
            query.execute(&mut **transaction).await?;
        }

        if let Some(transaction) = self.transaction.take() {
            transaction.commit().await?;
        }
        Ok(count)
    }

    async fn close(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            if let Err(e) = transaction.rollback().await {
                warn!("Rollback of an unfinished unit of work failed: {}", e);
            }
        }
        self.pending.clear();
        self.closed = true;
    }
}
