//! Destination-side persistence traits
//!
//! A [`PersistenceGateway`] is built once per run and injected wherever rows are
//! written. Every page gets its own [`UnitOfWork`]; units of work are never shared
//! between workers.

use async_trait::async_trait;
use thiserror::Error;

use super::custom_fields::SchemaDefinition;
use super::entity_kind::EntityKind;
use super::record::Record;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("no destination table for {0}")]
    UnmappedTarget(String),

    #[error("unit of work is already closed")]
    Closed,
}

/// One transactional batch of writes
#[async_trait]
pub trait UnitOfWork: Send {
    /// Queues records for the next commit
    fn add_all(&mut self, records: Vec<Record>);

    /// Writes every queued record atomically and returns how many were written
    async fn commit(&mut self) -> Result<usize, PersistenceError>;

    /// Releases the session; rolls back anything uncommitted. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn open_unit_of_work(&self) -> Result<Box<dyn UnitOfWork>, PersistenceError>;

    /// Drops the kind's entity and custom field tables and recreates the entity table
    async fn recreate_entity_table(&self, kind: EntityKind) -> Result<(), PersistenceError>;

    /// Creates the custom field table described by `schema`
    async fn materialize_custom_schema(&self, schema: &SchemaDefinition) -> Result<(), PersistenceError>;
}
