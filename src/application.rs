//! Application layer module
//!
//! Use cases that drive the domain: schema discovery, the per-kind paged sync
//! and the full refresh run across kinds.

pub mod errors;
pub mod schema_builder;
pub mod sync_orchestrator;
pub mod sync_report;
pub mod sync_runner;

pub use errors::{SchemaDiscoveryFailure, SyncError, SyncErrorKind};
pub use schema_builder::CustomFieldSchemaBuilder;
pub use sync_orchestrator::{OrchestratorSettings, SyncOrchestrator};
pub use sync_report::{FatalFailure, ItemFailure, PageFailure, RunReport, SyncPhase, SyncReport, SyncStatus};
pub use sync_runner::SyncRunner;
