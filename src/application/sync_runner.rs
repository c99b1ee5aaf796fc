//! Full refresh run across entity kinds
//!
//! 1. drop and recreate the destination tables of every requested kind
//! 2. discover and materialize custom field schemas
//! 3. sync the kinds one after another
//!
//! A fatal error stops only the kind it belongs to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use super::errors::SyncError;
use super::schema_builder::CustomFieldSchemaBuilder;
use super::sync_orchestrator::SyncOrchestrator;
use super::sync_report::{RunReport, SyncReport};
use crate::domain::{EntityKind, PagedResourceProvider, PersistenceGateway, SchemaDefinition};

pub struct SyncRunner {
    resources: Arc<dyn PagedResourceProvider>,
    schema_builder: CustomFieldSchemaBuilder,
    gateway: Arc<dyn PersistenceGateway>,
    orchestrator: SyncOrchestrator,
}

impl SyncRunner {
    pub fn new(
        resources: Arc<dyn PagedResourceProvider>,
        schema_builder: CustomFieldSchemaBuilder,
        gateway: Arc<dyn PersistenceGateway>,
        orchestrator: SyncOrchestrator,
    ) -> Self {
        Self {
            resources,
            schema_builder,
            gateway,
            orchestrator,
        }
    }

    pub async fn run(&self, kinds: &[EntityKind]) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut seen = HashSet::new();
        let kinds: Vec<EntityKind> = kinds.iter().copied().filter(|kind| seen.insert(*kind)).collect();

        info!("🔄 Starting full refresh of {:?}", kinds);
        let mut aborted: HashMap<EntityKind, SyncReport> = HashMap::new();

        for &kind in &kinds {
            let kind_started = Instant::now();
            if let Err(source) = self.gateway.recreate_entity_table(kind).await {
                let error = SyncError::Preparation { kind, source };
                error!("❌ {}", error);
                aborted.insert(kind, SyncReport::aborted(kind, &error, kind_started.elapsed()));
            }
        }

        let mut schemas: HashMap<EntityKind, Arc<SchemaDefinition>> = HashMap::new();
        for &kind in &kinds {
            if !kind.carries_custom_fields() || aborted.contains_key(&kind) {
                continue;
            }
            let kind_started = Instant::now();
            match self.prepare_custom_schema(kind).await {
                Ok(schema) => {
                    schemas.insert(kind, Arc::new(schema));
                }
                Err(error) => {
                    error!("❌ {}", error);
                    aborted.insert(kind, SyncReport::aborted(kind, &error, kind_started.elapsed()));
                }
            }
        }

        let mut reports = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if let Some(report) = aborted.remove(&kind) {
                reports.push(report);
                continue;
            }

            let kind_started = Instant::now();
            let resource = self.resources.resource(kind);
            let report = match self.orchestrator.run(resource, schemas.get(&kind).cloned()).await {
                Ok(report) => report,
                Err(error) => {
                    error!("❌ {}", error);
                    SyncReport::aborted(kind, &error, kind_started.elapsed())
                }
            };
            reports.push(report);
        }

        let run = RunReport {
            started_at,
            reports,
            elapsed: started.elapsed(),
        };
        info!(
            "🏁 Full refresh finished in {:?} (exit code {})",
            run.elapsed,
            run.exit_code()
        );
        run
    }

    async fn prepare_custom_schema(&self, kind: EntityKind) -> Result<SchemaDefinition, SyncError> {
        let schema = self.schema_builder.discover(kind).await?;
        self.gateway
            .materialize_custom_schema(&schema)
            .await
            .map_err(|source| SyncError::Preparation { kind, source })?;
        Ok(schema)
    }
}
