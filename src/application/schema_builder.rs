//! Custom field schema discovery

use std::sync::Arc;

use tracing::{debug, info};

use super::errors::{SchemaDiscoveryFailure, SyncError};
use crate::domain::{CustomFieldDefinition, CustomFieldSource, EntityKind, SchemaDefinition};

/// Builds a [`SchemaDefinition`] from the tenant's custom field catalog
pub struct CustomFieldSchemaBuilder {
    source: Arc<dyn CustomFieldSource>,
}

/// Column name for a catalog display name: all whitespace removed
pub fn column_name(display_name: &str) -> String {
    display_name.chars().filter(|c| !c.is_whitespace()).collect()
}

impl CustomFieldSchemaBuilder {
    pub fn new(source: Arc<dyn CustomFieldSource>) -> Self {
        Self { source }
    }

    pub async fn discover(&self, kind: EntityKind) -> Result<SchemaDefinition, SyncError> {
        let fail = |source: SchemaDiscoveryFailure| SyncError::SchemaDiscovery { kind, source };

        if !kind.carries_custom_fields() {
            return Err(fail(SchemaDiscoveryFailure::Unsupported(kind)));
        }

        let entries = self
            .source
            .list_custom_fields(kind)
            .await
            .map_err(|e| fail(e.into()))?;
        debug!("Custom field catalog for {} returned {} entries", kind, entries.len());

        let definitions = entries
            .into_iter()
            .map(|entry| CustomFieldDefinition::new(entry.field_id, column_name(&entry.field_name)))
            .collect();
        let schema = SchemaDefinition::new(kind, definitions).map_err(|e| fail(e.into()))?;

        info!("🧩 Discovered {} custom fields for {}", schema.len(), kind);
        Ok(schema)
    }
}
