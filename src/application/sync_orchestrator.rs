//! Concurrent paged sync of one entity kind
//!
//! Every page is an independent work unit: it is fetched, mapped and committed in
//! its own unit of work, bounded by a per-run semaphore. A failing page is
//! recorded in the report and never affects its siblings.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::errors::{SyncError, SyncErrorKind};
use super::sync_report::{ItemFailure, PageFailure, SyncPhase, SyncReport};
use crate::domain::{
    FetchError, MappingError, PagedResource, PersistenceError, PersistenceGateway, Record, RecordMapper,
    SchemaDefinition, ValueSanitizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum number of pages in flight
    pub worker_count: usize,
    /// Width of destination string columns
    pub string_length: usize,
}

pub struct SyncOrchestrator {
    gateway: Arc<dyn PersistenceGateway>,
    settings: OrchestratorSettings,
}

impl SyncOrchestrator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, settings: OrchestratorSettings) -> Self {
        Self { gateway, settings }
    }

    /// Syncs every page of `resource`.
    ///
    /// Returns `Err` only for [`SyncError::Discovery`]; page level failures are in
    /// the returned report. A panicking work unit is re-raised here.
    pub async fn run(
        &self,
        resource: Arc<dyn PagedResource>,
        schema: Option<Arc<SchemaDefinition>>,
    ) -> Result<SyncReport, SyncError> {
        let kind = resource.kind();
        let started = Instant::now();
        let mut report = SyncReport::new(kind);

        report.phase = SyncPhase::DiscoveringPageCount;
        let page_count = resource.page_count().await.map_err(|source| {
            warn!("❌ [{}] Page count discovery failed: {}", kind, source);
            SyncError::Discovery { kind, source }
        })?;
        report.page_count = page_count;

        report.phase = SyncPhase::Dispatching;
        let worker_count = self.settings.worker_count.max(1);
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let sanitizer = ValueSanitizer::new(self.settings.string_length);
        let mapper = RecordMapper::new(kind, sanitizer);

        info!(
            "🚀 [{}] Dispatching {} pages (max {} concurrent)",
            kind, page_count, worker_count
        );

        let mut pages = Vec::with_capacity(page_count as usize);
        let mut tasks = Vec::with_capacity(page_count as usize);
        for page in 0..page_count {
            let semaphore = Arc::clone(&semaphore);
            let unit = PageWorkUnit {
                page,
                resource: Arc::clone(&resource),
                gateway: Arc::clone(&self.gateway),
                mapper,
                schema: schema.clone(),
                sanitizer,
            };

            pages.push(page);
            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return PageOutcome::failed(
                            page,
                            SyncError::PageFetch {
                                page,
                                source: FetchError::Transport(e.to_string()),
                            },
                        );
                    }
                };
                unit.execute().await
            }));
        }

        report.phase = SyncPhase::Draining;
        let results = join_all(tasks).await;

        for (page, joined) in pages.into_iter().zip(results) {
            match joined {
                Ok(outcome) => absorb(&mut report, outcome),
                Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
                Err(join_err) => {
                    report.pages_attempted += 1;
                    report.page_failures.push(PageFailure {
                        page,
                        error_kind: SyncErrorKind::PageFetch,
                        message: join_err.to_string(),
                    });
                }
            }
        }
        report.page_failures.sort_by_key(|failure| failure.page);

        report.phase = SyncPhase::Completed;
        report.elapsed = started.elapsed();
        info!(
            "✅ [{}] {} of {} pages committed, {} records, {} custom field records ({:?})",
            kind,
            report.pages_committed,
            report.page_count,
            report.records_committed,
            report.custom_records_committed,
            report.elapsed
        );
        Ok(report)
    }
}

fn absorb(report: &mut SyncReport, outcome: PageOutcome) {
    report.pages_attempted += 1;
    report.items_skipped += outcome.item_failures.len();
    report.unknown_custom_fields += outcome.unknown_custom_fields;
    report.item_failures.extend(outcome.item_failures);

    match outcome.result {
        Ok(commit) => {
            report.pages_committed += 1;
            report.records_committed += commit.records;
            report.custom_records_committed += commit.custom_records;
        }
        Err(error) => report.page_failures.push(PageFailure {
            page: outcome.page,
            error_kind: error.kind(),
            message: error.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageCommit {
    records: usize,
    custom_records: usize,
}

#[derive(Debug)]
struct PageOutcome {
    page: u32,
    result: Result<PageCommit, SyncError>,
    item_failures: Vec<ItemFailure>,
    unknown_custom_fields: usize,
}

impl PageOutcome {
    fn failed(page: u32, error: SyncError) -> Self {
        Self {
            page,
            result: Err(error),
            item_failures: Vec::new(),
            unknown_custom_fields: 0,
        }
    }
}

#[derive(Default)]
struct MappedPage {
    records: Vec<Record>,
    custom_records: Vec<Record>,
    item_failures: Vec<ItemFailure>,
    first_error: Option<MappingError>,
    unknown_field_ids: Vec<String>,
}

struct PageWorkUnit {
    page: u32,
    resource: Arc<dyn PagedResource>,
    gateway: Arc<dyn PersistenceGateway>,
    mapper: RecordMapper,
    schema: Option<Arc<SchemaDefinition>>,
    sanitizer: ValueSanitizer,
}

impl PageWorkUnit {
    async fn execute(self) -> PageOutcome {
        let page = self.page;
        let kind = self.mapper.kind();

        let response = match self.resource.fetch_page(page).await {
            Ok(response) if response.items.is_empty() => {
                return self.fail(SyncError::PageFetch {
                    page,
                    source: FetchError::EmptyPage,
                });
            }
            Ok(response) => response,
            Err(source) => return self.fail(SyncError::PageFetch { page, source }),
        };

        let mapped = self.map_items(&response.items);
        let unknown_custom_fields = mapped.unknown_field_ids.len();
        if unknown_custom_fields > 0 {
            let distinct: BTreeSet<&str> = mapped.unknown_field_ids.iter().map(String::as_str).collect();
            warn!(
                "⚠️ [{}] Page {} dropped {} values of unknown custom fields: {:?}",
                kind, page, unknown_custom_fields, distinct
            );
        }

        let mut outcome = PageOutcome {
            page,
            result: Ok(PageCommit {
                records: mapped.records.len(),
                custom_records: mapped.custom_records.len(),
            }),
            item_failures: mapped.item_failures,
            unknown_custom_fields,
        };

        if mapped.records.is_empty() {
            let failed_items = outcome.item_failures.len();
            let source = mapped.first_error.unwrap_or(MappingError::NotAnObject);
            let error = SyncError::Mapping {
                page,
                failed_items,
                source,
            };
            warn!("❌ [{}] {}", kind, error);
            outcome.result = Err(error);
            return outcome;
        }

        let mut records = mapped.records;
        records.extend(mapped.custom_records);
        if let Err(source) = self.persist(records).await {
            let error = SyncError::Persistence { page, source };
            warn!("❌ [{}] {}", kind, error);
            outcome.result = Err(error);
            return outcome;
        }

        debug!("✅ [{}] Page {} committed", kind, page);
        outcome
    }

    fn fail(&self, error: SyncError) -> PageOutcome {
        warn!("❌ [{}] {}", self.mapper.kind(), error);
        PageOutcome::failed(self.page, error)
    }

    fn map_items(&self, items: &[Value]) -> MappedPage {
        let mut mapped = MappedPage {
            records: Vec::with_capacity(items.len()),
            ..MappedPage::default()
        };

        for (item_index, item) in items.iter().enumerate() {
            let result = self.mapper.map(item).and_then(|record| {
                let custom = match &self.schema {
                    Some(schema) => schema.extract(item, &self.sanitizer)?,
                    None => None,
                };
                Ok((record, custom))
            });

            match result {
                Ok((record, custom)) => {
                    mapped.records.push(record);
                    if let Some(extraction) = custom {
                        mapped.unknown_field_ids.extend(extraction.unknown_field_ids);
                        mapped.custom_records.push(extraction.record.into_record());
                    }
                }
                Err(error) => {
                    debug!("[{}] Page {} item {} skipped: {}", self.mapper.kind(), self.page, item_index, error);
                    mapped.item_failures.push(ItemFailure {
                        page: self.page,
                        item_index,
                        message: error.to_string(),
                    });
                    mapped.first_error.get_or_insert(error);
                }
            }
        }

        mapped
    }

    /// Writes `records` in a fresh unit of work; the unit is closed on every path
    async fn persist(&self, records: Vec<Record>) -> Result<usize, PersistenceError> {
        let mut unit = self.gateway.open_unit_of_work().await?;
        unit.add_all(records);
        let committed = unit.commit().await;
        unit.close().await;
        committed
    }
}
