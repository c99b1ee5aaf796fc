//! Test utilities for iiq-sync
//!
//! In-memory fakes of the paged resource, the custom field catalog and the
//! persistence gateway, so application tests run without network or database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{
    ColumnValue, CustomFieldEntry, CustomFieldSource, EntityKind, FetchError, PageResponse, PagedResource,
    PagedResourceProvider, Paging, PersistenceError, PersistenceGateway, Record, RecordTarget, SchemaDefinition,
    UnitOfWork,
};

pub fn team_item(id: &str) -> Value {
    json!({ "TeamId": id, "TeamName": format!("Team {id}"), "MembersCount": 3 })
}

/// Paged resource serving canned pages
pub struct FakeResource {
    kind: EntityKind,
    pages: Vec<Result<Vec<Value>, FetchError>>,
    page_count: Option<Result<u32, FetchError>>,
    delay: Duration,
    panic_on: Option<u32>,
    fetched: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeResource {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pages: Vec::new(),
            page_count: None,
            delay: Duration::ZERO,
            panic_on: None,
            fetched: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, items: Vec<Value>) -> Self {
        self.pages.push(Ok(items));
        self
    }

    pub fn with_failure(mut self, error: FetchError) -> Self {
        self.pages.push(Err(error));
        self
    }

    /// Overrides the page count lookup instead of deriving it from the pages
    pub fn with_page_count(mut self, result: Result<u32, FetchError>) -> Self {
        self.page_count = Some(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn panicking_on(mut self, page: u32) -> Self {
        self.panic_on = Some(page);
        self
    }

    /// Pages requested by workers, in request order
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PagedResource for FakeResource {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn fetch_page(&self, page: u32) -> Result<PageResponse, FetchError> {
        self.fetched.lock().unwrap().push(page);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on == Some(page) {
            panic!("page {page} exploded");
        }

        let items = self
            .pages
            .get(page as usize)
            .cloned()
            .unwrap_or(Err(FetchError::Status { status: 404 }))?;
        Ok(PageResponse {
            items,
            paging: Paging {
                page_size: 1000,
                page_count: self.pages.len() as i64,
                total_rows: None,
            },
        })
    }

    async fn page_count(&self) -> Result<u32, FetchError> {
        match &self.page_count {
            Some(result) => result.clone(),
            None => Ok(self.pages.len() as u32),
        }
    }
}

#[derive(Default)]
pub struct StaticProvider {
    resources: HashMap<EntityKind, Arc<dyn PagedResource>>,
}

impl StaticProvider {
    pub fn with(mut self, resource: Arc<dyn PagedResource>) -> Self {
        self.resources.insert(resource.kind(), resource);
        self
    }
}

impl PagedResourceProvider for StaticProvider {
    fn resource(&self, kind: EntityKind) -> Arc<dyn PagedResource> {
        self.resources
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(FakeResource::new(kind).with_page_count(Err(FetchError::Status { status: 404 }))))
    }
}

/// Custom field catalog counting how often each kind is listed
#[derive(Default)]
pub struct CountingCatalog {
    catalogs: HashMap<EntityKind, Vec<CustomFieldEntry>>,
    calls: Mutex<HashMap<EntityKind, usize>>,
}

impl CountingCatalog {
    pub fn with(mut self, kind: EntityKind, fields: &[(&str, &str)]) -> Self {
        let entries = fields
            .iter()
            .map(|(id, name)| CustomFieldEntry {
                field_id: (*id).to_string(),
                field_name: (*name).to_string(),
            })
            .collect();
        self.catalogs.insert(kind, entries);
        self
    }

    pub fn calls(&self, kind: EntityKind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl CustomFieldSource for CountingCatalog {
    async fn list_custom_fields(&self, kind: EntityKind) -> Result<Vec<CustomFieldEntry>, FetchError> {
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;
        Ok(self.catalogs.get(&kind).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct GatewayState {
    committed: Vec<Record>,
    opened: usize,
    closed: usize,
    recreated: Vec<EntityKind>,
    materialized: Vec<EntityKind>,
    poison_keys: HashSet<String>,
    failing_preparation: HashSet<EntityKind>,
}

/// Persistence gateway recording everything in memory
#[derive(Clone, Default)]
pub struct RecordingGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl RecordingGateway {
    /// Commits fail when any record carries `key` as its first column value
    pub fn failing_commits_containing(self, key: &str) -> Self {
        self.state.lock().unwrap().poison_keys.insert(key.to_string());
        self
    }

    pub fn failing_preparation_of(self, kind: EntityKind) -> Self {
        self.state.lock().unwrap().failing_preparation.insert(kind);
        self
    }

    pub fn committed(&self, target: RecordTarget) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .committed
            .iter()
            .filter(|record| record.target() == target)
            .cloned()
            .collect()
    }

    /// Sorted primary keys of the committed records of `target`
    pub fn committed_keys(&self, target: RecordTarget) -> Vec<String> {
        let mut keys: Vec<String> = self
            .committed(target)
            .iter()
            .filter_map(|record| record.columns().first())
            .filter_map(|column| column.value.as_text().map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    pub fn units_opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn units_closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn recreated(&self) -> Vec<EntityKind> {
        self.state.lock().unwrap().recreated.clone()
    }

    pub fn materialized(&self) -> Vec<EntityKind> {
        self.state.lock().unwrap().materialized.clone()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn open_unit_of_work(&self) -> Result<Box<dyn UnitOfWork>, PersistenceError> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(RecordingUnitOfWork {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            closed: false,
        }))
    }

    async fn recreate_entity_table(&self, kind: EntityKind) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_preparation.contains(&kind) {
            return Err(PersistenceError::Database(format!("cannot drop tables of {kind}")));
        }
        state.recreated.push(kind);
        Ok(())
    }

    async fn materialize_custom_schema(&self, schema: &SchemaDefinition) -> Result<(), PersistenceError> {
        self.state.lock().unwrap().materialized.push(schema.kind());
        Ok(())
    }
}

struct RecordingUnitOfWork {
    state: Arc<Mutex<GatewayState>>,
    pending: Vec<Record>,
    closed: bool,
}

#[async_trait]
impl UnitOfWork for RecordingUnitOfWork {
    fn add_all(&mut self, records: Vec<Record>) {
        self.pending.extend(records);
    }

    async fn commit(&mut self) -> Result<usize, PersistenceError> {
        if self.closed {
            return Err(PersistenceError::Closed);
        }
        let mut state = self.state.lock().unwrap();
        let poisoned = self.pending.iter().any(|record| {
            matches!(
                record.columns().first().map(|c| &c.value),
                Some(ColumnValue::Text(Some(key))) if state.poison_keys.contains(key)
            )
        });
        if poisoned {
            return Err(PersistenceError::Database("constraint violation".to_string()));
        }

        let count = self.pending.len();
        state.committed.append(&mut self.pending);
        Ok(count)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending.clear();
            self.state.lock().unwrap().closed += 1;
        }
    }
}
