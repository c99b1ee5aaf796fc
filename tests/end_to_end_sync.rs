//! Full refresh runs against a SQLite file with in-memory IncidentIQ fakes

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_test::assert_ok;

use iiq_sync_lib::application::{
    CustomFieldSchemaBuilder, OrchestratorSettings, SyncErrorKind, SyncOrchestrator, SyncRunner, SyncStatus,
};
use iiq_sync_lib::domain::{
    CustomFieldEntry, CustomFieldSource, EntityKind, FetchError, PageResponse, PagedResource, PagedResourceProvider,
    Paging, PersistenceGateway,
};
use iiq_sync_lib::infrastructure::config::DestinationConfig;
use iiq_sync_lib::infrastructure::{DatabaseConnection, SqlGateway};

struct CannedPages {
    kind: EntityKind,
    pages: Vec<Result<Vec<Value>, FetchError>>,
}

#[async_trait]
impl PagedResource for CannedPages {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn fetch_page(&self, page: u32) -> Result<PageResponse, FetchError> {
        let items = self.pages[page as usize].clone()?;
        Ok(PageResponse {
            items,
            paging: Paging {
                page_size: 2,
                page_count: self.pages.len() as i64,
                total_rows: None,
            },
        })
    }
}

struct Provider(HashMap<EntityKind, Arc<CannedPages>>);

impl PagedResourceProvider for Provider {
    fn resource(&self, kind: EntityKind) -> Arc<dyn PagedResource> {
        self.0[&kind].clone()
    }
}

struct Catalog(HashMap<EntityKind, Vec<(&'static str, &'static str)>>);

#[async_trait]
impl CustomFieldSource for Catalog {
    async fn list_custom_fields(&self, kind: EntityKind) -> Result<Vec<CustomFieldEntry>, FetchError> {
        Ok(self
            .0
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|(id, name)| CustomFieldEntry {
                field_id: (*id).to_string(),
                field_name: (*name).to_string(),
            })
            .collect())
    }
}

fn asset(id: &str, tag: &str, room_size: &str) -> Value {
    json!({
        "AssetId": id,
        "AssetTag": tag,
        "Model": { "Name": "Latitude 3190" },
        "CustomFieldValues": [
            { "CustomFieldTypeId": "f1", "Value": room_size },
            { "CustomFieldTypeId": "fX", "Value": "retired field" }
        ]
    })
}

fn team(id: &str) -> Value {
    json!({ "TeamId": id, "TeamName": format!("Team {id}"), "MembersCount": 2 })
}

async fn setup(dir: &TempDir) -> (DatabaseConnection, Arc<dyn PersistenceGateway>) {
    let url = format!("sqlite://{}", dir.path().join("iiq.db").display());
    let connection = DatabaseConnection::new(&url, 2).await.unwrap();
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(SqlGateway::new(&connection, &DestinationConfig::default()));
    (connection, gateway)
}

fn runner(provider: Provider, catalog: Catalog, gateway: Arc<dyn PersistenceGateway>) -> SyncRunner {
    SyncRunner::new(
        Arc::new(provider),
        CustomFieldSchemaBuilder::new(Arc::new(catalog)),
        Arc::clone(&gateway),
        SyncOrchestrator::new(
            gateway,
            OrchestratorSettings {
                worker_count: 2,
                string_length: 4000,
            },
        ),
    )
}

async fn count(connection: &DatabaseConnection, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(connection.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn syncs_pages_and_custom_fields_into_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let (connection, gateway) = setup(&dir).await;

    let provider = Provider(HashMap::from([
        (
            EntityKind::Asset,
            Arc::new(CannedPages {
                kind: EntityKind::Asset,
                pages: vec![
                    Ok(vec![asset("a1", "0001", "Large"), asset("a2", "0002", "")]),
                    Err(FetchError::Status { status: 500 }),
                    Ok(vec![asset("a5", "0005", "Small")]),
                ],
            }),
        ),
        (
            EntityKind::Team,
            Arc::new(CannedPages {
                kind: EntityKind::Team,
                pages: vec![Ok(vec![team("t1"), team("t2")])],
            }),
        ),
    ]));
    let catalog = Catalog(HashMap::from([(
        EntityKind::Asset,
        vec![("f1", "Room Size"), ("f2", "Purchase Order")],
    )]));

    let run = runner(provider, catalog, gateway)
        .run(&[EntityKind::Team, EntityKind::Asset])
        .await;

    assert_eq!(run.exit_code(), 0);
    let assets = run.get(EntityKind::Asset).unwrap();
    assert_eq!(assets.status(), SyncStatus::PartialFailure);
    assert_eq!(assets.pages_committed, 2);
    assert_eq!(assets.records_committed, 3);
    assert_eq!(assets.custom_records_committed, 3);
    assert_eq!(assets.unknown_custom_fields, 3);
    assert_eq!(assets.page_failures[0].page, 1);
    assert_eq!(assets.page_failures[0].error_kind, SyncErrorKind::PageFetch);
    assert_eq!(run.get(EntityKind::Team).unwrap().status(), SyncStatus::Success);

    assert_eq!(count(&connection, "Assets").await, 3);
    assert_eq!(count(&connection, "AssetCustomFields").await, 3);
    assert_eq!(count(&connection, "Teams").await, 2);

    let room_size: Option<String> =
        sqlx::query_scalar("SELECT \"RoomSize\" FROM \"AssetCustomFields\" WHERE \"AssetId\" = 'a2'")
            .fetch_one(connection.pool())
            .await
            .unwrap();
    assert_eq!(room_size, None);

    let model: Option<String> = sqlx::query_scalar("SELECT \"ModelName\" FROM \"Assets\" WHERE \"AssetId\" = 'a1'")
        .fetch_one(connection.pool())
        .await
        .unwrap();
    assert_eq!(model.as_deref(), Some("Latitude 3190"));
}

#[tokio::test]
async fn reruns_replace_previous_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (connection, gateway) = setup(&dir).await;

    for _ in 0..2 {
        let provider = Provider(HashMap::from([(
            EntityKind::Team,
            Arc::new(CannedPages {
                kind: EntityKind::Team,
                pages: vec![Ok(vec![team("t1")]), Ok(vec![team("t2")])],
            }),
        )]));
        let run = runner(provider, Catalog(HashMap::new()), Arc::clone(&gateway))
            .run(&[EntityKind::Team])
            .await;
        assert_eq!(run.exit_code(), 0);
    }

    assert_eq!(count(&connection, "Teams").await, 2);
}

#[tokio::test]
async fn colliding_custom_field_names_fail_the_kind_before_any_page() {
    let dir = tempfile::tempdir().unwrap();
    let (connection, gateway) = setup(&dir).await;

    let provider = Provider(HashMap::from([(
        EntityKind::Asset,
        Arc::new(CannedPages {
            kind: EntityKind::Asset,
            pages: vec![Ok(vec![asset("a1", "0001", "Large")])],
        }),
    )]));
    let catalog = Catalog(HashMap::from([(
        EntityKind::Asset,
        vec![("f1", "Room Size"), ("f2", "Room Size")],
    )]));

    let run = runner(provider, catalog, gateway).run(&[EntityKind::Asset]).await;

    assert_eq!(run.exit_code(), 1);
    let report = run.get(EntityKind::Asset).unwrap();
    assert_eq!(report.pages_attempted, 0);
    assert_eq!(
        report.fatal.as_ref().map(|f| f.error_kind),
        Some(SyncErrorKind::SchemaDiscovery)
    );
    assert_eq!(count(&connection, "Assets").await, 0);
    let summary = assert_ok!(serde_json::to_value(&run));
    assert_eq!(summary["reports"][0]["kind"], "asset");
}
