//! Source-side service traits
//!
//! The sync engine only talks to IncidentIQ through these traits, so the
//! orchestrator can be driven by in-memory fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::entity_kind::EntityKind;

/// Paging block returned alongside every page of items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(rename = "PageSize")]
    pub page_size: i64,
    #[serde(rename = "PageCount")]
    pub page_count: i64,
    #[serde(rename = "TotalRows", default)]
    pub total_rows: Option<i64>,
}

/// One decoded page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(rename = "Items")]
    pub items: Vec<Value>,
    #[serde(rename = "Paging")]
    pub paging: Paging,
}

/// Why a source request did not produce usable data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("response contained no items")]
    EmptyPage,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// One paginated endpoint of one entity kind
#[async_trait]
pub trait PagedResource: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Fetches page `page` (zero-based).
    ///
    /// Implementations must return [`FetchError::Status`] for non-success responses
    /// and [`FetchError::EmptyPage`] for a payload without items.
    async fn fetch_page(&self, page: u32) -> Result<PageResponse, FetchError>;

    /// Total number of pages, read from page 0 of the real query
    async fn page_count(&self) -> Result<u32, FetchError> {
        let first = self.fetch_page(0).await?;
        match u32::try_from(first.paging.page_count) {
            Ok(0) | Err(_) => Err(FetchError::EmptyPage),
            Ok(count) => Ok(count),
        }
    }
}

/// Resolves the paged resource for an entity kind
pub trait PagedResourceProvider: Send + Sync {
    fn resource(&self, kind: EntityKind) -> Arc<dyn PagedResource>;
}

/// Raw catalog entry as the source lists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldEntry {
    pub field_id: String,
    pub field_name: String,
}

#[async_trait]
pub trait CustomFieldSource: Send + Sync {
    async fn list_custom_fields(&self, kind: EntityKind) -> Result<Vec<CustomFieldEntry>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedPaging(i64);

    #[async_trait]
    impl PagedResource for FixedPaging {
        fn kind(&self) -> EntityKind {
            EntityKind::Team
        }

        async fn fetch_page(&self, _page: u32) -> Result<PageResponse, FetchError> {
            Ok(PageResponse {
                items: vec![json!({ "TeamId": "t" })],
                paging: Paging {
                    page_size: 1,
                    page_count: self.0,
                    total_rows: None,
                },
            })
        }
    }

    #[tokio::test]
    async fn page_count_reads_the_first_page_paging_block() {
        assert_eq!(FixedPaging(7).page_count().await, Ok(7));
        assert_eq!(FixedPaging(0).page_count().await, Err(FetchError::EmptyPage));
        assert_eq!(FixedPaging(-1).page_count().await, Err(FetchError::EmptyPage));
    }

    #[test]
    fn decodes_incidentiq_envelope() {
        let page: PageResponse = serde_json::from_value(json!({
            "Items": [{ "TeamId": "a" }, { "TeamId": "b" }],
            "Paging": { "PageSize": 2, "PageCount": 4, "TotalRows": 8, "PageIndex": 0 }
        }))
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.paging.page_count, 4);
        assert_eq!(page.paging.total_rows, Some(8));
    }
}
