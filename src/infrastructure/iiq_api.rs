//! IncidentIQ endpoints behind the paged resource and custom field traits

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use super::http_client::IiqClient;
use crate::domain::value_path::{lookup, lookup_str};
use crate::domain::{
    CustomFieldEntry, CustomFieldSource, EntityKind, FetchError, PageResponse, PagedResource, PagedResourceProvider,
};

/// Page size used for the custom field catalog so it arrives in a single call
const CATALOG_PAGE_SIZE: u32 = 999_999;

const CATALOG_PATH: &str = "api/v1.0/custom-fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
        }
    }
}

/// Request body sent with every page of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBody {
    None,
    EmptyObject,
    /// Live items the token is allowed to see
    VisibleItems,
}

impl RequestBody {
    pub fn to_json(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::EmptyObject => Some(json!({})),
            Self::VisibleItems => Some(json!({
                "OnlyShowDeleted": false,
                "FilterByViewPermission": true
            })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub verb: Verb,
    pub path: &'static str,
    /// Ordering parameters appended after `$p` and `$s`
    pub ordering: &'static str,
    pub body: RequestBody,
}

impl Endpoint {
    pub fn query(&self, page: u32, page_size: u32) -> String {
        if self.ordering.is_empty() {
            format!("$p={page}&$s={page_size}")
        } else {
            format!("$p={page}&$s={page_size}&{}", self.ordering)
        }
    }
}

pub const fn endpoint(kind: EntityKind) -> Endpoint {
    match kind {
        EntityKind::Asset => Endpoint {
            verb: Verb::Post,
            path: "api/v1.0/assets/",
            ordering: "$d=Ascending&$o=AssetTag",
            body: RequestBody::VisibleItems,
        },
        EntityKind::User => Endpoint {
            verb: Verb::Post,
            path: "api/v1.0/users",
            ordering: "$o=FullName&$d=Ascending",
            body: RequestBody::EmptyObject,
        },
        EntityKind::Location => Endpoint {
            verb: Verb::Get,
            path: "api/v1.0/locations",
            ordering: "",
            body: RequestBody::None,
        },
        EntityKind::Ticket => Endpoint {
            verb: Verb::Post,
            path: "api/v1.0/tickets",
            ordering: "$d=Descending&$o=TicketCreatedDate",
            body: RequestBody::VisibleItems,
        },
        EntityKind::Room => Endpoint {
            verb: Verb::Get,
            path: "api/v1.0/locations/rooms",
            ordering: "$d=Descending",
            body: RequestBody::None,
        },
        EntityKind::Team => Endpoint {
            verb: Verb::Get,
            path: "api/v1.0/teams/all",
            ordering: "$d=Descending",
            body: RequestBody::None,
        },
    }
}

/// Decodes a page envelope; a page without items is [`FetchError::EmptyPage`]
pub fn parse_page(body: Value) -> Result<PageResponse, FetchError> {
    let page: PageResponse = serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if page.paging.page_size <= 0 || page.items.is_empty() {
        return Err(FetchError::EmptyPage);
    }
    Ok(page)
}

/// Decodes the custom field catalog into (id, display name) pairs
pub fn parse_custom_fields(body: &Value) -> Result<Vec<CustomFieldEntry>, FetchError> {
    let items = lookup(body, &["Items"])
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Decode("catalog response has no Items".to_string()))?;

    items
        .iter()
        .map(|item| {
            let field_id = lookup_str(item, &["CustomFieldTypeId"]);
            let field_name = lookup_str(item, &["CustomFieldType", "Name"]);
            match (field_id, field_name) {
                (Some(id), Some(name)) => Ok(CustomFieldEntry {
                    field_id: id.to_string(),
                    field_name: name.to_string(),
                }),
                _ => Err(FetchError::Decode(format!("catalog entry without id or name: {item}"))),
            }
        })
        .collect()
}

pub struct HttpPagedResource {
    kind: EntityKind,
    client: Arc<IiqClient>,
    page_size: u32,
}

impl HttpPagedResource {
    pub fn new(kind: EntityKind, client: Arc<IiqClient>, page_size: u32) -> Self {
        Self {
            kind,
            client,
            page_size,
        }
    }
}

#[async_trait]
impl PagedResource for HttpPagedResource {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn fetch_page(&self, page: u32) -> Result<PageResponse, FetchError> {
        let endpoint = endpoint(self.kind);
        let url = self.client.url(endpoint.path, &endpoint.query(page, self.page_size))?;
        let body = endpoint.body.to_json();
        let response = self.client.send(endpoint.verb.method(), url, body.as_ref()).await?;
        parse_page(response)
    }
}

pub struct HttpCustomFieldSource {
    client: Arc<IiqClient>,
}

impl HttpCustomFieldSource {
    pub fn new(client: Arc<IiqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CustomFieldSource for HttpCustomFieldSource {
    async fn list_custom_fields(&self, kind: EntityKind) -> Result<Vec<CustomFieldEntry>, FetchError> {
        let strategy = kind
            .custom_field_strategy()
            .ok_or_else(|| FetchError::Transport(format!("{kind} has no custom field catalog")))?;
        let url = self
            .client
            .url(CATALOG_PATH, &format!("$p=0&$s={CATALOG_PAGE_SIZE}"))?;
        let body = json!({ "SiteScope": "Aggregate", "Strategy": strategy });

        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        parse_custom_fields(&response)
    }
}

/// Hands out HTTP paged resources sharing one client
pub struct IiqResourceProvider {
    client: Arc<IiqClient>,
    page_size: u32,
}

impl IiqResourceProvider {
    pub fn new(client: Arc<IiqClient>, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

impl PagedResourceProvider for IiqResourceProvider {
    fn resource(&self, kind: EntityKind) -> Arc<dyn PagedResource> {
        Arc::new(HttpPagedResource::new(kind, Arc::clone(&self.client), self.page_size))
    }
}
