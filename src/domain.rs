//! Domain module - entity kinds, records and the service seams
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod custom_fields;
pub mod entity_kind;
pub mod field_map;
pub mod record;
pub mod repositories;
pub mod services;
pub mod value_path;

pub use custom_fields::{CustomFieldDefinition, CustomFieldRecord, SchemaDefinition, SchemaError};
pub use entity_kind::EntityKind;
pub use field_map::RecordMapper;
pub use record::{ColumnType, ColumnValue, MappingError, Record, RecordTarget, ValueSanitizer};
pub use repositories::{PersistenceError, PersistenceGateway, UnitOfWork};
pub use services::{
    CustomFieldEntry, CustomFieldSource, FetchError, PageResponse, PagedResource,
    PagedResourceProvider, Paging,
};
