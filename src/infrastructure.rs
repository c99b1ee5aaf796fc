//! Infrastructure layer for configuration, logging, HTTP and database access
//!
//! Concrete implementations of the domain traits live here: the IncidentIQ HTTP
//! resources and the sqlx persistence gateway.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod iiq_api;
pub mod logging;
pub mod sql_gateway;
pub mod table_ddl;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoggingConfig};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClientConfig, IiqClient};
pub use iiq_api::{HttpCustomFieldSource, HttpPagedResource, IiqResourceProvider};
pub use logging::{init_logging_with_config, log_system_info};
pub use sql_gateway::SqlGateway;
pub use table_ddl::{Dialect, TableLayout};
