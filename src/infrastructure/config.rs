//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. `config/default.toml` next to the working directory (optional)
//! 2. an explicit file passed on the command line
//! 3. `IIQ_SYNC__*` environment variables (`IIQ_SYNC__SOURCE__TOKEN`, ...)

use std::fmt;
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::EntityKind;
use crate::domain::custom_fields::is_valid_identifier;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// IncidentIQ instance and request settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Instance host, e.g. `district.incidentiq.com`
    pub instance: String,
    /// API bearer token
    pub token: String,
    /// Items requested per page
    pub page_size: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("instance", &self.instance)
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// sqlx connection string (`sqlite://...` or `postgres://...`)
    pub connection_string: String,
    /// Schema (namespace) for all tables; ignored by SQLite
    pub schema: Option<String>,
    /// Width of string columns; longer values are truncated
    pub string_length: usize,
    pub tables: TableNames,
}

/// Destination table name per entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub assets: String,
    pub asset_custom_fields: String,
    pub users: String,
    pub user_custom_fields: String,
    pub locations: String,
    pub tickets: String,
    pub ticket_custom_fields: String,
    pub rooms: String,
    pub teams: String,
}

impl TableNames {
    pub fn entity_table(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Asset => &self.assets,
            EntityKind::User => &self.users,
            EntityKind::Location => &self.locations,
            EntityKind::Ticket => &self.tickets,
            EntityKind::Room => &self.rooms,
            EntityKind::Team => &self.teams,
        }
    }

    pub fn custom_table(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Asset => Some(&self.asset_custom_fields),
            EntityKind::User => Some(&self.user_custom_fields),
            EntityKind::Ticket => Some(&self.ticket_custom_fields),
            EntityKind::Location | EntityKind::Room | EntityKind::Team => None,
        }
    }

    fn all(&self) -> impl Iterator<Item = &str> {
        EntityKind::ALL.into_iter().flat_map(move |kind| {
            std::iter::once(self.entity_table(kind)).chain(self.custom_table(kind))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pages in flight per entity kind; also the destination pool size
    pub workers: usize,
    /// Kinds to sync, in order
    pub entity_kinds: Vec<EntityKind>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_directory: PathBuf,
    pub file_name: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            token: String::new(),
            page_size: defaults::PAGE_SIZE,
            timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            connection_string: defaults::CONNECTION_STRING.to_string(),
            schema: None,
            string_length: defaults::STRING_LENGTH,
            tables: TableNames::default(),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        let custom = |kind: EntityKind| kind.default_custom_table_name().unwrap_or_default().to_string();
        Self {
            assets: EntityKind::Asset.default_table_name().to_string(),
            asset_custom_fields: custom(EntityKind::Asset),
            users: EntityKind::User.default_table_name().to_string(),
            user_custom_fields: custom(EntityKind::User),
            locations: EntityKind::Location.default_table_name().to_string(),
            tickets: EntityKind::Ticket.default_table_name().to_string(),
            ticket_custom_fields: custom(EntityKind::Ticket),
            rooms: EntityKind::Room.default_table_name().to_string(),
            teams: EntityKind::Team.default_table_name().to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            entity_kinds: EntityKind::ALL.to_vec(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_directory: PathBuf::from(defaults::LOG_DIRECTORY),
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(defaults::ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("sync.entity_kinds")
}

/// Command line values that take precedence over every configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub entity_kinds: Vec<EntityKind>,
}

impl AppConfig {
    /// Loads defaults, the optional `path` and the environment.
    ///
    /// Not validated yet: call [`AppConfig::validate`] once overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(File::with_name(defaults::BASE_CONFIG_FILE).required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::from_builder(builder.add_source(environment()))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(workers) = overrides.workers {
            self.sync.workers = workers;
        }
        if !overrides.entity_kinds.is_empty() {
            self.sync.entity_kinds = overrides.entity_kinds;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| Err(ConfigError::Validation { message });

        if self.source.instance.trim().is_empty() {
            return fail("source.instance must be set".to_string());
        }
        if self.source.token.trim().is_empty() {
            return fail("source.token must be set".to_string());
        }
        if self.source.page_size == 0 {
            return fail("source.page_size must be greater than 0".to_string());
        }
        if self.source.timeout_secs == 0 {
            return fail("source.timeout_secs must be greater than 0".to_string());
        }
        if self.sync.workers == 0 {
            return fail("sync.workers must be greater than 0".to_string());
        }
        if self.sync.entity_kinds.is_empty() {
            return fail("sync.entity_kinds must name at least one kind".to_string());
        }
        if self.destination.connection_string.trim().is_empty() {
            return fail("destination.connection_string must be set".to_string());
        }
        if self.destination.string_length < 2 {
            return fail(format!(
                "destination.string_length must be at least 2, got {}",
                self.destination.string_length
            ));
        }
        if let Some(schema) = &self.destination.schema {
            if !is_valid_identifier(schema) {
                return fail(format!("destination.schema '{}' is not a valid identifier", schema));
            }
        }
        if let Some(table) = self.destination.tables.all().find(|t| !is_valid_identifier(t)) {
            return fail(format!("table name '{}' is not a valid identifier", table));
        }

        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const BASE_CONFIG_FILE: &str = "config/default";

    pub const ENV_PREFIX: &str = "IIQ_SYNC";

    /// Matches the page size the IncidentIQ web client uses
    pub const PAGE_SIZE: u32 = 1000;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 120;

    pub const WORKERS: usize = 4;

    pub const CONNECTION_STRING: &str = "sqlite://incidentiq.db";

    /// Smallest VARCHAR width shared by the supported databases
    pub const STRING_LENGTH: usize = 4000;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_DIRECTORY: &str = "logs";

    pub const LOG_FILE_NAME: &str = "iiq-sync.log";
}
