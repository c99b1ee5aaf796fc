// Database connection and pool management
// One sqlx Any pool serves both SQLite and PostgreSQL destinations

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use sqlx::AnyPool;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use tracing::info;

use super::table_ddl::Dialect;

pub struct DatabaseConnection {
    pool: AnyPool,
    dialect: Dialect,
}

/// File path of a SQLite connection string, `None` for in-memory databases
fn sqlite_file(database_url: &str) -> Option<&str> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path == ":memory:" || database_url.contains("mode=memory") {
        None
    } else {
        Some(path)
    }
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        install_default_drivers();

        let dialect = Dialect::from_connection_string(database_url)
            .ok_or_else(|| anyhow!("unsupported destination database in '{}'", database_url))?;

        if dialect == Dialect::Sqlite {
            if let Some(db_path) = sqlite_file(database_url) {
                let db_path = Path::new(db_path);
                if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {:?}", parent))?;
                }
                if !db_path.exists() {
                    tokio::fs::File::create(db_path)
                        .await
                        .with_context(|| format!("Failed to create database file {:?}", db_path))?;
                }
            }
        }

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(120))
            .connect(database_url)
            .await
            .context("Failed to connect to the destination database")?;

        info!("🗄️ Connected to {:?} destination (pool size {})", dialect, max_connections.max(1));
        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }
}
