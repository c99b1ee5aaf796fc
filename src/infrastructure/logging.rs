//! Logging system configuration and initialization
//!
//! - console and/or file output (`tracing-appender` non-blocking writer)
//! - optional JSON formatting
//! - `RUST_LOG` overrides the configured level
//! - verbose dependency targets are held at `warn` unless the level is `trace`

use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Targets that are only interesting at `trace`
const QUIET_TARGETS: &[&str] = &[
    "sqlx::query=warn",
    "sqlx::postgres=warn",
    "sqlx::sqlite=warn",
    "reqwest=warn",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "rustls=warn",
];

/// Builds the filter used when `RUST_LOG` is not set
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;

    if !level.to_lowercase().contains("trace") {
        for directive in QUIET_TARGETS {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    Ok(filter)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_env_filter(&config.level)?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        std::fs::create_dir_all(&config.log_directory).with_context(|| {
            format!("Failed to create log directory {:?}", config.log_directory)
        })?;

        let file_appender = rolling::daily(&config.log_directory, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard registry poisoned"))?
            .push(file_guard);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .with_ansi(false);
        layers.push(if config.json_format {
            file_layer.json().with_current_span(false).boxed()
        } else {
            file_layer.with_target(false).boxed()
        });
    }

    if config.console_output {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .with_target(false);
        layers.push(if config.json_format {
            console_layer.json().boxed()
        } else {
            console_layer.boxed()
        });
    }

    if layers.is_empty() {
        return Err(anyhow!("No logging output configured"));
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    info!(
        "Logging initialized (level: {}, json: {}, console: {}, file: {})",
        config.level, config.json_format, config.console_output, config.file_output
    );
    if config.file_output {
        info!("Log directory: {:?}", config.log_directory);
    }
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== IncidentIQ Sync System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("==========================================");
}
