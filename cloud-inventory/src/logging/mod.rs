//! Logging setup.
//!
//! Console output always, optionally as JSON, plus an optional daily-rolling
//! file. Timestamps use the local timezone.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::InventoryConfig;
use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "cloud_inventory=info,sqlx=warn";

/// File name prefix of the rolling log files.
const LOG_FILE_PREFIX: &str = "cloud-inventory.log";

/// Formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Explicit filter directive; `RUST_LOG` or [`DEFAULT_LOG_FILTER`] when unset.
    pub filter: Option<String>,
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

impl LoggingSettings {
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self {
            filter: None,
            json: config.log_json,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// Resolve the filter for `settings`.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match &settings.filter {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| Error::config(format!("Invalid filter directive: {}", e))),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
    }
}

/// Install the global subscriber.
///
/// When a log directory is configured the returned guard flushes the file
/// writer on drop and must be held for the life of the process.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(settings)?;

    let (json_layer, text_layer) = if settings.json {
        (Some(fmt::layer().json().with_timer(LocalTimer)), None)
    } else {
        (None, Some(fmt::layer().with_ansi(true).with_timer(LocalTimer)))
    };

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::config(format!("Failed to create log directory {}: {}", dir.display(), e))
            })?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {}", e)))?;

    Ok(guard)
}
