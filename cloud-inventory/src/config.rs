//! Process configuration read from the environment.
//!
//! `.env` files are loaded by the binary through `dotenvy` before
//! [`InventoryConfig::from_env`] runs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::DEFAULT_QUEUE;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:inventory.db?mode=rwc";
pub const DEFAULT_COLLECT_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_LINK_INTERVAL_SECS: u64 = 15 * 60;
pub const DEFAULT_HOUSEKEEPING_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub database_url: String,
    /// Queue every task is submitted to.
    pub queue: String,
    /// Emit JSON logs instead of the human-readable format.
    pub log_json: bool,
    /// Also write daily-rolling log files here.
    pub log_dir: Option<PathBuf>,
    pub collect_interval: Duration,
    pub link_interval: Duration,
    pub housekeeping_interval: Duration,
    /// Default retention for housekeeper runs without a payload.
    pub retention: Duration,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            log_json: false,
            log_dir: None,
            collect_interval: Duration::from_secs(DEFAULT_COLLECT_INTERVAL_SECS),
            link_interval: Duration::from_secs(DEFAULT_LINK_INTERVAL_SECS),
            housekeeping_interval: Duration::from_secs(DEFAULT_HOUSEKEEPING_INTERVAL_SECS),
            retention: days(DEFAULT_RETENTION_DAYS),
        }
    }
}

impl InventoryConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            queue: get("INVENTORY_QUEUE").unwrap_or(defaults.queue),
            log_json: match get("INVENTORY_LOG_JSON") {
                Some(v) => parse_bool("INVENTORY_LOG_JSON", &v)?,
                None => defaults.log_json,
            },
            log_dir: get("INVENTORY_LOG_DIR").map(PathBuf::from),
            collect_interval: secs_or(
                get("COLLECT_INTERVAL_SECS"),
                "COLLECT_INTERVAL_SECS",
                defaults.collect_interval,
            )?,
            link_interval: secs_or(
                get("LINK_INTERVAL_SECS"),
                "LINK_INTERVAL_SECS",
                defaults.link_interval,
            )?,
            housekeeping_interval: secs_or(
                get("HOUSEKEEPING_INTERVAL_SECS"),
                "HOUSEKEEPING_INTERVAL_SECS",
                defaults.housekeeping_interval,
            )?,
            retention: match get("RETENTION_DAYS") {
                Some(v) => days(parse_number("RETENTION_DAYS", &v)?),
                None => defaults.retention,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Intervals must be non-zero; `tokio::time::interval` panics otherwise.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("COLLECT_INTERVAL_SECS", self.collect_interval),
            ("LINK_INTERVAL_SECS", self.link_interval),
            ("HOUSEKEEPING_INTERVAL_SECS", self.housekeeping_interval),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        if self.queue.trim().is_empty() {
            return Err(Error::config("INVENTORY_QUEUE must not be empty"));
        }
        Ok(())
    }
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(24 * 60 * 60))
}

fn secs_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match value {
        Some(v) => Ok(Duration::from_secs(parse_number(key, &v)?)),
        None => Ok(default),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("invalid {key} '{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("invalid {key} '{value}': expected a boolean"))),
    }
}
