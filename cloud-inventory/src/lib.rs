//! cloud-inventory library crate.
//!
//! Collectors inventory provider resources per credential scope through a
//! task queue, the linker derives relationship tables from the collected
//! rows, and the housekeeper expires rows that stopped being refreshed.

pub mod clients;
pub mod collector;
pub mod config;
pub mod database;
pub mod error;
pub mod housekeeper;
pub mod linker;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod services;
pub mod task;

pub use error::{Error, Result};
