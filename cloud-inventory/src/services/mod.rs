//! Service layer module.
//!
//! [`Bootstrap`] is the single registration table for collectors, the
//! linker and the housekeeper; [`ServiceContainer`] is what it builds.

pub mod container;

pub use container::{Bootstrap, ServiceContainer};
