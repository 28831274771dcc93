//! Repository layer.
//!
//! Traits describe what the orchestration code needs from storage; the
//! `Sqlx*` types implement them against SQLite.

pub mod housekeeping;
pub mod link;
pub mod resource;

pub use housekeeping::{HousekeepingRepository, SqlxHousekeepingRepository};
pub use link::{LinkRepository, SqlxLinkRepository};
pub use resource::{ParentSource, SqlxParentSource};
