//! Database models.
//!
//! One row type per table. Resource rows carry their scope and are written
//! only by collectors; link rows are written only by the linker.

pub mod housekeeper_run;
pub mod instance;
pub mod link;
pub mod network;
pub mod subnet;

pub use housekeeper_run::HousekeeperRunDbModel;
pub use instance::InstanceRecord;
pub use link::LinkRecord;
pub use network::NetworkRecord;
pub use subnet::SubnetRecord;
