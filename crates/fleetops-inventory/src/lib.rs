//! fleetops-inventory: node inventory
//!
//! Node records, the `hostname:address:role:environment` loader and
//! filters for selecting a subset of the fleet.

pub mod error;
pub mod filter;
pub mod loader;
pub mod types;

pub use error::InventoryError;
pub use filter::NodeFilter;
pub use types::{Inventory, NodeRecord};
