//! Error types for fleetops-inventory

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading an inventory
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("failed to read inventory {path}: {source}")]
    Read {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A line did not match `hostname:address:role:environment`
    #[error("malformed inventory line {line}: {reason}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },
}
