//! Line-oriented inventory loader
//!
//! Each record is one line of the form `hostname:address:role:environment`.
//! Blank lines and lines starting with `#` are ignored.
//!
//! `:` is the field separator, so an address cannot carry a port suffix
//! (`10.0.0.1:2222`) or be an IPv6 literal. Such lines are rejected as
//! malformed; every node is reached on the configured `ssh.port`.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::InventoryError;
use crate::types::{Inventory, NodeRecord};

const FIELD_COUNT: usize = 4;

/// Parse a single non-comment line
fn parse_line(line_no: usize, line: &str) -> Result<NodeRecord, InventoryError> {
    let fields: Vec<&str> = line.split(':').map(str::trim).collect();

    if fields.len() != FIELD_COUNT {
        return Err(InventoryError::Malformed {
            line: line_no,
            reason: format!(
                "expected {FIELD_COUNT} fields (hostname:address:role:environment), found {}",
                fields.len()
            ),
        });
    }

    let names = ["hostname", "address", "role", "environment"];
    if let Some(idx) = fields.iter().position(|f| f.is_empty()) {
        return Err(InventoryError::Malformed {
            line: line_no,
            reason: format!("empty {} field", names[idx]),
        });
    }

    Ok(NodeRecord::new(fields[0], fields[1], fields[2], fields[3]))
}

impl Inventory {
    /// Parse inventory text
    ///
    /// # Errors
    /// Returns `InventoryError::Malformed` for the first line that does not
    /// have four non-empty fields.
    pub fn parse(content: &str) -> Result<Self, InventoryError> {
        let mut inventory = Inventory::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let node = parse_line(idx + 1, line)?;
            debug!(host = %node.hostname, address = %node.address, "parsed node");
            inventory.insert(node);
        }

        Ok(inventory)
    }

    /// Load an inventory file
    ///
    /// # Errors
    /// Returns `InventoryError::Read` if the file cannot be read, or
    /// `InventoryError::Malformed` if a line cannot be parsed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let inventory = Self::parse(&content)?;
        info!(nodes = inventory.len(), "loaded inventory");
        Ok(inventory)
    }
}
