//! Inventory type definitions

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single managed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique hostname identifier
    pub hostname: String,
    /// IP address or DNS name used to reach the node
    pub address: String,
    /// Role of the node (webserver, database, application, ...)
    pub role: String,
    /// Environment the node belongs to (production, staging, ...)
    pub environment: String,
}

impl NodeRecord {
    /// Create a new node record
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        role: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            role: role.into(),
            environment: environment.into(),
        }
    }
}

impl std::fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) [{}/{}]",
            self.hostname, self.address, self.role, self.environment
        )
    }
}

/// Ordered collection of nodes keyed by hostname
///
/// Inserting a hostname that is already present replaces the earlier record
/// in place, so the last definition wins while the original position is kept.
/// Serialized as a plain list of records; deserializing goes through
/// [`Inventory::insert`] so duplicates collapse the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<NodeRecord>", into = "Vec<NodeRecord>")]
pub struct Inventory {
    nodes: Vec<NodeRecord>,
}

impl Inventory {
    /// Create an empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any earlier node with the same hostname
    ///
    /// Returns the replaced record, if any.
    pub fn insert(&mut self, node: NodeRecord) -> Option<NodeRecord> {
        if let Some(existing) = self
            .nodes
            .iter_mut()
            .find(|n| n.hostname == node.hostname)
        {
            warn!(host = %node.hostname, "duplicate hostname in inventory, last definition wins");
            return Some(std::mem::replace(existing, node));
        }
        self.nodes.push(node);
        None
    }

    /// Look up a node by hostname
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.hostname == hostname)
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the inventory has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over nodes in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, NodeRecord> {
        self.nodes.iter()
    }

    /// All hostnames in insertion order
    #[must_use]
    pub fn hostnames(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.hostname.as_str()).collect()
    }
}

impl From<Vec<NodeRecord>> for Inventory {
    fn from(nodes: Vec<NodeRecord>) -> Self {
        nodes.into_iter().collect()
    }
}

impl From<Inventory> for Vec<NodeRecord> {
    fn from(inventory: Inventory) -> Self {
        inventory.nodes
    }
}

impl FromIterator<NodeRecord> for Inventory {
    fn from_iter<I: IntoIterator<Item = NodeRecord>>(iter: I) -> Self {
        let mut inventory = Inventory::new();
        for node in iter {
            inventory.insert(node);
        }
        inventory
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a NodeRecord;
    type IntoIter = std::slice::Iter<'a, NodeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl IntoIterator for Inventory {
    type Item = NodeRecord;
    type IntoIter = std::vec::IntoIter<NodeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_last_definition_wins() {
        let mut inventory = Inventory::new();
        inventory.insert(NodeRecord::new("web1", "10.0.0.1", "webserver", "production"));
        inventory.insert(NodeRecord::new("db1", "10.0.0.2", "database", "production"));
        let replaced =
            inventory.insert(NodeRecord::new("web1", "10.0.0.9", "webserver", "staging"));

        assert_eq!(inventory.len(), 2);
        assert_eq!(replaced.unwrap().address, "10.0.0.1");
        assert_eq!(inventory.get("web1").unwrap().address, "10.0.0.9");
        assert_eq!(inventory.hostnames(), vec!["web1", "db1"]);
    }

    #[test]
    fn test_from_iter_dedupes() {
        let inventory: Inventory = vec![
            NodeRecord::new("a", "1", "app", "dev"),
            NodeRecord::new("a", "2", "app", "dev"),
        ]
        .into_iter()
        .collect();

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.get("a").unwrap().address, "2");
    }

    #[test]
    fn test_empty_inventory() {
        let inventory = Inventory::new();
        assert!(inventory.is_empty());
        assert_eq!(inventory.iter().count(), 0);
    }

    #[test]
    fn test_serde_roundtrip_keeps_order() {
        let inventory: Inventory = vec![
            NodeRecord::new("z", "1", "app", "dev"),
            NodeRecord::new("a", "2", "app", "dev"),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&inventory).unwrap();
        let back: Inventory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hostnames(), vec!["z", "a"]);
    }

    #[test]
    fn test_deserialize_collapses_duplicate_hostnames() {
        let json = r#"[
            {"hostname": "web1", "address": "10.0.0.1", "role": "webserver", "environment": "production"},
            {"hostname": "db1", "address": "10.0.0.2", "role": "database", "environment": "production"},
            {"hostname": "web1", "address": "10.0.0.9", "role": "webserver", "environment": "staging"}
        ]"#;

        let inventory: Inventory = serde_json::from_str(json).unwrap();

        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.hostnames(), vec!["web1", "db1"]);
        assert_eq!(inventory.get("web1").unwrap().address, "10.0.0.9");
    }
}
