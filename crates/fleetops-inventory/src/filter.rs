//! Node selection filters

use crate::types::{Inventory, NodeRecord};

/// Filter for selecting a subset of the fleet
///
/// Empty lists match everything. Role and environment comparisons ignore
/// ASCII case; excluded hostnames must match exactly.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Only include nodes with one of these roles
    pub roles: Vec<String>,
    /// Only include nodes in one of these environments
    pub environments: Vec<String>,
    /// Exclude these specific hosts
    pub exclude: Vec<String>,
}

impl NodeFilter {
    /// Whether the filter selects every node
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.environments.is_empty() && self.exclude.is_empty()
    }

    /// Check whether a node passes the filter
    #[must_use]
    pub fn matches(&self, node: &NodeRecord) -> bool {
        if self.exclude.iter().any(|h| h == &node.hostname) {
            return false;
        }
        if !self.roles.is_empty() && !self.roles.iter().any(|r| r.eq_ignore_ascii_case(&node.role))
        {
            return false;
        }
        if !self.environments.is_empty()
            && !self
                .environments
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&node.environment))
        {
            return false;
        }
        true
    }
}

impl Inventory {
    /// Return a new inventory holding only the nodes that pass `filter`
    #[must_use]
    pub fn filter(&self, filter: &NodeFilter) -> Inventory {
        self.iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect()
    }
}
