//! Group display name to numeric id associations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category name -> group display name -> numeric group id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct GroupAssociations(pub BTreeMap<String, BTreeMap<String, u32>>);

impl GroupAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category, keeping any groups already recorded for it.
    pub fn category_mut(&mut self, category: &str) -> &mut BTreeMap<String, u32> {
        self.0.entry(category.to_string()).or_default()
    }

    /// Find a group id by display name across all categories.
    pub fn find(&self, group_name: &str) -> Option<u32> {
        self.0
            .values()
            .find_map(|groups| groups.get(group_name).copied())
    }

    pub fn category_count(&self) -> usize {
        self.0.len()
    }

    pub fn group_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }
}
