//! Group-scoped index access.

use std::collections::BTreeMap;

/// Maps group ids to the indexes their members may query.
#[derive(Debug, Clone, Default)]
pub struct IndexAccess {
    map: BTreeMap<String, Vec<String>>,
}

impl IndexAccess {
    pub fn new(map: BTreeMap<String, Vec<String>>) -> Self {
        Self { map }
    }

    /// Union of the indexes granted to each group, in first-seen order.
    ///
    /// Unknown groups grant nothing.
    pub fn allowed_indexes(&self, groups: &[String]) -> Vec<String> {
        let mut allowed: Vec<String> = Vec::new();
        for index in groups.iter().filter_map(|g| self.map.get(g)).flatten() {
            if !allowed.contains(index) {
                allowed.push(index.clone());
            }
        }
        allowed
    }
}
