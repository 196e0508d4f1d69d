use std::collections::{HashMap, HashSet};

/// Per-store cache of schema known to exist: table name to the set of
/// attribute groups seen this process.
///
/// Entries are a superset-or-equal approximation of the engine's actual
/// schema. They are never evicted, so a table or column dropped outside this
/// process leaves a stale entry and later writes fail at the engine. That
/// staleness is an accepted part of the contract, not something the registry
/// detects.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, HashSet<String>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_known(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn group_known(&self, table: &str, group: &str) -> bool {
        self.tables.get(table).is_some_and(|groups| groups.contains(group))
    }

    /// Marks a table seen, with no attribute groups yet.
    pub fn mark_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn mark_group(&mut self, table: &str, group: &str) {
        self.tables.entry(table.to_string()).or_default().insert(group.to_string());
    }
}
