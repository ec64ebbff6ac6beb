//! Schema discovery cache
//!
//! Column lists are fetched lazily per table and kept for the rest of the
//! session; a table is never fetched twice unless the whole cache is reset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Table identifier used for the uploaded file in the flat-file flow
pub const FILE_TABLE: &str = "file";

/// Table identifier → ordered column names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnCache {
    entries: HashMap<String, Vec<String>>,
}

impl ColumnCache {
    /// A cache holding only the uploaded file's columns
    pub fn for_file(columns: Vec<String>) -> Self {
        let mut cache = Self::default();
        cache.entries.insert(FILE_TABLE.to_string(), columns);
        cache
    }

    pub fn get(&self, table: &str) -> Option<&[String]> {
        self.entries.get(table).map(Vec::as_slice)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entries.contains_key(table)
    }

    /// Record a discovery result; an existing entry is kept as is
    pub fn with_entry(&self, table: &str, columns: Vec<String>) -> Self {
        let mut next = self.clone();
        next.entries.entry(table.to_string()).or_insert(columns);
        next
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether selecting `table` needs a column lookup first
pub fn needs_lookup(cache: &ColumnCache, table: &str) -> bool {
    !cache.contains(table)
}
