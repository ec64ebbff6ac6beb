//! Table and column selection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::schema::ColumnCache;

/// What a table toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableToggle {
    Removed,
    Added,
}

/// Selected tables (in selection order) and the selected columns per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    tables: Vec<String>,
    columns: BTreeMap<String, Vec<String>>,
}

impl SelectionState {
    /// Selection for the flat-file flow, where the file is always selected
    pub fn for_table(table: &str) -> Self {
        Self {
            tables: vec![table.to_string()],
            columns: BTreeMap::new(),
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<String>> {
        &self.columns
    }

    pub fn columns_for(&self, table: &str) -> &[String] {
        self.columns.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_selected(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// At least one table has a non-empty column selection
    pub fn has_any_column(&self) -> bool {
        self.columns.values().any(|cols| !cols.is_empty())
    }

    /// Select an unselected table, or deselect a selected one and forget its
    /// columns.
    pub fn toggle_table(&self, table: &str) -> (Self, TableToggle) {
        let mut next = self.clone();
        if self.is_selected(table) {
            next.tables.retain(|t| t != table);
            next.columns.remove(table);
            (next, TableToggle::Removed)
        } else {
            next.tables.push(table.to_string());
            (next, TableToggle::Added)
        }
    }

    /// Add or remove one column of `table`.
    ///
    /// When the table has discovered columns, a name outside that list is a
    /// validation error. An undiscovered table gets an entry created on
    /// demand.
    pub fn toggle_column(
        &self,
        cache: &ColumnCache,
        table: &str,
        column: &str,
        selected: bool,
    ) -> Result<Self> {
        if let Some(known) = cache.get(table) {
            if !known.iter().any(|c| c == column) {
                return Err(CoreError::Validation(format!(
                    "table '{}' has no column '{}'",
                    table, column
                )));
            }
        }

        let mut next = self.clone();
        let entry = next.columns.entry(table.to_string()).or_default();
        if selected {
            if !entry.iter().any(|c| c == column) {
                entry.push(column.to_string());
            }
        } else {
            entry.retain(|c| c != column);
        }
        Ok(next)
    }

    /// Keep only the selected tables that are still `available`
    pub fn retained_in(&self, available: &[String]) -> Self {
        let mut next = self.clone();
        next.tables.retain(|t| available.contains(t));
        next.columns.retain(|t, _| available.contains(t));
        next
    }
}
