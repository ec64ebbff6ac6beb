//! Join specification for multi-table selections
//!
//! Conditions are opaque strings handed to the backend verbatim. The list
//! only ever grows: deselecting tables keeps the trailing conditions around,
//! and they come back into use when enough tables are selected again.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinType {
    #[default]
    #[serde(rename = "INNER JOIN", alias = "inner", alias = "INNER")]
    Inner,
    #[serde(rename = "LEFT JOIN", alias = "left", alias = "LEFT")]
    Left,
    #[serde(rename = "RIGHT JOIN", alias = "right", alias = "RIGHT")]
    Right,
    #[serde(rename = "FULL JOIN", alias = "full", alias = "FULL")]
    Full,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

impl std::str::FromStr for JoinType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.trim_end_matches(" JOIN") {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL" => Ok(JoinType::Full),
            _ => Err(format!("unsupported join type '{}'", s)),
        }
    }
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of join conditions needed to chain `table_count` tables
pub fn required_slots(table_count: usize) -> usize {
    table_count.saturating_sub(1)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub join_type: JoinType,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl JoinSpec {
    /// Pad with empty conditions until `table_count` tables can be chained.
    ///
    /// Never truncates and never touches existing entries.
    pub fn grown_for(&self, table_count: usize) -> Self {
        let mut next = self.clone();
        let required = required_slots(table_count);
        while next.conditions.len() < required {
            next.conditions.push(String::new());
        }
        next
    }

    pub fn with_join_type(&self, join_type: JoinType) -> Self {
        Self {
            join_type,
            conditions: self.conditions.clone(),
        }
    }

    /// Replace exactly one condition slot
    pub fn with_condition_at(&self, index: usize, value: impl Into<String>) -> Result<Self> {
        if index >= self.conditions.len() {
            return Err(CoreError::Validation(format!(
                "join condition {} does not exist ({} slots)",
                index + 1,
                self.conditions.len()
            )));
        }
        let mut next = self.clone();
        next.conditions[index] = value.into();
        Ok(next)
    }
}
