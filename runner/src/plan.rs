//! Run plan: the answers an operator would give the wizard, read from a file

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use etl_wizard_core::config_store::ConfigStore;
use etl_wizard_core::domain::{ConnectionConfig, FileParseConfig, SourceKind};
use etl_wizard_core::join::{required_slots, JoinType};

/// One table to read, with the columns to take from it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TablePlan {
    pub name: String,
    /// Empty selects every column the backend reports
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JoinPlan {
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Everything needed to run one ingestion without prompting
#[derive(Debug, Clone, Deserialize)]
pub struct RunPlan {
    pub source: SourceKind,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub file: FileParseConfig,
    /// Local file to upload when reading from a file
    #[serde(default)]
    pub input: Option<PathBuf>,
    /// Tables are a list rather than a map so names keep their case
    #[serde(default)]
    pub tables: Vec<TablePlan>,
    /// File columns to ingest; empty selects all of them
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub join: Option<JoinPlan>,
    #[serde(default)]
    pub target_table: Option<String>,
}

impl RunPlan {
    /// Load a plan file, overlaid with `ETL_PLAN__*` environment variables
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("ETL_PLAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read run plan {}", path.display()))?;

        let plan: RunPlan = settings
            .try_deserialize()
            .with_context(|| format!("Invalid run plan {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        match self.source {
            SourceKind::Database => {
                if self.tables.is_empty() {
                    bail!("a database source needs at least one table");
                }
                if let Some(join) = &self.join {
                    let slots = required_slots(self.tables.len());
                    if join.conditions.len() > slots {
                        bail!(
                            "{} join conditions given for {} tables (at most {})",
                            join.conditions.len(),
                            self.tables.len(),
                            slots
                        );
                    }
                }
            }
            SourceKind::File => {
                if self.input.is_none() {
                    bail!("a file source needs an input file");
                }
                if self.target().is_none() {
                    bail!("a file source needs a target_table");
                }
            }
        }
        Ok(())
    }

    /// Destination table, if one was given
    pub fn target(&self) -> Option<&str> {
        self.target_table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore {
            connection: self.connection.clone(),
            file: self.file,
        }
    }
}
