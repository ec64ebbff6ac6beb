//! Request payloads for preview and ingestion
//!
//! Both requests are pure functions of the wizard state. Each direction has
//! its own variant, so a database source never carries file fields and the
//! other way round.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ConnectionConfig, FileInfo, FileParseConfig, SourceKind};
use crate::error::{CoreError, Result};
use crate::join::JoinSpec;
use crate::schema::FILE_TABLE;
use crate::selection::SelectionState;
use crate::state::WizardState;

/// Database-as-source description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseSource {
    pub connection: ConnectionConfig,
    pub tables: Vec<String>,
    pub columns: BTreeMap<String, Vec<String>>,
    /// Present only when more than one table is selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_config: Option<JoinSpec>,
}

/// File-as-source description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSource {
    pub file_info: FileInfo,
    pub file_config: FileParseConfig,
    pub selected_columns: Vec<String>,
}

/// Body of `POST /preview-data`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PreviewRequest {
    Database(DatabaseSource),
    File(FileSource),
}

/// `source` member of `POST /start-ingestion`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum IngestionSource {
    #[serde(rename = "clickhouse")]
    Database(DatabaseSource),
    #[serde(rename = "file")]
    File(FileSource),
}

/// `target` member of `POST /start-ingestion`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum IngestionTarget {
    #[serde(rename = "file")]
    File { file_config: FileParseConfig },
    #[serde(rename = "clickhouse")]
    Database {
        connection: ConnectionConfig,
        target_table: String,
    },
}

/// Body of `POST /start-ingestion`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionRequest {
    pub source: IngestionSource,
    pub target: IngestionTarget,
}

pub fn database_source(
    connection: &ConnectionConfig,
    selection: &SelectionState,
    join: &JoinSpec,
) -> DatabaseSource {
    let tables = selection.tables().to_vec();
    let join_config = (tables.len() > 1).then(|| join.clone());
    DatabaseSource {
        connection: connection.clone(),
        tables,
        columns: selection.columns().clone(),
        join_config,
    }
}

pub fn file_source(
    file_info: Option<&FileInfo>,
    file_config: &FileParseConfig,
    selection: &SelectionState,
) -> Result<FileSource> {
    let file_info = file_info
        .cloned()
        .ok_or_else(|| CoreError::Validation("no file has been uploaded".to_string()))?;
    Ok(FileSource {
        file_info,
        file_config: *file_config,
        selected_columns: selection.columns_for(FILE_TABLE).to_vec(),
    })
}

fn source_kind(state: &WizardState) -> Result<SourceKind> {
    state
        .source
        .ok_or_else(|| CoreError::Validation("no source has been selected".to_string()))
}

/// Preview request for the current direction
pub fn build_preview_request(state: &WizardState) -> Result<PreviewRequest> {
    let request = match source_kind(state)? {
        SourceKind::Database => PreviewRequest::Database(database_source(
            &state.config.connection,
            &state.selection,
            &state.join,
        )),
        SourceKind::File => PreviewRequest::File(file_source(
            state.file_info.as_ref(),
            &state.config.file,
            &state.selection,
        )?),
    };
    Ok(request)
}

/// Ingestion request for the current direction, with its target nested
pub fn build_ingestion_request(state: &WizardState) -> Result<IngestionRequest> {
    let request = match source_kind(state)? {
        SourceKind::Database => IngestionRequest {
            source: IngestionSource::Database(database_source(
                &state.config.connection,
                &state.selection,
                &state.join,
            )),
            target: IngestionTarget::File {
                file_config: state.config.file,
            },
        },
        SourceKind::File => IngestionRequest {
            source: IngestionSource::File(file_source(
                state.file_info.as_ref(),
                &state.config.file,
                &state.selection,
            )?),
            target: IngestionTarget::Database {
                connection: state.config.connection.clone(),
                target_table: state.target_table.clone(),
            },
        },
    };
    Ok(request)
}
