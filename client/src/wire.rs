//! Request and response bodies of the backend's HTTP contract

use serde::{Deserialize, Serialize};

use etl_wizard_core::domain::{ConnectionConfig, PreviewRow};

/// `POST /connect/{db}` response
#[derive(Debug, Deserialize)]
pub struct ConnectResponse {
    pub tables: Vec<String>,
}

/// `POST /upload-file` response
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub temp_path: String,
    pub columns: Vec<String>,
}

/// `POST /get-columns` request: the connection with the table name alongside
#[derive(Debug, Serialize)]
pub struct ColumnsRequest<'a> {
    #[serde(flatten)]
    pub connection: &'a ConnectionConfig,
    pub table_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
}

/// `POST /get-columns` response
#[derive(Debug, Deserialize)]
pub struct ColumnsResponse {
    pub columns: Vec<ColumnDescriptor>,
}

/// `POST /preview-data` response
#[derive(Debug, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub preview: Vec<PreviewRow>,
}

/// `POST /start-ingestion` response
#[derive(Debug, Deserialize)]
pub struct StartIngestionResponse {
    pub job_id: serde_json::Value,
}

impl StartIngestionResponse {
    /// The identifier is opaque; numeric ids are kept in their text form
    pub fn job_id(&self) -> String {
        match &self.job_id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
