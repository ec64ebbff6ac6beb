//! Domain models for the ETL wizard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default port of the columnar database's HTTPS interface
pub const DEFAULT_PORT: u16 = 8443;

/// Which side of the flow data is read from.
///
/// The target is always the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "clickhouse", alias = "database")]
    Database,
    #[serde(rename = "file")]
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Database => "clickhouse",
            SourceKind::File => "file",
        }
    }

    pub fn target(&self) -> SourceKind {
        match self {
            SourceKind::Database => SourceKind::File,
            SourceKind::File => SourceKind::Database,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Database => write!(f, "ClickHouse"),
            SourceKind::File => write!(f, "File"),
        }
    }
}

/// Database connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    /// Credential token, sent to the backend but never logged
    pub jwt_token: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            database: String::new(),
            user: String::new(),
            jwt_token: String::new(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("jwt_token", &"<redacted>")
            .finish()
    }
}

/// Field separator of a flat file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Delimiter {
    #[default]
    #[serde(rename = ",", alias = "comma")]
    Comma,
    #[serde(rename = ";", alias = "semicolon")]
    Semicolon,
    #[serde(rename = "\t", alias = "tab")]
    Tab,
    #[serde(rename = "|", alias = "pipe")]
    Pipe,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Tab => "\t",
            Delimiter::Pipe => "|",
        }
    }
}

impl std::str::FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "," | "comma" => Ok(Delimiter::Comma),
            ";" | "semicolon" => Ok(Delimiter::Semicolon),
            "\t" | "\\t" | "tab" => Ok(Delimiter::Tab),
            "|" | "pipe" => Ok(Delimiter::Pipe),
            other => Err(format!("unsupported delimiter '{}'", other)),
        }
    }
}

/// Flat-file parse parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParseConfig {
    #[serde(default)]
    pub delimiter: Delimiter,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

fn default_has_header() -> bool {
    true
}

impl Default for FileParseConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            has_header: true,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    /// Server-side temp path
    pub path: String,
    pub columns: Vec<String>,
}

/// One preview row, keyed by column name in backend order
pub type PreviewRow = serde_json::Map<String, serde_json::Value>;

/// Column headers of a preview, taken from the first row
pub fn preview_headers(rows: &[PreviewRow]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Backend-reported state of an ingestion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
    /// Any status the client does not know; treated as still running
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Outcome payload of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub records_processed: u64,
    /// Seconds
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub output_location: Option<String>,
}

/// One answer from the job-status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub result: Option<JobResult>,
}

/// The job this session submitted
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionJob {
    pub id: String,
    pub status: JobStatus,
    pub status_message: String,
    pub result: Option<JobResult>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionJob {
    pub fn submitted(id: String) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            status_message: String::new(),
            result: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Fold a status report into a new job record
    pub fn with_report(&self, report: &JobStatusReport) -> Self {
        let mut next = self.clone();
        next.status = report.status;
        next.status_message = report.status_message.clone();
        if report.status == JobStatus::Completed {
            next.result = report.result.clone();
        }
        if report.status.is_terminal() {
            next.finished_at = Some(Utc::now());
        }
        next
    }
}
