//! Wizard state machine
//!
//! `WizardState` is an immutable record. Every user action and every backend
//! outcome is a function from the current state to a [`Transition`]: the next
//! state plus the effects the session has to perform. Nothing here touches
//! the network.

use tracing::{debug, error, info};

use crate::config_store::{ConfigStore, ConnectionEdit, FileEdit};
use crate::domain::{
    ConnectionConfig, FileInfo, FileParseConfig, IngestionJob, JobStatus, JobStatusReport,
    PreviewRow, SourceKind,
};
use crate::error::{CoreError, FailureKind, Result};
use crate::join::{JoinSpec, JoinType};
use crate::payload::{build_ingestion_request, build_preview_request, IngestionRequest, PreviewRequest};
use crate::schema::{needs_lookup, ColumnCache, FILE_TABLE};
use crate::selection::{SelectionState, TableToggle};

/// Session status; exactly one is active and it gates which actions apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStatus {
    #[default]
    Idle,
    Connecting,
    Loading,
    Connected,
    Preview,
    Ingesting,
    Completed,
    Error,
}

impl WizardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStatus::Idle => "idle",
            WizardStatus::Connecting => "connecting",
            WizardStatus::Loading => "loading",
            WizardStatus::Connected => "connected",
            WizardStatus::Preview => "preview",
            WizardStatus::Ingesting => "ingesting",
            WizardStatus::Completed => "completed",
            WizardStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for WizardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wizard page the operator is on, derived from source and status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SelectSource,
    Configure,
    Working,
    SelectData,
    Preview,
    Ingesting,
    Completed,
    Error,
}

/// Work the session performs on behalf of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect(ConnectionConfig),
    Upload { config: FileParseConfig },
    LoadColumns {
        connection: ConnectionConfig,
        table: String,
    },
    Preview(PreviewRequest),
    StartIngestion(IngestionRequest),
    WatchJob(String),
    CancelPolling,
}

/// Outcome of an effect, fed back into the state machine
#[derive(Debug)]
pub enum Event {
    Connected(Result<Vec<String>>),
    Uploaded(Result<FileInfo>),
    ColumnsLoaded {
        table: String,
        outcome: Result<Vec<String>>,
    },
    PreviewReady(Result<Vec<PreviewRow>>),
    JobSubmitted(Result<String>),
    JobPolled {
        job_id: String,
        outcome: Result<JobStatusReport>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: WizardState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: WizardState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn with(state: WizardState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    pub source: Option<SourceKind>,
    pub status: WizardStatus,
    pub status_message: String,
    pub config: ConfigStore,
    pub file_info: Option<FileInfo>,
    /// Tables reported by the last successful connect
    pub tables: Vec<String>,
    pub column_cache: ColumnCache,
    pub selection: SelectionState,
    pub join: JoinSpec,
    pub preview: Option<Vec<PreviewRow>>,
    pub job: Option<IngestionJob>,
    /// Destination table for the file → database direction
    pub target_table: String,
}

impl WizardState {
    pub fn new(config: ConfigStore) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn step(&self) -> Step {
        if self.source.is_none() {
            return Step::SelectSource;
        }
        match self.status {
            WizardStatus::Idle => Step::Configure,
            WizardStatus::Connecting | WizardStatus::Loading => Step::Working,
            WizardStatus::Connected => Step::SelectData,
            WizardStatus::Preview => Step::Preview,
            WizardStatus::Ingesting => Step::Ingesting,
            WizardStatus::Completed => Step::Completed,
            WizardStatus::Error => Step::Error,
        }
    }

    // ---- gating -------------------------------------------------------

    fn require(&self, action: &'static str, allowed: &[WizardStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                action,
                status: self.status,
            })
        }
    }

    fn require_source(&self, action: &'static str, kind: SourceKind) -> Result<()> {
        match self.source {
            Some(source) if source == kind => Ok(()),
            Some(source) => Err(CoreError::Validation(format!(
                "{} is not available with a {} source",
                action, source
            ))),
            None => Err(CoreError::Validation(format!(
                "{} requires a source to be selected",
                action
            ))),
        }
    }

    pub fn can_connect(&self) -> bool {
        self.source == Some(SourceKind::Database)
            && self.status == WizardStatus::Idle
            && self.config.connection.is_complete()
    }

    pub fn can_generate_preview(&self) -> bool {
        if self.status != WizardStatus::Connected {
            return false;
        }
        match self.source {
            Some(SourceKind::Database) => {
                !self.selection.tables().is_empty() && self.selection.has_any_column()
            }
            Some(SourceKind::File) => {
                self.file_info.is_some() && !self.selection.columns_for(FILE_TABLE).is_empty()
            }
            None => false,
        }
    }

    pub fn can_start_ingestion(&self) -> bool {
        if self.status != WizardStatus::Preview {
            return false;
        }
        match self.source {
            Some(SourceKind::Database) => true,
            Some(SourceKind::File) => !self.target_table.trim().is_empty(),
            None => false,
        }
    }

    // ---- user actions -------------------------------------------------

    /// Choose the source side; everything downstream of it is discarded
    pub fn select_source(&self, kind: SourceKind) -> Transition {
        info!("Source selected: {} (target: {})", kind, kind.target());
        let selection = match kind {
            SourceKind::Database => SelectionState::default(),
            SourceKind::File => SelectionState::for_table(FILE_TABLE),
        };
        let next = Self {
            source: Some(kind),
            status: WizardStatus::Idle,
            status_message: String::new(),
            config: self.config.clone(),
            file_info: None,
            tables: Vec::new(),
            column_cache: ColumnCache::default(),
            selection,
            join: self.join.clone(),
            preview: None,
            job: None,
            target_table: self.target_table.clone(),
        };
        Transition::with(next, vec![Effect::CancelPolling])
    }

    /// Leave a finished (or abandoned) job and go back to source selection.
    /// Configuration records and the target table name are kept.
    pub fn start_new_job(&self) -> Transition {
        let next = Self {
            config: self.config.clone(),
            join: self.join.clone(),
            target_table: self.target_table.clone(),
            ..Default::default()
        };
        Transition::with(next, vec![Effect::CancelPolling])
    }

    /// The manual recovery edge: error → idle
    pub fn retry(&self) -> Result<Transition> {
        self.require("retry", &[WizardStatus::Error])?;
        let mut next = self.clone();
        next.status = WizardStatus::Idle;
        next.status_message.clear();
        next.job = None;
        Ok(Transition::with(next, vec![Effect::CancelPolling]))
    }

    pub fn edit_connection(&self, edit: ConnectionEdit) -> Result<Transition> {
        // The file flow edits its target connection on the select-data step
        let allowed: &[WizardStatus] = match self.source {
            Some(SourceKind::File) => &[WizardStatus::Idle, WizardStatus::Connected],
            _ => &[WizardStatus::Idle],
        };
        self.require("edit connection", allowed)?;
        let mut next = self.clone();
        next.config = self.config.with_connection_edit(edit);
        Ok(Transition::to(next))
    }

    pub fn edit_file_config(&self, edit: FileEdit) -> Result<Transition> {
        // The database flow edits its target file format on the select-data step
        let allowed: &[WizardStatus] = match self.source {
            Some(SourceKind::Database) => &[WizardStatus::Idle, WizardStatus::Connected],
            _ => &[WizardStatus::Idle],
        };
        self.require("edit file config", allowed)?;
        let mut next = self.clone();
        next.config = self.config.with_file_edit(edit);
        Ok(Transition::to(next))
    }

    pub fn set_target_table(&self, name: impl Into<String>) -> Result<Transition> {
        self.require_source("target table", SourceKind::File)?;
        self.require(
            "set target table",
            &[WizardStatus::Connected, WizardStatus::Preview],
        )?;
        let mut next = self.clone();
        next.target_table = name.into();
        Ok(Transition::to(next))
    }

    pub fn connect(&self) -> Result<Transition> {
        self.require_source("connect", SourceKind::Database)?;
        self.require("connect", &[WizardStatus::Idle])?;
        let missing = self.config.connection.missing_fields();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "missing connection fields: {}",
                missing.join(", ")
            )));
        }

        let mut next = self.clone();
        next.status = WizardStatus::Connecting;
        next.status_message = "Connecting to ClickHouse...".to_string();
        Ok(Transition::with(
            next,
            vec![Effect::Connect(self.config.connection.clone())],
        ))
    }

    pub fn upload(&self, file_name: &str) -> Result<Transition> {
        self.require_source("upload", SourceKind::File)?;
        self.require("upload", &[WizardStatus::Idle])?;
        debug!("Uploading {}", file_name);

        let mut next = self.clone();
        next.status = WizardStatus::Loading;
        next.status_message = "Uploading file...".to_string();
        Ok(Transition::with(
            next,
            vec![Effect::Upload {
                config: self.config.file,
            }],
        ))
    }

    /// Select or deselect a table. Selecting an uncached table triggers a
    /// column lookup; join slots grow to match the new selection.
    pub fn toggle_table(&self, table: &str) -> Result<Transition> {
        self.require_source("toggle table", SourceKind::Database)?;
        self.require("toggle table", &[WizardStatus::Connected])?;
        // Deselecting is always allowed, even for a table the last connect
        // no longer reported
        let selected = self.selection.is_selected(table);
        if !selected && !self.tables.iter().any(|t| t == table) {
            return Err(CoreError::Validation(format!("unknown table '{}'", table)));
        }

        let (selection, toggle) = self.selection.toggle_table(table);
        let mut next = self.clone();
        next.join = self.join.grown_for(selection.tables().len());
        next.selection = selection;

        if toggle == TableToggle::Added && needs_lookup(&self.column_cache, table) {
            next.status = WizardStatus::Loading;
            next.status_message = format!("Loading columns for {}...", table);
            return Ok(Transition::with(
                next,
                vec![Effect::LoadColumns {
                    connection: self.config.connection.clone(),
                    table: table.to_string(),
                }],
            ));
        }
        Ok(Transition::to(next))
    }

    pub fn toggle_column(&self, table: &str, column: &str, selected: bool) -> Result<Transition> {
        self.require("toggle column", &[WizardStatus::Connected])?;
        if !self.selection.is_selected(table) {
            return Err(CoreError::Validation(format!(
                "table '{}' is not selected",
                table
            )));
        }
        let mut next = self.clone();
        next.selection = self
            .selection
            .toggle_column(&self.column_cache, table, column, selected)?;
        Ok(Transition::to(next))
    }

    pub fn set_join_type(&self, join_type: JoinType) -> Result<Transition> {
        self.require_source("join type", SourceKind::Database)?;
        self.require("set join type", &[WizardStatus::Connected])?;
        let mut next = self.clone();
        next.join = self.join.with_join_type(join_type);
        Ok(Transition::to(next))
    }

    pub fn set_join_condition(&self, index: usize, value: impl Into<String>) -> Result<Transition> {
        self.require_source("join condition", SourceKind::Database)?;
        self.require("set join condition", &[WizardStatus::Connected])?;
        let mut next = self.clone();
        next.join = self.join.with_condition_at(index, value)?;
        Ok(Transition::to(next))
    }

    pub fn generate_preview(&self) -> Result<Transition> {
        self.require("generate preview", &[WizardStatus::Connected])?;
        if !self.can_generate_preview() {
            return Err(CoreError::Validation(
                "select at least one column before generating a preview".to_string(),
            ));
        }
        let request = build_preview_request(self)?;

        let mut next = self.clone();
        next.status = WizardStatus::Loading;
        next.status_message = "Generating data preview...".to_string();
        Ok(Transition::with(next, vec![Effect::Preview(request)]))
    }

    pub fn start_ingestion(&self) -> Result<Transition> {
        self.require("start ingestion", &[WizardStatus::Preview])?;
        if !self.can_start_ingestion() {
            return Err(CoreError::Validation(
                "a target table name is required".to_string(),
            ));
        }
        let request = build_ingestion_request(self)?;

        let mut next = self.clone();
        next.status = WizardStatus::Ingesting;
        next.status_message = "Starting data ingestion...".to_string();
        next.job = None;
        Ok(Transition::with(
            next,
            vec![Effect::CancelPolling, Effect::StartIngestion(request)],
        ))
    }

    // ---- backend outcomes ---------------------------------------------

    fn failed(&self, kind: FailureKind, err: &CoreError) -> Transition {
        let message = kind.message(err);
        error!("{}", message);
        let mut next = self.clone();
        next.status = WizardStatus::Error;
        next.status_message = message;
        Transition::to(next)
    }

    fn ignored(&self, what: &str) -> Transition {
        debug!("Ignoring stale {} while {}", what, self.status);
        Transition::to(self.clone())
    }

    /// Fold a backend outcome into the state. Outcomes that no longer match
    /// the current status (or job) are dropped.
    pub fn apply(&self, event: Event) -> Transition {
        match event {
            Event::Connected(outcome) => {
                if self.status != WizardStatus::Connecting {
                    return self.ignored("connect result");
                }
                match outcome {
                    Ok(tables) => {
                        info!("Connected, {} tables available", tables.len());
                        let mut next = self.clone();
                        next.selection = self.selection.retained_in(&tables);
                        next.tables = tables;
                        next.status = WizardStatus::Connected;
                        next.status_message =
                            "Connected to ClickHouse. Select tables and columns.".to_string();
                        Transition::to(next)
                    }
                    Err(e) => self.failed(FailureKind::Connect, &e),
                }
            }
            Event::Uploaded(outcome) => {
                if self.status != WizardStatus::Loading {
                    return self.ignored("upload result");
                }
                match outcome {
                    Ok(info) => {
                        info!(
                            "Uploaded {} ({} columns)",
                            info.filename,
                            info.columns.len()
                        );
                        let mut next = self.clone();
                        next.column_cache = ColumnCache::for_file(info.columns.clone());
                        next.selection = SelectionState::for_table(FILE_TABLE);
                        next.file_info = Some(info);
                        next.status = WizardStatus::Connected;
                        next.status_message =
                            "File uploaded. Select columns for ingestion.".to_string();
                        Transition::to(next)
                    }
                    Err(e) => self.failed(FailureKind::Upload, &e),
                }
            }
            Event::ColumnsLoaded { table, outcome } => {
                if self.status != WizardStatus::Loading {
                    return self.ignored("column list");
                }
                match outcome {
                    Ok(columns) => {
                        debug!("Loaded {} columns for {}", columns.len(), table);
                        let mut next = self.clone();
                        next.column_cache = self.column_cache.with_entry(&table, columns);
                        next.status = WizardStatus::Connected;
                        next.status_message =
                            "Columns loaded. Select columns for ingestion.".to_string();
                        Transition::to(next)
                    }
                    Err(e) => self.failed(FailureKind::SchemaLookup, &e),
                }
            }
            Event::PreviewReady(outcome) => {
                if self.status != WizardStatus::Loading {
                    return self.ignored("preview");
                }
                match outcome {
                    Ok(rows) => {
                        info!("Preview generated with {} rows", rows.len());
                        let mut next = self.clone();
                        next.preview = Some(rows);
                        next.status = WizardStatus::Preview;
                        next.status_message =
                            "Preview generated. Review data and proceed with ingestion."
                                .to_string();
                        Transition::to(next)
                    }
                    Err(e) => self.failed(FailureKind::Preview, &e),
                }
            }
            Event::JobSubmitted(outcome) => {
                if self.status != WizardStatus::Ingesting {
                    return self.ignored("job submission");
                }
                match outcome {
                    Ok(job_id) => {
                        let mut next = self.clone();
                        next.job = Some(IngestionJob::submitted(job_id.clone()));
                        Transition::with(next, vec![Effect::WatchJob(job_id)])
                    }
                    Err(e) => self.failed(FailureKind::JobSubmission, &e),
                }
            }
            Event::JobPolled { job_id, outcome } => {
                let current = match &self.job {
                    Some(job) if job.id == job_id && self.status == WizardStatus::Ingesting => job,
                    _ => return self.ignored("job status"),
                };
                match outcome {
                    Ok(report) => self.polled(current, &report),
                    Err(e) => self.failed(FailureKind::JobStatus, &e),
                }
            }
        }
    }

    fn polled(&self, job: &IngestionJob, report: &JobStatusReport) -> Transition {
        let mut next = self.clone();
        next.job = Some(job.with_report(report));
        match report.status {
            JobStatus::Completed => {
                info!("Job {} completed: {}", job.id, report.status_message);
                next.status = WizardStatus::Completed;
                next.status_message = format!("Ingestion completed: {}", report.status_message);
            }
            JobStatus::Error => {
                let message = format!(
                    "{}: {}",
                    FailureKind::JobExecution.prefix(true),
                    report.status_message
                );
                error!("Job {} failed: {}", job.id, report.status_message);
                next.status = WizardStatus::Error;
                next.status_message = message;
            }
            JobStatus::Running | JobStatus::Unknown => {
                next.status_message = format!("Ingestion progress: {}", report.status_message);
            }
        }
        Transition::to(next)
    }
}
