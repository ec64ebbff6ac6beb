//! Wizard session: runs the effects of each transition against a backend

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{Backend, BlobSource, FileUpload};
use crate::config_store::{ConfigStore, ConnectionEdit, FileEdit};
use crate::domain::{FileInfo, FileParseConfig, IngestionJob, SourceKind};
use crate::error::{CoreError, Result};
use crate::job::{JobOrchestrator, JobWatch, DEFAULT_POLL_INTERVAL};
use crate::join::JoinType;
use crate::state::{Effect, Event, Transition, WizardState, WizardStatus};

/// One operator session against one backend.
///
/// Action methods return `Err` only when the action is not legal in the
/// current state. Downstream failures land in the state as
/// `WizardStatus::Error` with the operator-facing message.
pub struct Wizard<B: ?Sized> {
    state: WizardState,
    backend: Arc<B>,
    jobs: JobOrchestrator<B>,
    watch: Option<JobWatch>,
}

impl<B: Backend + ?Sized + 'static> Wizard<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_poll_interval(backend, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(backend: Arc<B>, interval: Duration) -> Self {
        Self {
            state: WizardState::default(),
            jobs: JobOrchestrator::new(Arc::clone(&backend), interval),
            backend,
            watch: None,
        }
    }

    /// Start from previously entered configuration
    pub fn with_config(mut self, config: ConfigStore) -> Self {
        self.state = WizardState::new(config);
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn status(&self) -> WizardStatus {
        self.state.status
    }

    pub fn job(&self) -> Option<&IngestionJob> {
        self.state.job.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.watch.is_some() && self.jobs.is_watching()
    }

    pub async fn select_source(&mut self, kind: SourceKind) -> &WizardState {
        let transition = self.state.select_source(kind);
        self.drive(transition, None).await
    }

    pub async fn start_new_job(&mut self) -> &WizardState {
        let transition = self.state.start_new_job();
        self.drive(transition, None).await
    }

    pub async fn retry(&mut self) -> Result<&WizardState> {
        let transition = self.state.retry()?;
        Ok(self.drive(transition, None).await)
    }

    pub fn edit_connection(&mut self, edit: ConnectionEdit) -> Result<&WizardState> {
        self.state = self.state.edit_connection(edit)?.state;
        Ok(&self.state)
    }

    pub fn edit_file_config(&mut self, edit: FileEdit) -> Result<&WizardState> {
        self.state = self.state.edit_file_config(edit)?.state;
        Ok(&self.state)
    }

    pub fn set_target_table(&mut self, name: impl Into<String>) -> Result<&WizardState> {
        self.state = self.state.set_target_table(name)?.state;
        Ok(&self.state)
    }

    pub fn set_join_type(&mut self, join_type: JoinType) -> Result<&WizardState> {
        self.state = self.state.set_join_type(join_type)?.state;
        Ok(&self.state)
    }

    pub fn set_join_condition(
        &mut self,
        index: usize,
        value: impl Into<String>,
    ) -> Result<&WizardState> {
        self.state = self.state.set_join_condition(index, value)?.state;
        Ok(&self.state)
    }

    pub fn toggle_column(
        &mut self,
        table: &str,
        column: &str,
        selected: bool,
    ) -> Result<&WizardState> {
        self.state = self.state.toggle_column(table, column, selected)?.state;
        Ok(&self.state)
    }

    pub async fn connect(&mut self) -> Result<&WizardState> {
        let transition = self.state.connect()?;
        Ok(self.drive(transition, None).await)
    }

    pub async fn upload(&mut self, blob: &dyn BlobSource) -> Result<&WizardState> {
        let transition = self.state.upload(&blob.file_name())?;
        Ok(self.drive(transition, Some(blob)).await)
    }

    pub async fn toggle_table(&mut self, table: &str) -> Result<&WizardState> {
        let transition = self.state.toggle_table(table)?;
        Ok(self.drive(transition, None).await)
    }

    pub async fn generate_preview(&mut self) -> Result<&WizardState> {
        let transition = self.state.generate_preview()?;
        Ok(self.drive(transition, None).await)
    }

    /// Submit the job; polling starts in the background on success
    pub async fn start_ingestion(&mut self) -> Result<&WizardState> {
        let transition = self.state.start_ingestion()?;
        Ok(self.drive(transition, None).await)
    }

    /// Apply the next status update of the watched job.
    ///
    /// Returns `None` when no job is being watched.
    pub async fn next_job_update(&mut self) -> Option<&WizardState> {
        let watch = self.watch.as_mut()?;
        let job_id = watch.job_id().to_string();
        match watch.next().await {
            Some(outcome) => {
                let transition = self.state.apply(Event::JobPolled { job_id, outcome });
                self.state = transition.state;
                if self.state.status != WizardStatus::Ingesting {
                    self.watch = None;
                }
                Some(&self.state)
            }
            None => {
                self.watch = None;
                None
            }
        }
    }

    /// Follow the watched job to a terminal status
    pub async fn wait_for_job(&mut self) -> &WizardState {
        while self.next_job_update().await.is_some() {}
        &self.state
    }

    async fn drive(
        &mut self,
        transition: Transition,
        blob: Option<&dyn BlobSource>,
    ) -> &WizardState {
        let mut queue: VecDeque<Effect> = transition.effects.into();
        self.state = transition.state;

        while let Some(effect) = queue.pop_front() {
            if let Some(event) = self.run_effect(effect, blob).await {
                let next = self.state.apply(event);
                self.state = next.state;
                queue.extend(next.effects);
            }
        }
        debug!("Wizard status: {}", self.state.status);
        &self.state
    }

    async fn run_effect(&mut self, effect: Effect, blob: Option<&dyn BlobSource>) -> Option<Event> {
        match effect {
            Effect::Connect(connection) => {
                info!(
                    "Connecting to {}:{} database {}",
                    connection.host, connection.port, connection.database
                );
                Some(Event::Connected(self.backend.connect(&connection).await))
            }
            Effect::Upload { config } => {
                let outcome = match blob {
                    Some(blob) => self.upload_blob(blob, &config).await,
                    None => Err(CoreError::Validation(
                        "no file was provided for upload".to_string(),
                    )),
                };
                Some(Event::Uploaded(outcome))
            }
            Effect::LoadColumns { connection, table } => {
                info!("Loading columns for {}", table);
                let outcome = self.backend.list_columns(&connection, &table).await;
                Some(Event::ColumnsLoaded { table, outcome })
            }
            Effect::Preview(request) => {
                info!("Requesting preview");
                Some(Event::PreviewReady(self.backend.preview(&request).await))
            }
            Effect::StartIngestion(request) => {
                info!("Submitting ingestion job");
                Some(Event::JobSubmitted(self.jobs.submit(&request).await))
            }
            Effect::WatchJob(job_id) => {
                info!(
                    "Polling job {} every {:?}",
                    job_id,
                    self.jobs.interval()
                );
                self.watch = Some(self.jobs.watch(job_id));
                None
            }
            Effect::CancelPolling => {
                self.jobs.cancel();
                self.watch = None;
                None
            }
        }
    }

    async fn upload_blob(
        &self,
        blob: &dyn BlobSource,
        config: &FileParseConfig,
    ) -> Result<FileInfo> {
        let file_name = blob.file_name();
        let bytes = blob.read().await?;
        info!("Uploading {} ({} bytes)", file_name, bytes.len());
        self.backend
            .upload_file(FileUpload { file_name, bytes }, config)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::InMemoryBlob;
    use crate::domain::{JobResult, JobStatus, JobStatusReport};
    use crate::payload::IngestionSource;
    use crate::schema::FILE_TABLE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ConfigStore {
        ConfigStore::default()
            .with_connection_edit(ConnectionEdit::Host("ch.local".to_string()))
            .with_connection_edit(ConnectionEdit::Database("default".to_string()))
            .with_connection_edit(ConnectionEdit::User("default".to_string()))
            .with_connection_edit(ConnectionEdit::Token("tok".to_string()))
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_columns_fetched_once_per_table() {
        let mut backend = MockBackend::new();
        backend
            .expect_connect()
            .times(1)
            .returning(|_| Ok(vec!["orders".to_string(), "customers".to_string()]));
        backend
            .expect_list_columns()
            .withf(|_, table| table == "orders")
            .times(1)
            .returning(|_, _| Ok(vec!["id".to_string(), "total".to_string()]));

        let mut wizard = Wizard::new(Arc::new(backend)).with_config(config());
        wizard.select_source(SourceKind::Database).await;
        wizard.connect().await.unwrap();
        assert_eq!(wizard.status(), WizardStatus::Connected);

        wizard.toggle_table("orders").await.unwrap();
        wizard.toggle_table("orders").await.unwrap();
        let state = wizard.toggle_table("orders").await.unwrap();
        assert_eq!(state.status, WizardStatus::Connected);
        assert_eq!(state.column_cache.get("orders").unwrap(), cols(&["id", "total"]).as_slice());
    }

    #[tokio::test]
    async fn test_column_lookup_failure_enters_error() {
        let mut backend = MockBackend::new();
        backend
            .expect_connect()
            .returning(|_| Ok(vec!["orders".to_string()]));
        backend.expect_list_columns().returning(|_, _| {
            Err(CoreError::Backend {
                status: 404,
                detail: "Table orders does not exist".to_string(),
            })
        });

        let mut wizard = Wizard::new(Arc::new(backend)).with_config(config());
        wizard.select_source(SourceKind::Database).await;
        wizard.connect().await.unwrap();
        let state = wizard.toggle_table("orders").await.unwrap();

        assert_eq!(state.status, WizardStatus::Error);
        assert_eq!(
            state.status_message,
            "Failed to load columns: Table orders does not exist"
        );
    }

    #[tokio::test]
    async fn test_submit_rejected_by_backend() {
        let mut backend = MockBackend::new();
        backend.expect_upload_file().returning(|upload, _| {
            Ok(FileInfo {
                filename: upload.file_name,
                path: "/tmp/x.csv".to_string(),
                columns: vec!["id".to_string()],
            })
        });
        backend
            .expect_preview()
            .returning(|_| Ok(vec![serde_json::Map::new()]));
        backend.expect_start_ingestion().times(1).returning(|_| {
            Err(CoreError::Backend {
                status: 400,
                detail: "target table required".to_string(),
            })
        });
        backend.expect_job_status().never();

        let mut wizard = Wizard::new(Arc::new(backend)).with_config(config());
        wizard.select_source(SourceKind::File).await;
        wizard
            .upload(&InMemoryBlob::new("x.csv", "id\n1\n"))
            .await
            .unwrap();
        wizard.toggle_column(FILE_TABLE, "id", true).unwrap();
        wizard.generate_preview().await.unwrap();
        wizard.set_target_table("x").unwrap();
        let state = wizard.start_ingestion().await.unwrap();

        assert_eq!(state.status, WizardStatus::Error);
        assert_eq!(
            state.status_message,
            "Ingestion failed to start: target table required"
        );
        assert!(!wizard.is_polling());
        assert!(wizard.next_job_update().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_database_to_file_end_to_end() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);

        let mut backend = MockBackend::new();
        backend
            .expect_connect()
            .returning(|_| Ok(vec!["orders".to_string()]));
        backend
            .expect_list_columns()
            .returning(|_, _| Ok(vec!["id".to_string(), "total".to_string()]));
        backend.expect_preview().times(1).returning(|_| {
            Ok(vec![serde_json::from_value(serde_json::json!({"id": 1})).unwrap()])
        });
        backend
            .expect_start_ingestion()
            .withf(|request| matches!(request.source, IngestionSource::Database(_)))
            .times(1)
            .returning(|_| Ok("job-42".to_string()));
        backend.expect_job_status().times(4).returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                Ok(JobStatusReport {
                    status: JobStatus::Running,
                    status_message: format!("batch {}", n + 1),
                    result: None,
                })
            } else {
                Ok(JobStatusReport {
                    status: JobStatus::Completed,
                    status_message: "exported".to_string(),
                    result: Some(JobResult {
                        records_processed: 500,
                        execution_time: 6.1,
                        output_location: Some("/exports/orders.csv".to_string()),
                    }),
                })
            }
        });

        let mut wizard = Wizard::new(Arc::new(backend)).with_config(config());
        wizard.select_source(SourceKind::Database).await;
        wizard.connect().await.unwrap();
        wizard.toggle_table("orders").await.unwrap();
        wizard.toggle_column("orders", "id", true).unwrap();
        wizard.generate_preview().await.unwrap();
        let state = wizard.start_ingestion().await.unwrap();
        assert_eq!(state.status, WizardStatus::Ingesting);
        assert_eq!(state.job.as_ref().unwrap().id, "job-42");

        let state = wizard.wait_for_job().await;
        assert_eq!(state.status, WizardStatus::Completed);
        assert_eq!(state.status_message, "Ingestion completed: exported");
        let result = state.job.as_ref().unwrap().result.clone().unwrap();
        assert_eq!(result.output_location.as_deref(), Some("/exports/orders.csv"));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert!(!wizard.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_new_job_cancels_polling() {
        let mut backend = MockBackend::new();
        backend
            .expect_connect()
            .returning(|_| Ok(vec!["orders".to_string()]));
        backend
            .expect_list_columns()
            .returning(|_, _| Ok(vec!["id".to_string()]));
        backend
            .expect_preview()
            .returning(|_| Ok(Vec::new()));
        backend
            .expect_start_ingestion()
            .returning(|_| Ok("stuck".to_string()));
        backend.expect_job_status().returning(|_| {
            Ok(JobStatusReport {
                status: JobStatus::Running,
                status_message: "still going".to_string(),
                result: None,
            })
        });

        let mut wizard = Wizard::new(Arc::new(backend)).with_config(config());
        wizard.select_source(SourceKind::Database).await;
        wizard.connect().await.unwrap();
        wizard.toggle_table("orders").await.unwrap();
        wizard.toggle_column("orders", "id", true).unwrap();
        wizard.generate_preview().await.unwrap();
        wizard.start_ingestion().await.unwrap();

        let state = wizard.next_job_update().await.unwrap();
        assert_eq!(state.status_message, "Ingestion progress: still going");
        assert!(wizard.is_polling());

        let state = wizard.start_new_job().await;
        assert!(state.job.is_none());
        assert_eq!(state.config, config());
        assert!(!wizard.is_polling());
        assert!(wizard.next_job_update().await.is_none());
    }

    #[tokio::test]
    async fn test_illegal_action_is_rejected_without_backend_call() {
        let mut backend = MockBackend::new();
        backend.expect_connect().never();

        let mut wizard = Wizard::new(Arc::new(backend));
        wizard.select_source(SourceKind::File).await;
        assert!(wizard.connect().await.is_err());
        assert!(wizard.generate_preview().await.is_err());
        assert_eq!(wizard.status(), WizardStatus::Idle);
    }
}
