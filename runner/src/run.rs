//! Walks a wizard session through a run plan

use anyhow::{anyhow, Result};
use tracing::{debug, error, info};

use etl_wizard_client::PathBlob;
use etl_wizard_core::domain::{preview_headers, IngestionJob, SourceKind};
use etl_wizard_core::schema::FILE_TABLE;
use etl_wizard_core::{Backend, Wizard, WizardState, WizardStatus};

use crate::plan::RunPlan;

/// Where a run ended up
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: WizardStatus,
    pub message: String,
    pub preview_rows: usize,
    pub job: Option<IngestionJob>,
}

impl RunSummary {
    fn of(state: &WizardState) -> Self {
        Self {
            status: state.status,
            message: state.status_message.clone(),
            preview_rows: state.preview.as_ref().map(Vec::len).unwrap_or(0),
            job: state.job.clone(),
        }
    }
}

/// Run the plan to completion, or stop after the preview
pub async fn execute<B>(wizard: &mut Wizard<B>, plan: &RunPlan, preview_only: bool) -> Result<RunSummary>
where
    B: Backend + ?Sized + 'static,
{
    info!("Selecting {} source", plan.source);
    wizard.select_source(plan.source).await;

    match plan.source {
        SourceKind::Database => select_tables(wizard, plan).await?,
        SourceKind::File => select_file_columns(wizard, plan).await?,
    }

    let state = checked(wizard.generate_preview().await?)?;
    report_preview(state);
    if preview_only {
        return Ok(RunSummary::of(wizard.state()));
    }

    if let Some(target) = plan.target() {
        if plan.source == SourceKind::File {
            wizard.set_target_table(target)?;
        }
    }

    let state = checked(wizard.start_ingestion().await?)?;
    if let Some(job) = &state.job {
        info!("Ingestion job {} submitted", job.id);
    }

    while let Some(state) = wizard.next_job_update().await {
        match state.status {
            WizardStatus::Ingesting | WizardStatus::Completed => info!("{}", state.status_message),
            _ => error!("{}", state.status_message),
        }
    }

    let state = checked(wizard.state())?;
    if let Some(result) = state.job.as_ref().and_then(|j| j.result.as_ref()) {
        info!(
            "Processed {} records in {:.2}s",
            result.records_processed, result.execution_time
        );
        if let Some(location) = &result.output_location {
            info!("Output written to {}", location);
        }
    }
    Ok(RunSummary::of(state))
}

async fn select_tables<B>(wizard: &mut Wizard<B>, plan: &RunPlan) -> Result<()>
where
    B: Backend + ?Sized + 'static,
{
    let state = checked(wizard.connect().await?)?;
    info!("{}", state.status_message);

    for table in &plan.tables {
        checked(wizard.toggle_table(&table.name).await?)?;

        let columns = if table.columns.is_empty() {
            wizard
                .state()
                .column_cache
                .get(&table.name)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        } else {
            table.columns.clone()
        };
        for column in &columns {
            wizard.toggle_column(&table.name, column, true)?;
        }
        debug!("Selected {} columns from {}", columns.len(), table.name);
    }

    if let Some(join) = &plan.join {
        wizard.set_join_type(join.join_type)?;
        for (index, condition) in join.conditions.iter().enumerate() {
            wizard.set_join_condition(index, condition.as_str())?;
        }
    }
    Ok(())
}

async fn select_file_columns<B>(wizard: &mut Wizard<B>, plan: &RunPlan) -> Result<()>
where
    B: Backend + ?Sized + 'static,
{
    let input = plan
        .input
        .as_ref()
        .ok_or_else(|| anyhow!("a file source needs an input file"))?;
    let blob = PathBlob::new(input);

    let state = checked(wizard.upload(&blob).await?)?;
    info!("{}", state.status_message);

    let columns = if plan.columns.is_empty() {
        state
            .file_info
            .as_ref()
            .map(|info| info.columns.clone())
            .unwrap_or_default()
    } else {
        plan.columns.clone()
    };
    for column in &columns {
        wizard.toggle_column(FILE_TABLE, column, true)?;
    }
    debug!("Selected {} file columns", columns.len());
    Ok(())
}

fn report_preview(state: &WizardState) {
    let rows = state.preview.as_deref().unwrap_or_default();
    info!("Preview: {} rows", rows.len());
    info!("Columns: {}", preview_headers(rows).join(", "));
    for row in rows {
        debug!("{}", serde_json::Value::Object(row.clone()));
    }
}

/// Turn a wizard error state into a run failure
fn checked(state: &WizardState) -> Result<&WizardState> {
    if state.status == WizardStatus::Error {
        return Err(anyhow!(state.status_message.clone()));
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{JoinPlan, TablePlan};
    use etl_wizard_client::{ClientConfig, HttpBackend};
    use etl_wizard_core::domain::{ConnectionConfig, FileParseConfig};
    use etl_wizard_core::join::JoinType;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wizard_for(server: &MockServer, plan: &RunPlan) -> Wizard<HttpBackend> {
        let config = ClientConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            poll_interval_ms: 10,
        };
        let interval = config.poll_interval();
        let backend = Arc::new(HttpBackend::new(config).unwrap());
        Wizard::with_poll_interval(backend, interval).with_config(plan.config_store())
    }

    fn database_plan() -> RunPlan {
        RunPlan {
            source: SourceKind::Database,
            connection: ConnectionConfig {
                host: "ch.local".to_string(),
                port: 8443,
                database: "sales".to_string(),
                user: "etl".to_string(),
                jwt_token: "tok".to_string(),
            },
            file: FileParseConfig::default(),
            input: None,
            tables: vec![
                TablePlan {
                    name: "orders".to_string(),
                    columns: vec!["id".to_string()],
                },
                TablePlan {
                    name: "customers".to_string(),
                    columns: vec![],
                },
            ],
            columns: vec![],
            join: Some(JoinPlan {
                join_type: JoinType::Left,
                conditions: vec!["orders.customer_id = customers.id".to_string()],
            }),
            target_table: None,
        }
    }

    async fn mount_database_backend(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/connect/clickhouse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tables": ["orders", "customers"]})),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/get-columns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "columns": [{"name": "id", "type": "UInt64"}, {"name": "name", "type": "String"}]
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/preview-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "preview": [{"id": 1, "name": "Ada"}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_database_plan_runs_to_completion() {
        let server = MockServer::start().await;
        mount_database_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/start-ingestion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": 7})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job-status/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "status_message": "1 row exported",
                "result": {
                    "records_processed": 1,
                    "execution_time": 0.1,
                    "output_location": "/exports/orders.csv"
                }
            })))
            .mount(&server)
            .await;

        let plan = database_plan();
        let mut wizard = wizard_for(&server, &plan);
        let summary = execute(&mut wizard, &plan, false).await.unwrap();

        assert_eq!(summary.status, WizardStatus::Completed);
        assert_eq!(summary.message, "Ingestion completed: 1 row exported");
        let job = summary.job.unwrap();
        assert_eq!(job.id, "7");
        assert_eq!(job.result.unwrap().records_processed, 1);

        let requests = server.received_requests().await.unwrap();
        let submit = requests
            .iter()
            .find(|r| r.url.path() == "/start-ingestion")
            .unwrap();
        let body: Value = serde_json::from_slice(&submit.body).unwrap();
        assert_eq!(body["source"]["type"], "clickhouse");
        assert_eq!(body["source"]["tables"], json!(["orders", "customers"]));
        assert_eq!(body["source"]["columns"]["orders"], json!(["id"]));
        assert_eq!(body["source"]["columns"]["customers"], json!(["id", "name"]));
        assert_eq!(body["source"]["join_config"]["join_type"], "LEFT JOIN");
        assert_eq!(body["target"]["type"], "file");
    }

    #[tokio::test]
    async fn test_preview_only_stops_before_ingestion() {
        let server = MockServer::start().await;
        mount_database_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/start-ingestion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let plan = database_plan();
        let mut wizard = wizard_for(&server, &plan);
        let summary = execute(&mut wizard, &plan, true).await.unwrap();

        assert_eq!(summary.status, WizardStatus::Preview);
        assert_eq!(summary.preview_rows, 1);
        assert!(summary.job.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/clickhouse"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})),
            )
            .mount(&server)
            .await;

        let plan = database_plan();
        let mut wizard = wizard_for(&server, &plan);
        let err = execute(&mut wizard, &plan, false).await.unwrap_err();

        assert_eq!(err.to_string(), "Connection error: Invalid token");
        assert_eq!(wizard.status(), WizardStatus::Error);
    }

    #[tokio::test]
    async fn test_file_plan_uploads_and_reports_job_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("orders.csv");
        std::fs::write(&input, "id,total\n1,9.5\n").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload-file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "filename": "orders.csv",
                "temp_path": "/tmp/orders.csv",
                "columns": ["id", "total"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/preview-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "preview": [{"id": 1, "total": 9.5}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/start-ingestion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "job-9"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job-status/job-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "status_message": "table orders_copy is read-only"
            })))
            .mount(&server)
            .await;

        let mut plan = database_plan();
        plan.source = SourceKind::File;
        plan.input = Some(input);
        plan.tables.clear();
        plan.join = None;
        plan.target_table = Some("orders_copy".to_string());

        let mut wizard = wizard_for(&server, &plan);
        let err = execute(&mut wizard, &plan, false).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ingestion error: table orders_copy is read-only"
        );

        let requests = server.received_requests().await.unwrap();
        let submit = requests
            .iter()
            .find(|r| r.url.path() == "/start-ingestion")
            .unwrap();
        let body: Value = serde_json::from_slice(&submit.body).unwrap();
        assert_eq!(body["source"]["selected_columns"], json!(["id", "total"]));
        assert_eq!(body["target"]["target_table"], "orders_copy");
    }
}
