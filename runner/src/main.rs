//! ETL Runner
//!
//! Non-interactive driver that takes the wizard from source selection to a
//! finished ingestion job using the answers in a run plan.

mod plan;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etl_wizard_client::{ClientConfig, HttpBackend};
use etl_wizard_core::Wizard;

#[derive(Debug, Parser)]
#[command(name = "etl-runner", version, about = "Run one ingestion from a plan file")]
struct Args {
    /// Run plan (TOML, YAML or JSON)
    plan: PathBuf,

    /// Stop after the preview instead of starting the job
    #[arg(long)]
    preview_only: bool,

    /// Backend base URL, overrides ETL_API_BASE_URL
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,etl_wizard_runner=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    let plan = plan::RunPlan::load(&args.plan)?;

    info!("Starting ETL runner against {}", config.base_url);

    let interval = config.poll_interval();
    let backend = Arc::new(HttpBackend::new(config)?);
    let mut wizard = Wizard::with_poll_interval(backend, interval).with_config(plan.config_store());

    match run::execute(&mut wizard, &plan, args.preview_only).await {
        Ok(summary) => {
            info!("Run finished ({}): {}", summary.status, summary.message);
            match summary.job {
                Some(job) => info!("Job {} submitted at {}", job.id, job.submitted_at),
                None => info!("Previewed {} rows, no job started", summary.preview_rows),
            }
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            Err(e)
        }
    }
}
