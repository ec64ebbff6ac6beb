//! Ingestion job submission and status polling
//!
//! A watch runs as its own task and owns a cancellation token. Each status
//! check is scheduled only after the previous one returned, so at most one
//! request per job is in flight. There is no retry limit: a job that never
//! reaches a terminal status is polled until the watch is cancelled.
//!
//! Updates go through a one-slot channel. While an update sits unread the
//! loop waits instead of polling again, so an idle consumer holds at most one
//! stale report plus the one waiting to be delivered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::domain::JobStatusReport;
use crate::error::Result;
use crate::payload::IngestionRequest;

/// Updates buffered ahead of the consumer
const UPDATE_BUFFER: usize = 1;

/// Delay between the end of one status check and the start of the next
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Submits jobs and keeps at most one status watch alive
pub struct JobOrchestrator<B: ?Sized> {
    backend: Arc<B>,
    interval: Duration,
    active: Option<CancellationToken>,
}

impl<B: Backend + ?Sized + 'static> JobOrchestrator<B> {
    pub fn new(backend: Arc<B>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            active: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit one ingestion request
    pub async fn submit(&self, request: &IngestionRequest) -> Result<String> {
        let job_id = self.backend.start_ingestion(request).await?;
        info!("Ingestion job {} submitted", job_id);
        Ok(job_id)
    }

    /// Start polling `job_id`, cancelling any previous watch first
    pub fn watch(&mut self, job_id: String) -> JobWatch {
        self.cancel();

        let token = CancellationToken::new();
        let polls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);

        tokio::spawn(poll_job(
            Arc::clone(&self.backend),
            job_id.clone(),
            self.interval,
            token.clone(),
            Arc::clone(&polls),
            tx,
        ));
        self.active = Some(token.clone());

        JobWatch {
            job_id,
            updates: rx,
            token,
            polls,
        }
    }

    /// Stop the current watch, if any
    pub fn cancel(&mut self) {
        if let Some(token) = self.active.take() {
            if !token.is_cancelled() {
                debug!("Cancelling active job watch");
            }
            token.cancel();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.active.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

async fn poll_job<B: Backend + ?Sized>(
    backend: Arc<B>,
    job_id: String,
    interval: Duration,
    token: CancellationToken,
    polls: Arc<AtomicUsize>,
    tx: mpsc::Sender<Result<JobStatusReport>>,
) {
    loop {
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = backend.job_status(&job_id) => outcome,
        };
        let count = polls.fetch_add(1, Ordering::SeqCst) + 1;

        // Transport failures end the watch just like a reported error
        let terminal = match &outcome {
            Ok(report) => {
                debug!(
                    "Job {} poll #{}: {:?} {}",
                    job_id, count, report.status, report.status_message
                );
                report.status.is_terminal()
            }
            Err(e) => {
                warn!("Job {} poll #{} failed: {}", job_id, count, e);
                true
            }
        };

        let delivered = tokio::select! {
            _ = token.cancelled() => false,
            sent = tx.send(outcome) => sent.is_ok(),
        };
        if !delivered || terminal {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Stopped polling job {}", job_id);
}

/// Receiving end of one job's status updates
pub struct JobWatch {
    job_id: String,
    updates: mpsc::Receiver<Result<JobStatusReport>>,
    token: CancellationToken,
    polls: Arc<AtomicUsize>,
}

impl JobWatch {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Next status update; `None` once the watch has stopped
    pub async fn next(&mut self) -> Option<Result<JobStatusReport>> {
        self.updates.recv().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Status requests issued so far
    pub fn polls_issued(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
