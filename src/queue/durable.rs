//! Durable queue: jobs written to SQLite, executed by a separate worker

use super::{JobBackend, Submission};
use crate::config::QueueConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::pipeline::JobRunner;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Submission side of the durable queue
pub struct DurableQueue {
    db: Arc<Database>,
    accepting: AtomicBool,
}

impl DurableQueue {
    /// Create a queue writing into `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            accepting: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl JobBackend for DurableQueue {
    async fn submit(&self, job: crate::types::IngestJob) -> Result<Submission> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let job_id = self.db.enqueue_job(&job).await?;
        tracing::debug!(job_id, url = %job.url, "job persisted");
        Ok(Submission::Persisted { job_id })
    }

    async fn shutdown(&self, _timeout: Duration) -> bool {
        // Accepted jobs are already durable; nothing runs in this process.
        self.accepting.store(false, Ordering::SeqCst);
        true
    }

    fn name(&self) -> &'static str {
        "durable"
    }
}

/// Executes durable jobs with bounded concurrency
pub struct DurableWorker {
    db: Arc<Database>,
    runner: Arc<dyn JobRunner>,
    max_concurrent: usize,
    poll_interval: Duration,
    stale_claim_timeout: Duration,
    shutdown_timeout: Duration,
}

impl DurableWorker {
    /// Create a worker
    pub fn new(db: Arc<Database>, runner: Arc<dyn JobRunner>, config: &QueueConfig) -> Self {
        Self {
            db,
            runner,
            max_concurrent: config.max_concurrent.max(1),
            poll_interval: config.poll_interval,
            stale_claim_timeout: config.stale_claim_timeout,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Process jobs until `shutdown` is cancelled, then wait up to the
    /// configured shutdown timeout for running ones.
    ///
    /// Jobs left claimed by a previous crashed worker are requeued first.
    /// Returns false when jobs were still running at the deadline; their rows
    /// stay claimed until a later worker requeues them.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<bool> {
        let stale_secs = i64::try_from(self.stale_claim_timeout.as_secs()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp().saturating_sub(stale_secs);
        let requeued = self.db.requeue_stale_jobs(cutoff).await?;
        if requeued > 0 {
            tracing::warn!(requeued, "requeued jobs from an interrupted worker");
        }

        let limit = Arc::new(Semaphore::new(self.max_concurrent));
        tracing::info!(max_concurrent = self.max_concurrent, "durable worker started");

        loop {
            let permit = tokio::select! {
                permit = limit.clone().acquire_owned() => permit,
                _ = shutdown.cancelled() => break,
            };
            let Ok(permit) = permit else { break };

            let claimed = match self.db.claim_next_job().await {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(error = %e, "failed to claim job");
                    None
                }
            };

            let Some(row) = claimed else {
                drop(permit);
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => continue,
                    _ = shutdown.cancelled() => break,
                }
            };

            let db = self.db.clone();
            let runner = self.runner.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let job = row.job();
                tracing::debug!(job_id = row.id, attempt = row.attempts, url = %job.url, "job claimed");

                let body = {
                    let runner = runner.clone();
                    let job = job.clone();
                    tokio::spawn(async move { runner.run(&job).await })
                };

                let recorded = match body.await {
                    Ok(Ok(_)) => db.complete_job(row.id).await,
                    Ok(Err(e)) => db.fail_job(row.id, &e.to_string()).await,
                    Err(join_error) => {
                        tracing::error!(job_id = row.id, url = %job.url, error = %join_error, "job panicked");
                        db.fail_job(row.id, &join_error.to_string()).await
                    }
                };
                if let Err(e) = recorded {
                    tracing::error!(job_id = row.id, error = %e, "failed to record job outcome");
                }
            });
        }

        tracing::info!(timeout = ?self.shutdown_timeout, "durable worker stopping, waiting for running jobs");
        let all_permits = u32::try_from(self.max_concurrent).unwrap_or(u32::MAX);
        match tokio::time::timeout(self.shutdown_timeout, limit.acquire_many(all_permits)).await {
            Ok(_) => Ok(true),
            Err(_) => {
                tracing::warn!("timed out waiting for running jobs");
                Ok(false)
            }
        }
    }
}
