//! Job submission backends
//!
//! Both backends take one job per source URL and return at once; the
//! pipeline runs later and its outcome never reaches the submitter.
//!
//! - [`WorkerPool`]: in-process queue, bounded concurrency, per-task state
//! - [`DurableQueue`] + [`DurableWorker`]: jobs persisted in SQLite and
//!   executed by a separate worker process, surviving restarts

mod durable;
mod in_process;

pub use durable::{DurableQueue, DurableWorker};
pub use in_process::{QueuedTask, WorkerPool};

use crate::error::Result;
use crate::types::{IngestJob, TaskId};
use async_trait::async_trait;

/// Receipt for an accepted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Queued in this process
    Enqueued {
        /// Pool task id
        task_id: TaskId,
    },
    /// Written to the durable job table
    Persisted {
        /// Job row id
        job_id: i64,
    },
}

impl Submission {
    /// HTTP status reported for this kind of acceptance
    pub fn status_code(&self) -> u16 {
        match self {
            Submission::Enqueued { .. } => 200,
            Submission::Persisted { .. } => 202,
        }
    }
}

/// Accepts jobs for asynchronous execution
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Accept one job
    async fn submit(&self, job: IngestJob) -> Result<Submission>;

    /// Stop accepting jobs and wait up to `timeout` for running ones
    async fn shutdown(&self, timeout: std::time::Duration) -> bool;

    /// Name of the backend, for logging
    fn name(&self) -> &'static str;
}
