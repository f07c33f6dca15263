//! Database layer for episode-ingest
//!
//! Handles SQLite persistence for the episode catalog, the device registry
//! and the durable job queue.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: database lifecycle, schema migrations
//! - [`episodes`]: catalog records
//! - [`devices`]: push notification targets
//! - [`jobs`]: durable ingestion jobs

use sqlx::{FromRow, sqlite::SqlitePool};

mod devices;
mod episodes;
mod jobs;
mod migrations;

/// Status of a durable job row
pub mod job_status {
    /// Waiting for a worker
    pub const PENDING: &str = "pending";
    /// Claimed by a worker, pipeline running
    pub const CLAIMED: &str = "claimed";
    /// Pipeline succeeded
    pub const DONE: &str = "done";
    /// Pipeline failed; `error` holds the reason
    pub const FAILED: &str = "failed";
}

/// Device registration to be created or updated
#[derive(Debug, Clone)]
pub struct NewDevice {
    /// Owning user
    pub user_id: String,
    /// Client-generated device identifier
    pub device_id: String,
    /// Push token issued to the device
    pub notification_token: String,
}

/// Durable job row
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Unique database ID
    pub id: i64,
    /// Source URL
    pub url: String,
    /// Notify devices on success
    pub send_notification: bool,
    /// One of [`job_status`]
    pub status: String,
    /// Number of times the job was claimed
    pub attempts: i64,
    /// Failure reason
    pub error: Option<String>,
    /// Unix timestamp when the job was enqueued
    pub created_at: i64,
    /// Unix timestamp of the latest claim
    pub claimed_at: Option<i64>,
}

impl JobRow {
    /// The job message carried by this row
    pub fn job(&self) -> crate::types::IngestJob {
        crate::types::IngestJob::new(self.url.clone(), self.send_notification)
    }
}

/// True when a sqlx error is a UNIQUE/PRIMARY KEY violation
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.is_unique_violation(),
        _ => false,
    }
}

/// Database handle for episode-ingest
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
