//! Durable ingestion jobs.
//!
//! Claiming is a single `UPDATE ... RETURNING` statement, so two workers
//! sharing the database never receive the same row.

use crate::error::DatabaseError;
use crate::types::IngestJob;
use crate::{Error, Result};

use super::{Database, JobRow, job_status};

const JOB_COLUMNS: &str =
    "id, url, send_notification, status, attempts, error, created_at, claimed_at";

impl Database {
    /// Persist a job as pending
    pub async fn enqueue_job(&self, job: &IngestJob) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO ingest_jobs (url, send_notification, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&job.url)
        .bind(job.send_notification)
        .bind(job_status::PENDING)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to enqueue job: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Claim the oldest pending job, if any
    pub async fn claim_next_job(&self) -> Result<Option<JobRow>> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE ingest_jobs
            SET status = ?, claimed_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM ingest_jobs WHERE status = ? ORDER BY id ASC LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_status::CLAIMED)
        .bind(now)
        .bind(job_status::PENDING)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim job: {}",
                e
            )))
        })
    }

    /// Mark a claimed job done
    pub async fn complete_job(&self, id: i64) -> Result<()> {
        self.finish_job(id, job_status::DONE, None).await
    }

    /// Mark a claimed job failed with its reason
    pub async fn fail_job(&self, id: i64, error: &str) -> Result<()> {
        self.finish_job(id, job_status::FAILED, Some(error)).await
    }

    async fn finish_job(&self, id: i64, status: &str, error: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE ingest_jobs SET status = ?, error = ?, finished_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status)
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(job_status::CLAIMED)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update job: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "claimed job {}",
                id
            ))));
        }
        Ok(())
    }

    /// Reset jobs claimed before `claimed_before` (Unix seconds) to pending.
    ///
    /// Returns how many jobs were requeued.
    pub async fn requeue_stale_jobs(&self, claimed_before: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE ingest_jobs SET status = ?, claimed_at = NULL WHERE status = ? AND claimed_at < ?",
        )
        .bind(job_status::PENDING)
        .bind(job_status::CLAIMED)
        .bind(claimed_before)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to requeue stale jobs: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: i64) -> Result<Option<JobRow>> {
        sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM ingest_jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get job: {}",
                    e
                )))
            })
    }

    /// Number of jobs in a status
    pub async fn count_jobs(&self, status: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM ingest_jobs WHERE status = ?")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count jobs: {}",
                    e
                )))
            })
    }
}
