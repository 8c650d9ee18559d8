//! The parsing job queue (C6, §4.6). `claim_next` is the only place
//! concurrency actually matters: `FOR UPDATE SKIP LOCKED` lets N workers
//! poll the same table without ever claiming the same row twice.

use codegraph_core::domain::ParsingJob;
use codegraph_core::{CodegraphError, Id, Result};

use crate::rows::row_to_job;
use crate::store::PostgresStore;

const SELECT_COLUMNS: &str =
    "id, repo_id, status, worker_id, error_message, created_at, started_at, completed_at";

impl PostgresStore {
    pub async fn create_job(&self, repo_id: Id) -> Result<ParsingJob> {
        let query = format!(
            r#"
            INSERT INTO parsing_jobs (id, repo_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Id::new().as_uuid())
            .bind(repo_id.as_uuid())
            .fetch_one(self.pool())
            .await?;

        row_to_job(&row)
    }

    /// Atomically claims the oldest pending job for `worker_id`, or returns
    /// `None` if the queue is empty. Safe to call concurrently from any
    /// number of workers against the same pool.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<ParsingJob>> {
        let query = format!(
            r#"
            UPDATE parsing_jobs
            SET status = 'parsing', started_at = now(), worker_id = $1
            WHERE id = (
                SELECT id FROM parsing_jobs
                WHERE status = 'pending'
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(worker_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    pub async fn mark_completed(&self, job_id: Id) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE parsing_jobs SET status = 'completed', completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodegraphError::not_found(format!("job {job_id} not found")));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, job_id: Id, error_message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE parsing_jobs
            SET status = 'failed', completed_at = now(), error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(error_message)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodegraphError::not_found(format!("job {job_id} not found")));
        }
        Ok(())
    }

    pub async fn get_job(&self, job_id: Id) -> Result<ParsingJob> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM parsing_jobs WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(job_id.as_uuid())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CodegraphError::not_found(format!("job {job_id} not found")))?;

        row_to_job(&row)
    }

    pub async fn pending_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parsing_jobs WHERE status = 'pending'")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    pub async fn running_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parsing_jobs WHERE status = 'parsing'")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }
}
