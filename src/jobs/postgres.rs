//! Postgres-backed `JobStore`, grounded on
//! `durable::persistence::postgres`'s `claim_task` (the `FOR UPDATE SKIP
//! LOCKED` CTE), `fail_task` (retry-vs-terminal branch), and
//! `reclaim_stale_tasks`, generalized from per-activity tasks to whole
//! workflow jobs against the `jobs` table (see `migrations/`).

use std::str::FromStr;
use std::time::Duration;

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use crate::config::JobQueueConfig;
use crate::domain::{Job, JobKind, JobStatus};

use super::{JobFailureOutcome, JobStore, JobStoreError, Result, retry_delay};

fn row_to_job(row: &PgRow) -> Result<Job> {
    let kind: String = row.try_get("kind").map_err(sqlx_err)?;
    let status: String = row.try_get("status").map_err(sqlx_err)?;
    Ok(Job {
        id: row.try_get("id").map_err(sqlx_err)?,
        workflow_id: row.try_get("workflow_id").map_err(sqlx_err)?,
        kind: JobKind::from_str(&kind).map_err(|e| JobStoreError::Backend { message: e })?,
        priority: row.try_get("priority").map_err(sqlx_err)?,
        status: JobStatus::from_str(&status).map_err(|e| JobStoreError::Backend { message: e })?,
        payload: row.try_get("payload").map_err(sqlx_err)?,
        worker_id: row.try_get("worker_id").map_err(sqlx_err)?,
        lease_expires_at: row.try_get("lease_expires_at").map_err(sqlx_err)?,
        retry_count: row.try_get::<i32, _>("retry_count").map_err(sqlx_err)? as u32,
        max_retries: row.try_get::<i32, _>("max_retries").map_err(sqlx_err)? as u32,
        next_run_at: row.try_get("next_run_at").map_err(sqlx_err)?,
        error_message: row.try_get("error_message").map_err(sqlx_err)?,
        created_at: row.try_get("created_at").map_err(sqlx_err)?,
        started_at: row.try_get("started_at").map_err(sqlx_err)?,
        completed_at: row.try_get("completed_at").map_err(sqlx_err)?,
    })
}

fn sqlx_err(e: sqlx::Error) -> JobStoreError {
    JobStoreError::Backend {
        message: e.to_string(),
    }
}

/// Durable job queue backed by a Postgres `jobs` table.
pub struct PgJobStore {
    pool: PgPool,
}

impl std::fmt::Debug for PgJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgJobStore").finish()
    }
}

impl PgJobStore {
    #[must_use = "job store must be used to enqueue/claim work"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> std::result::Result<Self, JobStoreError> {
        let pool = PgPool::connect(database_url).await.map_err(sqlx_err)?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self, payload), err)]
    async fn enqueue(
        &self,
        workflow_id: Uuid,
        kind: JobKind,
        payload: serde_json::Value,
        priority: i32,
        max_retries: u32,
    ) -> Result<Uuid> {
        let job_id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, workflow_id, kind, priority, status, payload,
                retry_count, max_retries, next_run_at, created_at
            )
            VALUES ($1, $2, $3, $4, 'queued', $5, 0, $6, NOW(), NOW())
            "#,
        )
        .bind(job_id)
        .bind(workflow_id)
        .bind(kind.to_string())
        .bind(priority)
        .bind(&payload)
        .bind(max_retries as i32)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        Ok(job_id)
    }

    #[instrument(skip(self), err)]
    async fn claim(
        &self,
        worker_id: Uuid,
        lease_duration: Duration,
        max_jobs: usize,
    ) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM jobs
                WHERE status = 'queued'
                  AND next_run_at <= NOW()
                ORDER BY priority DESC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs j
            SET status = 'running',
                worker_id = $2,
                lease_expires_at = NOW() + make_interval(secs => $3),
                started_at = COALESCE(j.started_at, NOW())
            FROM claimable c
            WHERE j.id = c.id
            RETURNING j.id, j.workflow_id, j.kind, j.priority, j.status, j.payload,
                      j.worker_id, j.lease_expires_at, j.retry_count, j.max_retries,
                      j.next_run_at, j.error_message, j.created_at, j.started_at, j.completed_at
            "#,
        )
        .bind(max_jobs as i64)
        .bind(worker_id)
        .bind(lease_duration.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        rows.iter().map(row_to_job).collect()
    }

    #[instrument(skip(self), err)]
    async fn renew(&self, job_id: Uuid, worker_id: Uuid, lease_duration: Duration) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + make_interval(secs => $3)
            WHERE id = $1 AND worker_id = $2 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(lease_duration.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotOwned { job_id, worker_id });
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn complete(&self, job_id: Uuid, worker_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND worker_id = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotOwned { job_id, worker_id });
        }
        Ok(())
    }

    #[instrument(skip(self, error, cfg), err)]
    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        error: &str,
        cfg: &JobQueueConfig,
    ) -> Result<JobFailureOutcome> {
        let row = sqlx::query(
            r#"
            SELECT retry_count, max_retries
            FROM jobs
            WHERE id = $1 AND worker_id = $2
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_err)?
        .ok_or(JobStoreError::NotOwned { job_id, worker_id })?;

        let retry_count: i32 = row.try_get("retry_count").map_err(sqlx_err)?;
        let max_retries: i32 = row.try_get("max_retries").map_err(sqlx_err)?;

        if retry_count < max_retries {
            let next_attempt = (retry_count + 1) as u32;
            let delay = retry_delay(next_attempt, cfg);

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'queued',
                    worker_id = NULL,
                    lease_expires_at = NULL,
                    retry_count = retry_count + 1,
                    error_message = $2,
                    next_run_at = NOW() + make_interval(secs => $3)
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .bind(delay.as_secs_f64())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;

            Ok(JobFailureOutcome::WillRetry {
                next_attempt,
                delay,
            })
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed', error_message = $2, completed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;

            Ok(JobFailureOutcome::Terminal)
        }
    }

    #[instrument(skip(self, cfg), err)]
    async fn reclaim_expired(&self, cfg: &JobQueueConfig) -> Result<Vec<Uuid>> {
        let candidates = sqlx::query(
            r#"
            SELECT id, retry_count, max_retries
            FROM jobs
            WHERE status = 'running' AND lease_expires_at < NOW()
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let mut reclaimed = Vec::with_capacity(candidates.len());
        for row in candidates {
            let job_id: Uuid = row.try_get("id").map_err(sqlx_err)?;
            let retry_count: i32 = row.try_get("retry_count").map_err(sqlx_err)?;
            let max_retries: i32 = row.try_get("max_retries").map_err(sqlx_err)?;

            if retry_count < max_retries {
                let next_attempt = (retry_count + 1) as u32;
                let delay = retry_delay(next_attempt, cfg);
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = 'queued',
                        worker_id = NULL,
                        lease_expires_at = NULL,
                        retry_count = retry_count + 1,
                        error_message = 'lease expired',
                        next_run_at = NOW() + make_interval(secs => $2)
                    WHERE id = $1
                    "#,
                )
                .bind(job_id)
                .bind(delay.as_secs_f64())
                .execute(&self.pool)
                .await
                .map_err(sqlx_err)?;
            } else {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = 'failed',
                        worker_id = NULL,
                        lease_expires_at = NULL,
                        error_message = 'lease expired',
                        completed_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(sqlx_err)?;
            }
            reclaimed.push(job_id);
        }
        Ok(reclaimed)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_id, kind, priority, status, payload,
                   worker_id, lease_expires_at, retry_count, max_retries,
                   next_run_at, error_message, created_at, started_at, completed_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_err)?;

        row.as_ref().map(row_to_job).transpose()
    }
}
