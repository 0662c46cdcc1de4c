//! Async job queue (C2): durable work items that drive a worker (C6) through
//! the workflow engine (C5).
//!
//! `JobStore` is the storage-agnostic contract; [`InMemoryJobStore`] backs
//! tests and ephemeral runs, [`postgres::PgJobStore`] (feature `postgres`)
//! is the durable backend. Both implement claim-with-lease semantics:
//! `claim` atomically transitions queued jobs to running and hands out a
//! lease the worker must `renew` before it expires, mirroring
//! `durable::persistence::postgres`'s `claim_task`/`heartbeat_task`/
//! `fail_task`/`reclaim_stale_tasks` group, generalized from activities to
//! whole workflow jobs.

#[cfg(feature = "postgres")]
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use miette::Diagnostic;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::JobQueueConfig;
use crate::domain::{Job, JobKind, JobStatus};

/// Errors from job store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum JobStoreError {
    #[error("job not found: {job_id}")]
    #[diagnostic(
        code(weavegraph::jobs::not_found),
        help("Ensure the job id `{job_id}` was actually enqueued and has not been pruned.")
    )]
    NotFound { job_id: Uuid },

    #[error("job {job_id} is not owned by worker {worker_id}")]
    #[diagnostic(
        code(weavegraph::jobs::not_owned),
        help("The job's lease likely expired and was reclaimed by another worker; stop this attempt.")
    )]
    NotOwned { job_id: Uuid, worker_id: Uuid },

    #[error("backend error: {message}")]
    #[diagnostic(code(weavegraph::jobs::backend))]
    Backend { message: String },

    #[error("serialization error: {0}")]
    #[diagnostic(code(weavegraph::jobs::serde))]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JobStoreError>;

/// Outcome of [`JobStore::fail`]: whether the job was requeued for another
/// attempt or moved to its terminal `failed` state.
#[derive(Debug, Clone, PartialEq)]
pub enum JobFailureOutcome {
    WillRetry { next_attempt: u32, delay: Duration },
    Terminal,
}

/// Exponential backoff with jitter for job retries, in the shape of
/// `RetryPolicy::delay_for_attempt`: `min(base * 2^(attempt-1), cap)`,
/// jittered by up to 10% to avoid synchronized retries across jobs.
#[must_use]
pub fn retry_delay(attempt: u32, cfg: &JobQueueConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let base = cfg.backoff_base.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
    let capped = base.min(cfg.backoff_cap.as_secs_f64());
    let jitter_range = capped * 0.1;
    let offset = rand::rng().random_range(-jitter_range..=jitter_range);
    Duration::from_secs_f64((capped + offset).max(0.0))
}

/// Durable work queue behind a workflow's async execution.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueue a new job, immediately runnable (`next_run_at` now).
    async fn enqueue(
        &self,
        workflow_id: Uuid,
        kind: JobKind,
        payload: Value,
        priority: i32,
        max_retries: u32,
    ) -> Result<Uuid>;

    /// Atomically claim up to `max_jobs` runnable jobs for `worker_id`,
    /// granting each a lease of `lease_duration`.
    async fn claim(
        &self,
        worker_id: Uuid,
        lease_duration: Duration,
        max_jobs: usize,
    ) -> Result<Vec<Job>>;

    /// Extend a held lease. Fails with `NotOwned` if the job was reclaimed.
    async fn renew(&self, job_id: Uuid, worker_id: Uuid, lease_duration: Duration) -> Result<()>;

    /// Mark a job as successfully completed.
    async fn complete(&self, job_id: Uuid, worker_id: Uuid) -> Result<()>;

    /// Record a failed attempt. Requeues with backoff if under
    /// `max_retries`, otherwise transitions the job to `failed`.
    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        error: &str,
        cfg: &JobQueueConfig,
    ) -> Result<JobFailureOutcome>;

    /// Route running jobs whose lease has expired through the same
    /// retry-vs-terminal decision as [`fail`](Self::fail), with a synthetic
    /// "lease expired" `error_message`: requeue with backoff if under
    /// `max_retries`, otherwise move to terminal `failed`. Intended to be
    /// polled periodically by a reclaim sweep (see [`JobQueueConfig::reclaim_sweep_interval`]),
    /// never auto-invoked by `claim`/`fail` themselves.
    async fn reclaim_expired(&self, cfg: &JobQueueConfig) -> Result<Vec<Uuid>>;

    /// Fetch a single job by id, regardless of status.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;
}

/// In-process job store for tests and single-node ephemeral runs.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<Vec<Job>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    #[tracing::instrument(skip(self, payload), err)]
    async fn enqueue(
        &self,
        workflow_id: Uuid,
        kind: JobKind,
        payload: Value,
        priority: i32,
        max_retries: u32,
    ) -> Result<Uuid> {
        let job = Job::new(workflow_id, kind, payload, priority, max_retries);
        let id = job.id;
        self.inner.lock().await.push(job);
        Ok(id)
    }

    #[tracing::instrument(skip(self), err)]
    async fn claim(
        &self,
        worker_id: Uuid,
        lease_duration: Duration,
        max_jobs: usize,
    ) -> Result<Vec<Job>> {
        let mut jobs = self.inner.lock().await;
        let now = Utc::now();

        let mut eligible: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued && j.next_run_at <= now)
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by(|&a, &b| {
            jobs[b]
                .priority
                .cmp(&jobs[a].priority)
                .then(jobs[a].created_at.cmp(&jobs[b].created_at))
        });
        eligible.truncate(max_jobs);

        let mut claimed = Vec::with_capacity(eligible.len());
        for idx in eligible {
            let job = &mut jobs[idx];
            job.status = JobStatus::Running;
            job.worker_id = Some(worker_id);
            job.lease_expires_at = Some(now + chrono::Duration::from_std(lease_duration).unwrap_or_default());
            if job.started_at.is_none() {
                job.started_at = Some(now);
            }
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    #[tracing::instrument(skip(self), err)]
    async fn renew(&self, job_id: Uuid, worker_id: Uuid, lease_duration: Duration) -> Result<()> {
        let mut jobs = self.inner.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(JobStoreError::NotFound { job_id })?;
        if job.worker_id != Some(worker_id) || job.status != JobStatus::Running {
            return Err(JobStoreError::NotOwned { job_id, worker_id });
        }
        job.lease_expires_at =
            Some(Utc::now() + chrono::Duration::from_std(lease_duration).unwrap_or_default());
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    async fn complete(&self, job_id: Uuid, worker_id: Uuid) -> Result<()> {
        let mut jobs = self.inner.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(JobStoreError::NotFound { job_id })?;
        if job.worker_id != Some(worker_id) {
            return Err(JobStoreError::NotOwned { job_id, worker_id });
        }
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    #[tracing::instrument(skip(self, error, cfg), err)]
    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        error: &str,
        cfg: &JobQueueConfig,
    ) -> Result<JobFailureOutcome> {
        let mut jobs = self.inner.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(JobStoreError::NotFound { job_id })?;
        if job.worker_id != Some(worker_id) {
            return Err(JobStoreError::NotOwned { job_id, worker_id });
        }

        job.error_message = Some(error.to_string());

        if job.retry_count < job.max_retries {
            job.retry_count += 1;
            let delay = retry_delay(job.retry_count, cfg);
            job.status = JobStatus::Queued;
            job.worker_id = None;
            job.lease_expires_at = None;
            job.next_run_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            Ok(JobFailureOutcome::WillRetry {
                next_attempt: job.retry_count,
                delay,
            })
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            Ok(JobFailureOutcome::Terminal)
        }
    }

    #[tracing::instrument(skip(self, cfg), err)]
    async fn reclaim_expired(&self, cfg: &JobQueueConfig) -> Result<Vec<Uuid>> {
        let mut jobs = self.inner.lock().await;
        let now = Utc::now();
        let mut reclaimed = Vec::new();
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Running && job.lease_expires_at.is_some_and(|exp| exp < now)
            {
                job.error_message = Some("lease expired".to_string());
                job.worker_id = None;
                job.lease_expires_at = None;
                if job.retry_count < job.max_retries {
                    job.retry_count += 1;
                    let delay = retry_delay(job.retry_count, cfg);
                    job.status = JobStatus::Queued;
                    job.next_run_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
                } else {
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(now);
                }
                reclaimed.push(job.id);
            }
        }
        Ok(reclaimed)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .inner
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }
}
