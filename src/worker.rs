//! Worker loop (C6): claims jobs from the job store (C2), drives the
//! workflow engine (C5) against them, and reports the outcome back. Built
//! from the crate's own `tokio`/`tracing` primitives rather than copied from
//! any one example, per spec §4.6's claim/renew/execute/shutdown contract.
//!
//! Job payload contract (owned by this module and the HTTP surface, C7,
//! which enqueues jobs matching it):
//! - [`JobKind::MlWorkflow`]: `{"prompt": "<user text>"}`, starts a fresh
//!   session keyed by the workflow id.
//! - [`JobKind::Resume`]: `{"extra": {"<well-known key>": <value>, ...}}`,
//!   folded into the paused session's `extra` channel via
//!   [`AppRunner::merge_extra`] before the run resumes past its gate.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{GraphType, JobQueueConfig};
use crate::domain::{JobKind, WorkflowStatus};
use crate::event_bus::WorkflowEventBus;
use crate::graphs_full::{build_full_graph, build_thin_graph};
use crate::jobs::{JobStore, JobStoreError};
use crate::runtimes::{AppRunner, CheckpointerType, RunOutcome, RunnerError};
use crate::state::VersionedState;
use crate::workflows::WorkflowStore;

/// A single worker process's claim/execute loop.
///
/// `checkpointer_type` should be [`CheckpointerType::SQLite`] (or another
/// durable backend) for any deployment where [`JobKind::Resume`] jobs are
/// expected: each claimed job gets its own [`AppRunner`], so resuming a
/// paused session across jobs — possibly on a different worker process —
/// depends entirely on the checkpointer reading back what an earlier run
/// wrote, not on in-process state surviving between jobs.
pub struct Worker {
    worker_id: Uuid,
    job_store: Arc<dyn JobStore>,
    workflow_store: Arc<dyn WorkflowStore>,
    event_bus: Arc<WorkflowEventBus>,
    job_queue: JobQueueConfig,
    graph_type: GraphType,
    checkpointer_type: CheckpointerType,
    grace_period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    #[must_use]
    pub fn new(
        job_store: Arc<dyn JobStore>,
        workflow_store: Arc<dyn WorkflowStore>,
        event_bus: Arc<WorkflowEventBus>,
        job_queue: JobQueueConfig,
        graph_type: GraphType,
        checkpointer_type: CheckpointerType,
        grace_period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id: Uuid::now_v7(),
            job_store,
            workflow_store,
            event_bus,
            job_queue,
            graph_type,
            checkpointer_type,
            grace_period,
            shutdown,
        }
    }

    #[must_use]
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Runs the claim loop until the shutdown signal fires and, if a job is
    /// in flight at that point, until it finishes or the grace deadline
    /// elapses — whichever comes first. A periodic lease-reclaim sweep
    /// (§4.2) runs alongside claiming on `job_queue.reclaim_sweep_interval`,
    /// so a job whose worker crashed mid-lease doesn't stay `running`
    /// forever.
    pub async fn run(mut self) {
        let mut backoff = self.job_queue.poll_backoff_min;
        let mut reclaim_interval = tokio::time::interval(self.job_queue.reclaim_sweep_interval);
        loop {
            if *self.shutdown.borrow() {
                info!(worker_id = %self.worker_id, "shutdown signal observed, stopping claim loop");
                break;
            }

            tokio::select! {
                _ = reclaim_interval.tick() => {
                    self.sweep_expired_leases().await;
                }
                claimed = self.job_store.claim(self.worker_id, self.job_queue.lease_duration, 1) => {
                    match claimed {
                        Ok(jobs) if !jobs.is_empty() => {
                            backoff = self.job_queue.poll_backoff_min;
                            for job in jobs {
                                self.execute(job).await;
                            }
                        }
                        Ok(_) => {
                            self.wait_or_shutdown(backoff).await;
                            backoff = (backoff * 2).min(self.job_queue.poll_backoff_cap);
                        }
                        Err(err) => {
                            error!(worker_id = %self.worker_id, %err, "job claim failed");
                            self.wait_or_shutdown(backoff).await;
                        }
                    }
                }
            }
        }
    }

    /// Routes running jobs whose lease expired through the job store's
    /// retry/terminal decision (see `JobStore::reclaim_expired`).
    async fn sweep_expired_leases(&self) {
        match self.job_store.reclaim_expired(&self.job_queue).await {
            Ok(ids) if !ids.is_empty() => {
                warn!(worker_id = %self.worker_id, count = ids.len(), "reclaimed jobs with expired leases");
            }
            Ok(_) => {}
            Err(err) => {
                error!(worker_id = %self.worker_id, %err, "lease reclaim sweep failed");
            }
        }
    }

    async fn wait_or_shutdown(&mut self, backoff: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = self.shutdown.changed() => {}
        }
    }

    /// Claim, renew, run, and settle exactly one job, per spec §4.6 steps 2-4.
    async fn execute(&self, job: crate::domain::Job) {
        let job_id = job.id;
        info!(worker_id = %self.worker_id, %job_id, kind = %job.kind, "claimed job");

        let (job_done_tx, job_done_rx) = watch::channel(false);
        let renew_task = self.spawn_lease_renewal(job_id, job_done_rx.clone());
        let grace_cancel = self.spawn_grace_cancel(job_done_rx);

        let outcome = self.run_job(&job, grace_cancel.subscribe()).await;

        let _ = job_done_tx.send(true);
        renew_task.abort();

        match outcome {
            Ok(RunOutcome::Completed(_)) => {
                if let Err(err) = self.job_store.complete(job_id, self.worker_id).await {
                    error!(%job_id, %err, "failed to mark job completed");
                }
                if let Err(err) = self
                    .workflow_store
                    .transition(job.workflow_id, WorkflowStatus::Completed)
                    .await
                {
                    warn!(%job_id, %err, "failed to transition workflow to completed");
                }
            }
            Ok(RunOutcome::InterruptedAt(node)) => {
                if let Err(err) = self.job_store.complete(job_id, self.worker_id).await {
                    error!(%job_id, %err, "failed to mark interrupted job completed");
                }
                if let Err(err) = self
                    .workflow_store
                    .transition(job.workflow_id, WorkflowStatus::AwaitingHuman)
                    .await
                {
                    warn!(%job_id, %err, "failed to transition workflow to awaiting-human");
                }
                info!(%job_id, node = ?node, "workflow interrupted, awaiting human approval");
            }
            Ok(RunOutcome::Cancelled) => {
                info!(%job_id, "job run cancelled by shutdown grace deadline; leaving lease to expire");
            }
            Err(err) => {
                self.settle_failure(job_id, &err).await;
            }
        }
    }

    async fn settle_failure(&self, job_id: Uuid, err: &RunnerError) {
        match self.job_store.fail(job_id, self.worker_id, &err.to_string(), &self.job_queue).await {
            Ok(outcome) => warn!(%job_id, ?outcome, %err, "job run failed"),
            Err(JobStoreError::NotOwned { .. }) => {
                warn!(%job_id, "job lease already reclaimed, dropping failure report");
            }
            Err(store_err) => error!(%job_id, %store_err, "failed to record job failure"),
        }
    }

    /// Renews the job's lease at `lease/3` until `job_done` fires.
    fn spawn_lease_renewal(
        &self,
        job_id: Uuid,
        mut job_done: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let job_store = Arc::clone(&self.job_store);
        let worker_id = self.worker_id;
        let lease_duration = self.job_queue.lease_duration;
        let renew_interval = lease_duration / 3;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(renew_interval) => {
                        if let Err(err) = job_store.renew(job_id, worker_id, lease_duration).await {
                            warn!(%job_id, %err, "lease renewal failed, stopping renewal");
                            break;
                        }
                    }
                    changed = job_done.changed() => {
                        if changed.is_err() || *job_done.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// On shutdown, gives the in-flight job `grace_period` to finish before
    /// flipping the run's cancellation watch, per spec §4.6 step 5.
    fn spawn_grace_cancel(&self, job_done: watch::Receiver<bool>) -> watch::Sender<bool> {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let mut shutdown_rx = self.shutdown.clone();
        let mut job_done = job_done;
        let grace_period = self.grace_period;
        let cancel_tx_task = cancel_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = job_done.changed() => return,
            }
            tokio::select! {
                _ = tokio::time::sleep(grace_period) => {
                    let _ = cancel_tx_task.send(true);
                }
                _ = job_done.changed() => {}
            }
        });
        cancel_tx
    }

    async fn run_job(
        &self,
        job: &crate::domain::Job,
        cancel: watch::Receiver<bool>,
    ) -> Result<RunOutcome, RunnerError> {
        let app = match self.graph_type {
            GraphType::Thin => build_thin_graph(),
            GraphType::Full => build_full_graph(),
        };
        let mut runner = AppRunner::with_options(app, self.checkpointer_type.clone(), true)
            .await
            .with_workflow_bus(Arc::clone(&self.event_bus), job.workflow_id);

        let session_id = job.workflow_id.to_string();

        match job.kind {
            JobKind::MlWorkflow => {
                let prompt = job
                    .payload
                    .get("prompt")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                runner
                    .create_session(session_id.clone(), VersionedState::new_with_user_message(prompt))
                    .await?;
            }
            JobKind::Resume => {
                // Restores the paused session from its checkpoint; the
                // interrupt-before gate it stopped at is still the session's
                // frontier, so `run` resumes right past it once `extra` has
                // the human's answer merged in.
                runner
                    .create_session(session_id.clone(), VersionedState::builder().build())
                    .await?;
                let extra: FxHashMap<String, serde_json::Value> = job
                    .payload
                    .get("extra")
                    .and_then(|v| v.as_object())
                    .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                if let Some(responses) = extra.get(crate::nodes::support::keys::RESPONSES) {
                    self.event_bus.publish(
                        job.workflow_id,
                        "responses-collected",
                        serde_json::json!({"responses": responses}),
                    );
                }
                if !extra.is_empty() {
                    runner.merge_extra(&session_id, extra).await?;
                }
                self.event_bus.publish(
                    job.workflow_id,
                    "workflow-resumed",
                    serde_json::json!({"status": "active"}),
                );
            }
        }

        runner.run(&session_id, Some(cancel)).await
    }
}
