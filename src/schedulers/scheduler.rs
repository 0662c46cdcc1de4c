//! Version-gated, concurrency-bounded superstep execution.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::event_bus::EventEmitter;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Per-session record of which channel versions each node last observed.
///
/// Keyed by the node's encoded id (see [`NodeKind::encode`]), then by channel
/// name (`"messages"`, `"extra"`, `"errors"`, `"reason_cards"`).
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
}

/// Outcome of running one superstep.
#[derive(Debug)]
pub struct StepRunResult {
    /// Nodes that actually executed this step, in frontier order.
    pub ran_nodes: Vec<NodeKind>,
    /// Nodes that were not run: `End`/`Start`, version-gated, or unregistered.
    pub skipped_nodes: Vec<NodeKind>,
    /// Raw node output, one entry per entry in `ran_nodes`. Order is
    /// completion order, not frontier order — callers that need frontier
    /// order should re-key by `NodeKind`.
    pub outputs: Vec<(NodeKind, NodePartial)>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    /// A node returned `Err` while executing.
    #[error("node {kind} failed at step {step}: {source}")]
    #[diagnostic(code(weavegraph::schedulers::node_run))]
    NodeRun {
        kind: NodeKind,
        step: u64,
        #[source]
        source: NodeError,
    },

    /// The tokio task running a node panicked or was cancelled.
    #[error("node execution task failed: {0}")]
    #[diagnostic(code(weavegraph::schedulers::join))]
    Join(#[from] JoinError),
}

fn channel_versions(snapshot: &StateSnapshot) -> FxHashMap<String, u64> {
    let mut versions = FxHashMap::default();
    versions.insert("messages".to_string(), u64::from(snapshot.messages_version));
    versions.insert("extra".to_string(), u64::from(snapshot.extra_version));
    versions.insert("errors".to_string(), u64::from(snapshot.errors_version));
    versions.insert(
        "reason_cards".to_string(),
        u64::from(snapshot.reason_cards_version),
    );
    versions
}

/// Decides which frontier nodes need to run and executes them concurrently,
/// bounded by a fixed permit count.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub concurrency_limit: usize,
}

impl Scheduler {
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Whether `id` needs to run given the channel versions in `snapshot`.
    ///
    /// A node that has never run (no entry in `versions_seen`) always runs.
    /// Otherwise it runs again only if at least one channel's version has
    /// moved since it last ran.
    #[must_use]
    pub fn should_run(&self, state: &SchedulerState, id: &str, snapshot: &StateSnapshot) -> bool {
        match state.versions_seen.get(id) {
            None => true,
            Some(seen) => {
                let current = channel_versions(snapshot);
                current
                    .iter()
                    .any(|(channel, version)| seen.get(channel).copied().unwrap_or(0) != *version)
            }
        }
    }

    /// Record the channel versions `id` observed this run.
    pub fn record_seen(&self, state: &mut SchedulerState, id: &str, snapshot: &StateSnapshot) {
        state
            .versions_seen
            .insert(id.to_string(), channel_versions(snapshot));
    }

    /// Run one superstep over `frontier`.
    ///
    /// `Start`/`End` are always skipped. Remaining nodes are version-gated
    /// via [`should_run`](Self::should_run); eligible nodes run concurrently,
    /// bounded by the scheduler's concurrency limit, and the versions they
    /// observed are recorded via [`record_seen`](Self::record_seen) before
    /// returning.
    pub async fn superstep(
        &self,
        state: &mut SchedulerState,
        nodes: &FxHashMap<NodeKind, Arc<dyn Node>>,
        frontier: Vec<NodeKind>,
        snapshot: StateSnapshot,
        step: u64,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<StepRunResult, SchedulerError> {
        let mut skipped_nodes = Vec::new();
        let mut to_run: Vec<(NodeKind, Arc<dyn Node>)> = Vec::new();

        for kind in &frontier {
            if kind.is_start() || kind.is_end() {
                skipped_nodes.push(kind.clone());
                continue;
            }

            let id = kind.encode();
            if !self.should_run(state, &id, &snapshot) {
                skipped_nodes.push(kind.clone());
                continue;
            }

            match nodes.get(kind) {
                Some(node) => to_run.push((kind.clone(), node.clone())),
                None => {
                    tracing::warn!(node = ?kind, "scheduler: node not registered in graph, skipping");
                    skipped_nodes.push(kind.clone());
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let snapshot = Arc::new(snapshot);
        let mut handles = Vec::with_capacity(to_run.len());

        for (kind, node) in &to_run {
            let permits = semaphore.clone();
            let node = node.clone();
            let kind_owned = kind.clone();
            let snapshot = snapshot.clone();
            let emitter = emitter.clone();
            let node_id = kind_owned.encode();

            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore closed");
                let ctx = NodeContext {
                    node_id,
                    step,
                    event_emitter: emitter,
                };
                let result = node.run((*snapshot).clone(), ctx).await;
                (kind_owned, result)
            }));
        }

        let mut outputs = Vec::with_capacity(handles.len());
        for handle in handles {
            let (kind, result) = handle.await?;
            let partial = result.map_err(|source| SchedulerError::NodeRun {
                kind: kind.clone(),
                step,
                source,
            })?;
            outputs.push((kind, partial));
        }

        let ran_nodes: Vec<NodeKind> = to_run.into_iter().map(|(kind, _)| kind).collect();
        for kind in &ran_nodes {
            self.record_seen(state, &kind.encode(), &snapshot);
        }

        Ok(StepRunResult {
            ran_nodes,
            skipped_nodes,
            outputs,
        })
    }
}
