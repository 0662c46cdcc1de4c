//! Per-workflow event topics backing the SSE surface (C3).
//!
//! Generalizes [`super::hub::EventHub`]'s single process-wide broadcast
//! channel into a registry of independently-lived topics, one per workflow,
//! each retaining a bounded history so a reconnecting SSE client can replay
//! what it missed instead of losing events between connections.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::EventBusConfig;
use crate::domain::WorkflowEventRow;

/// One workflow's event stream: a broadcast channel fanning out to live
/// subscribers, plus a bounded ring buffer of recent events for replay.
pub struct Topic {
    sender: broadcast::Sender<WorkflowEventRow>,
    history: Mutex<VecDeque<WorkflowEventRow>>,
    history_capacity: usize,
    trim_to: usize,
}

impl Topic {
    fn new(cfg: &EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(cfg.subscriber_buffer_capacity.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::new()),
            history_capacity: cfg.topic_history_capacity,
            trim_to: cfg.trim_to(),
        }
    }

    /// Record `event` in history and fan it out to current subscribers. A
    /// send error here just means there are no live subscribers right now;
    /// history still captures the event for later replay.
    fn publish(&self, event: WorkflowEventRow) {
        {
            let mut history = self.history.lock();
            history.push_back(event.clone());
            if history.len() > self.history_capacity {
                let drop_count = history.len() - self.trim_to;
                history.drain(0..drop_count);
            }
        }
        let _ = self.sender.send(event);
    }

    /// History entries with `id` greater than `after` (or all retained
    /// history when `after` is `None`), oldest first.
    fn replay(&self, after: Option<i64>) -> Vec<WorkflowEventRow> {
        self.history
            .lock()
            .iter()
            .filter(|e| after.map_or(true, |cursor| e.id > cursor))
            .cloned()
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<WorkflowEventRow> {
        self.sender.subscribe()
    }
}

/// Registry of per-workflow [`Topic`]s, created lazily on first publish or
/// subscribe. A topic outlives any single subscriber; SSE clients reconnect
/// against the same topic rather than triggering a new one.
pub struct WorkflowEventBus {
    topics: RwLock<FxHashMap<Uuid, Arc<Topic>>>,
    cfg: EventBusConfig,
    next_id: AtomicI64,
}

impl WorkflowEventBus {
    #[must_use]
    pub fn new(cfg: EventBusConfig) -> Self {
        Self {
            topics: RwLock::new(FxHashMap::default()),
            cfg,
            next_id: AtomicI64::new(1),
        }
    }

    fn topic(&self, workflow_id: Uuid) -> Arc<Topic> {
        if let Some(topic) = self.topics.read().get(&workflow_id) {
            return Arc::clone(topic);
        }
        let mut topics = self.topics.write();
        Arc::clone(
            topics
                .entry(workflow_id)
                .or_insert_with(|| Arc::new(Topic::new(&self.cfg))),
        )
    }

    /// Publish a durable event for `workflow_id`, assigning it the next
    /// monotonic id within this process.
    pub fn publish(
        &self,
        workflow_id: Uuid,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> WorkflowEventRow {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = WorkflowEventRow {
            id,
            workflow_id,
            kind: kind.into(),
            payload,
            created_at: chrono::Utc::now(),
        };
        self.topic(workflow_id).publish(event.clone());
        event
    }

    /// Subscribe to `workflow_id`'s live stream, returning full retained
    /// history alongside the receiver so a caller can catch up first.
    pub fn subscribe(
        &self,
        workflow_id: Uuid,
    ) -> (Vec<WorkflowEventRow>, broadcast::Receiver<WorkflowEventRow>) {
        self.subscribe_after(workflow_id, None)
    }

    /// Subscribe, replaying only events with `id > after`. Used when an SSE
    /// client reconnects with a `Last-Event-ID` header.
    pub fn subscribe_after(
        &self,
        workflow_id: Uuid,
        after: Option<i64>,
    ) -> (Vec<WorkflowEventRow>, broadcast::Receiver<WorkflowEventRow>) {
        let topic = self.topic(workflow_id);
        let receiver = topic.subscribe();
        let backlog = topic.replay(after);
        (backlog, receiver)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.cfg.heartbeat_interval
    }
}
