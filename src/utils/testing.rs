//! Test doubles shared by scheduler and runner tests.
//!
//! Not compiled into release builds; gated behind `cfg(test)` / `cfg(feature = "test-util")`
//! consumers, exposed as a normal module so integration tests under `tests/` can reach it.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Build a [`StateSnapshot`] with the given messages/extra channel versions.
/// The errors and reason-cards channels are left at version `1`, empty.
#[must_use]
pub fn create_test_snapshot(messages_version: u32, extra_version: u32) -> StateSnapshot {
    StateSnapshot {
        messages: Vec::new(),
        messages_version,
        extra: FxHashMap::default(),
        extra_version,
        errors: Vec::new(),
        errors_version: 1,
        reason_cards: Vec::new(),
        reason_cards_version: 1,
    }
}

/// A node that appends a single message tagged with its own id.
struct EchoNode {
    id: &'static str,
    delay: Option<Duration>,
}

#[async_trait]
impl Node for EchoNode {
    async fn run(&self, _snapshot: StateSnapshot, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(NodePartial::new().with_messages(vec![Message::assistant(&format!(
            "{}@{}",
            self.id, ctx.step
        ))]))
    }
}

/// A node that always fails with `NodeError::MissingInput { what: "test_key" }`.
#[derive(Default)]
pub struct FailingNode;

#[async_trait]
impl Node for FailingNode {
    async fn run(&self, _snapshot: StateSnapshot, _ctx: NodeContext) -> Result<NodePartial, NodeError> {
        Err(NodeError::MissingInput { what: "test_key" })
    }
}

/// Registry with two instantaneous nodes, `"A"` and `"B"`.
#[must_use]
pub fn make_test_registry() -> FxHashMap<NodeKind, Arc<dyn Node>> {
    let mut nodes: FxHashMap<NodeKind, Arc<dyn Node>> = FxHashMap::default();
    nodes.insert(
        NodeKind::Custom("A".into()),
        Arc::new(EchoNode { id: "A", delay: None }),
    );
    nodes.insert(
        NodeKind::Custom("B".into()),
        Arc::new(EchoNode { id: "B", delay: None }),
    );
    nodes
}

/// Registry with two nodes, `"A"` and `"B"`, each sleeping briefly before
/// returning — enough to make completion order depend on scheduling rather
/// than raw speed, for concurrency-ordering tests.
#[must_use]
pub fn make_delayed_registry() -> FxHashMap<NodeKind, Arc<dyn Node>> {
    let mut nodes: FxHashMap<NodeKind, Arc<dyn Node>> = FxHashMap::default();
    nodes.insert(
        NodeKind::Custom("A".into()),
        Arc::new(EchoNode {
            id: "A",
            delay: Some(Duration::from_millis(20)),
        }),
    );
    nodes.insert(
        NodeKind::Custom("B".into()),
        Arc::new(EchoNode {
            id: "B",
            delay: Some(Duration::from_millis(5)),
        }),
    );
    nodes
}
