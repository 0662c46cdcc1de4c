//! `diff_and_persist`: the terminal node. Bundles the diff and rationale
//! into an artifact record. Per the spec's non-goals this crate never
//! writes to external artifact storage itself — it hands back the record
//! for the caller (worker/HTTP layer) to persist via `domain::Artifact`.

use async_trait::async_trait;
use serde_json::json;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct DiffAndPersistNode;

#[async_trait]
impl Node for DiffAndPersistNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("diff_and_persist", "finalizing artifact")?;

        let diff = extra_get(&snapshot.extra, keys::CODEGEN_DIFF).clone();
        let rationale = extra_get(&snapshot.extra, keys::RATIONALE).clone();

        let artifact = json!({
            "kind": "diff",
            "diff": diff,
            "rationale": rationale,
        });

        let reason_card = ReasonCardBuilder::new("diff_and_persist", "finalization")
            .reasoning("Bundled the final diff and rationale into the artifact record.")
            .decision("persisted")
            .confidence(1.0)
            .inputs(json!({"diff": diff, "rationale": rationale}))
            .outputs(artifact.clone())
            .category("persistence")
            .build();

        let summary = Message::assistant("Workflow complete: diff and rationale are ready.");

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::ARTIFACT.to_string(), artifact);

        Ok(NodePartial::new()
            .with_messages(vec![summary])
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
