//! `hitl_gate_final`: the second human-in-the-loop gate. Marked
//! interrupt-before like `hitl_gate_input`; only runs once the approval
//! endpoint has written a decision into `extra["final_approval"]` and the
//! run is resumed. A rejection halts the workflow rather than proceeding
//! to codegen — there is no loop-back from this gate.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct HitlGateFinalNode;

#[async_trait]
impl Node for HitlGateFinalNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("hitl_gate_final", "recording final human decision")?;

        let approval = extra_get(&snapshot.extra, keys::FINAL_APPROVAL).clone();
        let decision = approval
            .get("decision")
            .and_then(|v| v.as_str())
            .ok_or(NodeError::MissingInput {
                what: "final_approval.decision (approved|rejected)",
            })?;

        if decision != "approved" && decision != "rejected" {
            return Err(NodeError::ValidationFailed(format!(
                "final_approval.decision must be \"approved\" or \"rejected\", got {decision:?}"
            )));
        }

        let reason_card = ReasonCardBuilder::new("hitl_gate_final", "final_decision")
            .reasoning(format!("Human reviewer recorded decision: {decision}."))
            .decision(decision)
            .confidence(1.0)
            .inputs(extra_get(&snapshot.extra, keys::POLICY_EVAL).clone())
            .outputs(approval.clone())
            .category("hitl")
            .build();

        if decision == "rejected" {
            return Err(NodeError::ValidationFailed(
                "workflow rejected at final human approval gate".to_string(),
            ));
        }

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::FINAL_APPROVAL.to_string(), json!({"decision": decision}));

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
