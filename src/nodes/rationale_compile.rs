//! `rationale_compile`: assembles a single human-readable rationale out of
//! the plan, critiques, and validation report, for attachment to the
//! persisted artifact.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct RationaleCompileNode;

#[async_trait]
impl Node for RationaleCompileNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("rationale_compile", "compiling rationale summary")?;

        let plan = extra_get(&snapshot.extra, keys::PLAN).clone();
        let tech = extra_get(&snapshot.extra, keys::TECH_CRITIQUE).clone();
        let cost = extra_get(&snapshot.extra, keys::COST_CRITIQUE).clone();
        let validation = extra_get(&snapshot.extra, keys::VALIDATION_REPORT).clone();

        let goal = plan.get("goal").and_then(|v| v.as_str()).unwrap_or("(unknown goal)");
        let rationale = format!(
            "Goal: {goal}\nTechnical review: {}\nCost review: {}\nValidation: {}",
            if tech.get("approved").and_then(|v| v.as_bool()).unwrap_or(false) {
                "approved"
            } else {
                "flagged"
            },
            if cost.get("approved").and_then(|v| v.as_bool()).unwrap_or(false) {
                "approved"
            } else {
                "flagged"
            },
            if validation.get("passed").and_then(|v| v.as_bool()).unwrap_or(false) {
                "passed"
            } else {
                "failed"
            },
        );

        let reason_card = ReasonCardBuilder::new("rationale_compile", "rationale_assembly")
            .reasoning("Assembled a single rationale summary from the plan, critiques, and validation outcome.")
            .decision("compiled")
            .confidence(0.9)
            .inputs(json!({"plan": plan, "tech": tech, "cost": cost, "validation": validation}))
            .outputs(json!({"rationale": rationale}))
            .category("rationale")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::RATIONALE.to_string(), json!(rationale));

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
