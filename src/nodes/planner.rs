//! `planner`: turns complete requirements into a concrete implementation
//! plan. This is the first node every path through the full graph
//! converges on before the critic/policy stages.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct PlannerNode;

#[async_trait]
impl Node for PlannerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("planner", "drafting implementation plan")?;

        let requirements = extra_get(&snapshot.extra, keys::REQUIREMENTS).clone();
        let goal = requirements
            .get("goal")
            .and_then(|v| v.as_str())
            .ok_or(NodeError::MissingInput {
                what: "requirements.goal",
            })?;

        let steps = vec![
            format!("Clarify scope for: {goal}"),
            "Identify affected modules".to_string(),
            "Draft implementation steps".to_string(),
            "Draft test plan".to_string(),
        ];
        let plan = json!({
            "goal": goal,
            "steps": steps,
        });

        let reason_card = ReasonCardBuilder::new("planner", "plan_drafting")
            .reasoning(format!("Derived a {}-step plan from the extracted goal.", steps.len()))
            .decision("plan_drafted")
            .confidence(0.8)
            .inputs(requirements)
            .outputs(plan.clone())
            .category("planning")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::PLAN.to_string(), plan);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
