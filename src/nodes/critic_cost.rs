//! `critic_cost`: estimates the rough cost (step count as a proxy) of the
//! plan and flags anything that looks disproportionately large.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

/// Plans with more steps than this are flagged for cost review rather than
/// auto-approved; a real deployment would price this against token/compute
/// budgets instead.
const STEP_COUNT_BUDGET: usize = 12;

#[derive(Clone, Default)]
pub struct CriticCostNode;

#[async_trait]
impl Node for CriticCostNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("critic_cost", "estimating plan cost")?;
        let plan = extra_get(&snapshot.extra, keys::PLAN).clone();
        let step_count = plan
            .get("steps")
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0);

        let within_budget = step_count <= STEP_COUNT_BUDGET;
        let critique = json!({
            "approved": within_budget,
            "estimated_steps": step_count,
            "budget": STEP_COUNT_BUDGET,
        });

        let reason_card = ReasonCardBuilder::new("critic_cost", "cost_review")
            .reasoning(format!(
                "Plan has {step_count} steps against a budget of {STEP_COUNT_BUDGET}."
            ))
            .decision(if within_budget { "approved" } else { "flagged" })
            .confidence(0.7)
            .inputs(plan)
            .outputs(critique.clone())
            .category("critique")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::COST_CRITIQUE.to_string(), critique);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
