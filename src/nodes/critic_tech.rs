//! `critic_tech`: reviews the plan for technical soundness (missing steps,
//! risky assumptions). Runs unconditionally after `planner`; its findings
//! feed `policy_eval` alongside `critic_cost`'s.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct CriticTechNode;

#[async_trait]
impl Node for CriticTechNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("critic_tech", "reviewing plan for technical risk")?;

        let plan = extra_get(&snapshot.extra, keys::PLAN).clone();
        let steps = plan
            .get("steps")
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0);

        let has_test_step = plan
            .get("steps")
            .and_then(|v| v.as_array())
            .is_some_and(|steps| steps.iter().any(|s| s.as_str().is_some_and(|s| s.contains("test"))));

        let mut issues = Vec::new();
        if !has_test_step {
            issues.push("plan has no explicit test step".to_string());
        }
        if steps == 0 {
            issues.push("plan has no steps at all".to_string());
        }

        let critique = json!({
            "approved": issues.is_empty(),
            "issues": issues,
        });

        let reason_card = ReasonCardBuilder::new("critic_tech", "technical_review")
            .reasoning(if critique["approved"].as_bool().unwrap_or(false) {
                "Plan covers the expected steps, including testing."
            } else {
                "Plan is missing expected technical coverage."
            })
            .decision(if critique["approved"].as_bool().unwrap_or(false) {
                "approved"
            } else {
                "flagged"
            })
            .confidence(0.75)
            .inputs(plan)
            .outputs(critique.clone())
            .category("critique")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::TECH_CRITIQUE.to_string(), critique);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
