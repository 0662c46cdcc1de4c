//! `policy_eval`: the guardrail gate. Combines the technical and cost
//! critiques into a single pass/fail verdict before the plan is allowed in
//! front of a human for final approval.

use async_trait::async_trait;
use serde_json::json;

use crate::channels::errors::{ErrorEvent, LadderError};
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct PolicyEvalNode;

#[async_trait]
impl Node for PolicyEvalNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("policy_eval", "evaluating plan against policy")?;

        let tech = extra_get(&snapshot.extra, keys::TECH_CRITIQUE).clone();
        let cost = extra_get(&snapshot.extra, keys::COST_CRITIQUE).clone();

        let tech_ok = tech.get("approved").and_then(|v| v.as_bool()).unwrap_or(false);
        let cost_ok = cost.get("approved").and_then(|v| v.as_bool()).unwrap_or(false);
        let mut violations = Vec::new();
        if !tech_ok {
            violations.push("technical critique did not approve the plan".to_string());
        }
        if !cost_ok {
            violations.push("cost critique did not approve the plan".to_string());
        }

        let approved = violations.is_empty();
        let verdict = json!({
            "approved": approved,
            "violations": violations,
        });

        let mut errors = Vec::new();
        if !approved {
            errors.push(
                ErrorEvent::node("policy_eval", ctx.step, LadderError::msg("policy violations found"))
                    .with_context(verdict.clone())
                    .with_tag("policy"),
            );
        }

        let reason_card = ReasonCardBuilder::new("policy_eval", "policy_gate")
            .reasoning(if approved {
                "Both technical and cost critiques approved the plan."
            } else {
                "One or more critiques did not approve the plan."
            })
            .decision(if approved { "approved" } else { "rejected" })
            .confidence(1.0)
            .inputs(json!({"tech": tech, "cost": cost}))
            .outputs(verdict.clone())
            .category("policy")
            .priority(if approved { 0 } else { 2 })
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::POLICY_EVAL.to_string(), verdict);

        let mut partial = NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]);
        if !errors.is_empty() {
            partial = partial.with_errors(errors);
        }
        Ok(partial)
    }
}
