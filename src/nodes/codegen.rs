//! `codegen`: produces a diff from the approved plan. Per the spec's
//! non-goals this crate never shells out to an actual code generator or
//! touches the filesystem — it synthesizes a textual diff stand-in so the
//! downstream validators/rationale/persist stages have something concrete
//! to operate on.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct CodegenNode;

#[async_trait]
impl Node for CodegenNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("codegen", "synthesizing diff from approved plan")?;

        let plan = extra_get(&snapshot.extra, keys::PLAN).clone();
        let steps = plan
            .get("steps")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut diff = String::from("--- plan-derived-change\n+++ plan-derived-change\n");
        for (i, step) in steps.iter().enumerate() {
            let step = step.as_str().unwrap_or_default();
            diff.push_str(&format!("+ // step {}: {step}\n", i + 1));
        }

        let reason_card = ReasonCardBuilder::new("codegen", "diff_synthesis")
            .reasoning(format!("Synthesized a {}-line diff from the plan's steps.", steps.len()))
            .decision("diff_generated")
            .confidence(0.65)
            .inputs(plan)
            .outputs(json!({"diff": diff}))
            .category("codegen")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::CODEGEN_DIFF.to_string(), json!(diff));

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
