//! `validators`: sanity-checks the synthesized diff before it is
//! summarized and persisted. A diff with no content at all is treated as a
//! fatal validation failure; anything else is recorded as a pass/fail
//! report for `rationale_compile`.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct ValidatorsNode;

#[async_trait]
impl Node for ValidatorsNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("validators", "validating synthesized diff")?;

        let diff = extra_get(&snapshot.extra, keys::CODEGEN_DIFF)
            .as_str()
            .ok_or(NodeError::MissingInput {
                what: "codegen_diff",
            })?
            .to_string();

        let added_lines = diff.lines().filter(|l| l.starts_with('+') && !l.starts_with("+++")).count();
        if added_lines == 0 {
            return Err(NodeError::ValidationFailed(
                "codegen diff contains no added lines".to_string(),
            ));
        }

        let report = json!({
            "passed": true,
            "added_lines": added_lines,
        });

        let reason_card = ReasonCardBuilder::new("validators", "diff_validation")
            .reasoning(format!("Diff adds {added_lines} lines; structurally valid."))
            .decision("passed")
            .confidence(0.9)
            .inputs(json!({"diff": diff}))
            .outputs(report.clone())
            .category("validation")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::VALIDATION_REPORT.to_string(), report);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
