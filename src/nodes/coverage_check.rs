//! `coverage_check`: decides whether the extracted requirements are
//! complete enough to plan from, or whether the user needs to be asked
//! clarifying questions first.
//!
//! Feeds the first of the graph's two conditional branch points: the edge
//! registered on this node routes to `planner` when `coverage.complete` is
//! `true`, otherwise to `adaptive_questions`.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

/// Requirement fields a plan cannot be produced without. `constraints` stays
/// `null` until a prior `hitl_gate_input` round has merged clarifying
/// answers back in (see `intake_extract`), so a first-pass prompt routes to
/// `adaptive_questions` rather than straight through to `planner`.
const REQUIRED_FIELDS: &[&str] = &["goal", "constraints"];

#[derive(Clone, Default)]
pub struct CoverageCheckNode;

#[async_trait]
impl Node for CoverageCheckNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("coverage_check", "checking requirement coverage")?;

        let requirements = extra_get(&snapshot.extra, keys::REQUIREMENTS).clone();
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| {
                requirements
                    .get(field)
                    .map(|v| v.is_null() || v.as_str().is_some_and(str::is_empty))
                    .unwrap_or(true)
            })
            .collect();

        let complete = missing.is_empty();
        let coverage = json!({
            "complete": complete,
            "missing_fields": missing,
        });

        let reason_card = ReasonCardBuilder::new("coverage_check", "coverage_evaluation")
            .reasoning(if complete {
                "All required requirement fields are present."
            } else {
                "Some required requirement fields are missing; routing to clarifying questions."
            })
            .decision(if complete { "complete" } else { "incomplete" })
            .confidence(1.0)
            .inputs(requirements)
            .outputs(coverage.clone())
            .category("intake")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::COVERAGE.to_string(), coverage);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
