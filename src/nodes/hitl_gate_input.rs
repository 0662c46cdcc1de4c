//! `hitl_gate_input`: the first human-in-the-loop gate. The engine marks
//! this node interrupt-before (`App::interrupt_before`), so it only
//! actually runs once an external approval has merged responses into
//! `extra["responses"]` and the run is resumed.
//!
//! Feeds the graph's second conditional branch point: after this node
//! runs, the registered edge routes back to `intake_extract` if the
//! responses didn't fully answer the missing fields, or on to `planner`
//! if they did. A third re-entry is rejected outright — two rounds of
//! clarification is the budget.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

/// `intake_extract -> coverage_check -> adaptive_questions -> hitl_gate_input`
/// may be re-entered at most this many times before the workflow fails
/// outright rather than looping forever on an uncooperative input.
const MAX_REENTRIES: u64 = 2;

#[derive(Clone, Default)]
pub struct HitlGateInputNode;

#[async_trait]
impl Node for HitlGateInputNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("hitl_gate_input", "merging clarifying responses")?;

        let reentry_count = extra_get(&snapshot.extra, keys::REENTRY_COUNT)
            .as_u64()
            .unwrap_or(0);

        if reentry_count >= MAX_REENTRIES {
            return Err(NodeError::ValidationFailed(format!(
                "hitl_gate_input re-entered a {}th time; the clarification budget of {MAX_REENTRIES} rounds is exhausted",
                reentry_count + 1
            )));
        }

        let responses = extra_get(&snapshot.extra, keys::RESPONSES).clone();
        let coverage = extra_get(&snapshot.extra, keys::COVERAGE).clone();
        let missing: Vec<String> = coverage
            .get("missing_fields")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let answered = responses.as_object().is_some_and(|obj| {
            missing
                .iter()
                .all(|field| obj.get(field).is_some_and(|v| !v.is_null()))
        });

        let new_coverage = json!({
            "complete": answered,
            "missing_fields": if answered { Vec::<String>::new() } else { missing.clone() },
        });

        let reason_card = ReasonCardBuilder::new("hitl_gate_input", "response_merge")
            .reasoning(if answered {
                "Human responses answered every missing field; coverage is now complete."
            } else {
                "Human responses still leave fields unanswered; requirements need another extraction pass."
            })
            .decision(if answered { "resume_to_planner" } else { "resume_to_intake" })
            .confidence(0.95)
            .inputs(json!({"responses": responses, "missing_fields": missing}))
            .outputs(new_coverage.clone())
            .category("hitl")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::COVERAGE.to_string(), new_coverage);
        extra.insert(keys::REENTRY_COUNT.to_string(), json!(reentry_count + 1));

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
