//! `adaptive_questions`: synthesizes clarifying questions (plus smart
//! defaults) for the fields `coverage_check` found missing. The HTTP layer
//! surfaces these via the `questions-presented` SSE event once
//! `hitl_gate_input` pauses the run.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct AdaptiveQuestionsNode;

#[async_trait]
impl Node for AdaptiveQuestionsNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("adaptive_questions", "generating clarifying questions")?;

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

        let questions: Vec<serde_json::Value> = missing
            .iter()
            .map(|field| {
                json!({
                    "field": field,
                    "prompt": format!("What is the {field} for this request?"),
                })
            })
            .collect();

        let smart_defaults: serde_json::Value = missing
            .iter()
            .map(|field| (field.clone(), json!("unspecified")))
            .collect::<serde_json::Map<_, _>>()
            .into();

        let reason_card = ReasonCardBuilder::new("adaptive_questions", "question_generation")
            .reasoning("Generated one clarifying question per missing requirement field.")
            .decision("questions_generated")
            .confidence(0.85)
            .inputs(coverage)
            .outputs(json!({"questions": questions, "smart_defaults": smart_defaults}))
            .category("intake")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::QUESTIONS.to_string(), json!(questions));
        extra.insert(keys::SMART_DEFAULTS.to_string(), smart_defaults);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
