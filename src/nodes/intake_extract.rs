//! `intake_extract`: turns the raw user prompt into structured requirements.
//!
//! Entry point of the full graph, and the re-entry target when
//! `hitl_gate_input` decides the clarifying answers still need folding back
//! into the original ask.

use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

use super::support::{extra_get, keys, ReasonCardBuilder};

#[derive(Clone, Default)]
pub struct IntakeExtractNode;

#[async_trait]
impl Node for IntakeExtractNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("intake_extract", "extracting requirements from prompt")?;

        let prompt = snapshot
            .messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Message::USER)
            .map(|m| m.content.clone())
            .ok_or(NodeError::MissingInput {
                what: "a user message to extract requirements from",
            })?;

        let responses = extra_get(&snapshot.extra, keys::RESPONSES).clone();
        let mut fields: Vec<String> = vec!["goal".to_string(), "constraints".to_string()];
        if !responses.is_null() {
            if let Some(obj) = responses.as_object() {
                fields.extend(obj.keys().cloned());
            }
        }

        let requirements = json!({
            "raw_prompt": prompt,
            "goal": prompt,
            "constraints": responses,
            "fields": fields,
        });

        let reason_card = ReasonCardBuilder::new("intake_extract", "extraction")
            .reasoning("Parsed the user prompt (and any prior clarifying responses) into a structured requirements object.")
            .decision("extracted")
            .confidence(0.9)
            .inputs(json!({"prompt": prompt, "responses": responses}))
            .outputs(requirements.clone())
            .category("intake")
            .build();

        let mut extra = crate::utils::collections::new_extra_map();
        extra.insert(keys::REQUIREMENTS.to_string(), requirements);

        Ok(NodePartial::new()
            .with_extra(extra)
            .with_reason_cards(vec![reason_card]))
    }
}
