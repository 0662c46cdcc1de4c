//! Reason cards — structured decision records a node emits for audit and
//! UI transparency, published to clients as the `reason-card` SSE event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single decision record emitted by a node while it runs.
///
/// The engine deduplicates reason cards within a single step by
/// [`ReasonCard::dedup_key`]: when a retried step re-emits a card with the
/// same (agent, node, trigger, inputs-hash, outputs-hash, confidence), only
/// the first is kept so the UI never shows duplicate cards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReasonCard {
    pub agent: String,
    pub node: String,
    pub trigger: String,
    pub reasoning: String,
    pub decision: String,
    /// Confidence score, expected in `[0.0, 1.0]`.
    pub confidence: f64,
    pub inputs_hash: String,
    pub outputs_hash: String,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub outputs: Value,
    #[serde(default)]
    pub alternatives_considered: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: i32,
}

impl ReasonCard {
    /// The key the engine dedups on, per spec §4.5: identical cards
    /// produced by a replayed step are collapsed into one.
    pub fn dedup_key(&self) -> (String, String, String, String, String, String) {
        (
            self.agent.clone(),
            self.node.clone(),
            self.trigger.clone(),
            self.inputs_hash.clone(),
            self.outputs_hash.clone(),
            // Confidence is a float; key on its bit pattern so equal values
            // always hash identically regardless of how they were computed.
            self.confidence.to_bits().to_string(),
        )
    }
}
