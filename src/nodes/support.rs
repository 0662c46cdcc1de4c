//! Shared helpers for the full-graph node implementations: hashing inputs
//! and outputs for reason-card dedup keys, and small `extra`-channel
//! accessors the nodes pass state through.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::reason_card::ReasonCard;

/// Stable hash of a JSON value, used for `ReasonCard::inputs_hash` /
/// `outputs_hash`. Not cryptographic; only needs to agree across identical
/// values within a single process run.
#[must_use]
pub fn hash_value(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Builds a `ReasonCard` for `node`, hashing `inputs`/`outputs` for the
/// engine's dedup key.
pub struct ReasonCardBuilder {
    agent: String,
    node: String,
    trigger: String,
    reasoning: String,
    decision: String,
    confidence: f64,
    inputs: Value,
    outputs: Value,
    alternatives_considered: Vec<String>,
    category: String,
    priority: i32,
}

impl ReasonCardBuilder {
    pub fn new(node: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            agent: "weavegraph".to_string(),
            node: node.into(),
            trigger: trigger.into(),
            reasoning: String::new(),
            decision: String::new(),
            confidence: 1.0,
            inputs: Value::Null,
            outputs: Value::Null,
            alternatives_considered: Vec::new(),
            category: "general".to_string(),
            priority: 0,
        }
    }

    #[must_use]
    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    #[must_use]
    pub fn decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = decision.into();
        self
    }

    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    #[must_use]
    pub fn outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }

    #[must_use]
    pub fn alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives_considered = alternatives;
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn build(self) -> ReasonCard {
        let inputs_hash = hash_value(&self.inputs);
        let outputs_hash = hash_value(&self.outputs);
        ReasonCard {
            agent: self.agent,
            node: self.node,
            trigger: self.trigger,
            reasoning: self.reasoning,
            decision: self.decision,
            confidence: self.confidence,
            inputs_hash,
            outputs_hash,
            inputs: self.inputs,
            outputs: self.outputs,
            alternatives_considered: self.alternatives_considered,
            category: self.category,
            priority: self.priority,
        }
    }
}

/// Reads `state.extra[key]`, falling back to `Value::Null` if absent.
#[must_use]
pub fn extra_get<'a>(extra: &'a FxHashMap<String, Value>, key: &str) -> &'a Value {
    extra.get(key).unwrap_or(&Value::Null)
}

/// Well-known `extra` keys nodes read from and write to. Kept in one place
/// so the loop-back guard, the conditional edges, and the HTTP approval
/// endpoint agree on spelling.
pub mod keys {
    pub const REQUIREMENTS: &str = "requirements";
    pub const COVERAGE: &str = "coverage";
    pub const QUESTIONS: &str = "questions";
    pub const SMART_DEFAULTS: &str = "smart_defaults";
    pub const RESPONSES: &str = "responses";
    pub const REENTRY_COUNT: &str = "hitl_input_reentry_count";
    pub const PLAN: &str = "plan";
    pub const TECH_CRITIQUE: &str = "tech_critique";
    pub const COST_CRITIQUE: &str = "cost_critique";
    pub const POLICY_EVAL: &str = "policy_eval";
    pub const FINAL_APPROVAL: &str = "final_approval";
    pub const CODEGEN_DIFF: &str = "codegen_diff";
    pub const VALIDATION_REPORT: &str = "validation_report";
    pub const RATIONALE: &str = "rationale";
    pub const ARTIFACT: &str = "artifact";
}
