//! Graph assembly (C4): the thin graph (a single `call_llm` node, used by
//! `/api/chat`) and the full graph (the thirteen-node decision pipeline),
//! both built with [`crate::graphs::GraphBuilder`] the same way the
//! framework's own demos wire up a workflow.
//!
//! The full graph has exactly two conditional branch points:
//! - after `coverage_check`: to `adaptive_questions` if requirements are
//!   incomplete, otherwise straight to `planner`.
//! - after `hitl_gate_input`: back to `intake_extract` if the human's
//!   answers still leave fields unanswered, otherwise on to `planner`.
//!
//! `hitl_gate_input` and `hitl_gate_final` are registered as
//! interrupt-before nodes: the engine persists a checkpoint and reports
//! `interrupted-at` rather than running them, until an external approval
//! resumes the session.

use std::sync::Arc;

use crate::app::App;
use crate::graphs::GraphBuilder;
use crate::nodes::{
    AdaptiveQuestionsNode, CallLlmNode, CodegenNode, CoverageCheckNode, CriticCostNode,
    CriticTechNode, DiffAndPersistNode, HitlGateFinalNode, HitlGateInputNode, IntakeExtractNode,
    PlannerNode, PolicyEvalNode, RationaleCompileNode, ValidatorsNode,
};
use crate::types::NodeKind;

/// Node name constants, shared between graph assembly and the conditional
/// edge predicates below so a typo can't silently desync routing from
/// registration.
pub mod node_names {
    pub const INTAKE_EXTRACT: &str = "intake_extract";
    pub const COVERAGE_CHECK: &str = "coverage_check";
    pub const ADAPTIVE_QUESTIONS: &str = "adaptive_questions";
    pub const HITL_GATE_INPUT: &str = "hitl_gate_input";
    pub const PLANNER: &str = "planner";
    pub const CRITIC_TECH: &str = "critic_tech";
    pub const CRITIC_COST: &str = "critic_cost";
    pub const POLICY_EVAL: &str = "policy_eval";
    pub const HITL_GATE_FINAL: &str = "hitl_gate_final";
    pub const CODEGEN: &str = "codegen";
    pub const VALIDATORS: &str = "validators";
    pub const RATIONALE_COMPILE: &str = "rationale_compile";
    pub const DIFF_AND_PERSIST: &str = "diff_and_persist";
    pub const CALL_LLM: &str = "call_llm";
}

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// Builds the thin graph: `Start -> call_llm -> End`.
#[must_use]
pub fn build_thin_graph() -> App {
    GraphBuilder::new()
        .add_node(custom(node_names::CALL_LLM), CallLlmNode)
        .add_edge(NodeKind::Start, custom(node_names::CALL_LLM))
        .add_edge(custom(node_names::CALL_LLM), NodeKind::End)
        .compile()
}

/// Ordered node names for the thin graph, for `GET /api/workflow/plan`.
#[must_use]
pub fn thin_graph_node_order() -> Vec<String> {
    vec![node_names::CALL_LLM.to_string()]
}

/// Builds the full graph per spec §4.4's thirteen-node decision pipeline.
#[must_use]
pub fn build_full_graph() -> App {
    use node_names::*;

    let coverage_branch: crate::graphs::EdgePredicate = Arc::new(|snapshot| {
        let complete = snapshot
            .extra
            .get("coverage")
            .and_then(|v| v.get("complete"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if complete {
            vec![PLANNER.to_string()]
        } else {
            vec![ADAPTIVE_QUESTIONS.to_string()]
        }
    });

    let hitl_input_branch: crate::graphs::EdgePredicate = Arc::new(|snapshot| {
        let complete = snapshot
            .extra
            .get("coverage")
            .and_then(|v| v.get("complete"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if complete {
            vec![PLANNER.to_string()]
        } else {
            vec![INTAKE_EXTRACT.to_string()]
        }
    });

    GraphBuilder::new()
        .add_node(custom(INTAKE_EXTRACT), IntakeExtractNode)
        .add_node(custom(COVERAGE_CHECK), CoverageCheckNode)
        .add_node(custom(ADAPTIVE_QUESTIONS), AdaptiveQuestionsNode)
        .add_node(custom(HITL_GATE_INPUT), HitlGateInputNode)
        .add_node(custom(PLANNER), PlannerNode)
        .add_node(custom(CRITIC_TECH), CriticTechNode)
        .add_node(custom(CRITIC_COST), CriticCostNode)
        .add_node(custom(POLICY_EVAL), PolicyEvalNode)
        .add_node(custom(HITL_GATE_FINAL), HitlGateFinalNode)
        .add_node(custom(CODEGEN), CodegenNode)
        .add_node(custom(VALIDATORS), ValidatorsNode)
        .add_node(custom(RATIONALE_COMPILE), RationaleCompileNode)
        .add_node(custom(DIFF_AND_PERSIST), DiffAndPersistNode)
        .add_edge(NodeKind::Start, custom(INTAKE_EXTRACT))
        .add_edge(custom(INTAKE_EXTRACT), custom(COVERAGE_CHECK))
        .add_conditional_edge(custom(COVERAGE_CHECK), coverage_branch)
        .add_edge(custom(ADAPTIVE_QUESTIONS), custom(HITL_GATE_INPUT))
        .add_conditional_edge(custom(HITL_GATE_INPUT), hitl_input_branch)
        .add_edge(custom(PLANNER), custom(CRITIC_TECH))
        .add_edge(custom(CRITIC_TECH), custom(CRITIC_COST))
        .add_edge(custom(CRITIC_COST), custom(POLICY_EVAL))
        .add_edge(custom(POLICY_EVAL), custom(HITL_GATE_FINAL))
        .add_edge(custom(HITL_GATE_FINAL), custom(CODEGEN))
        .add_edge(custom(CODEGEN), custom(VALIDATORS))
        .add_edge(custom(VALIDATORS), custom(RATIONALE_COMPILE))
        .add_edge(custom(RATIONALE_COMPILE), custom(DIFF_AND_PERSIST))
        .add_edge(custom(DIFF_AND_PERSIST), NodeKind::End)
        .compile()
        .with_interrupt_before([custom(HITL_GATE_INPUT), custom(HITL_GATE_FINAL)])
}

/// Ordered node names for the full graph, for `GET /api/workflow/plan`.
///
/// This is the declared pipeline order, not a live topological sort — the
/// two conditional branches can skip `adaptive_questions`/`hitl_gate_input`
/// entirely at runtime, but clients use this list to render the whole
/// possible pipeline up front.
#[must_use]
pub fn full_graph_node_order() -> Vec<String> {
    use node_names::*;
    vec![
        INTAKE_EXTRACT,
        COVERAGE_CHECK,
        ADAPTIVE_QUESTIONS,
        HITL_GATE_INPUT,
        PLANNER,
        CRITIC_TECH,
        CRITIC_COST,
        POLICY_EVAL,
        HITL_GATE_FINAL,
        CODEGEN,
        VALIDATORS,
        RATIONALE_COMPILE,
        DIFF_AND_PERSIST,
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::state::VersionedState;

    #[tokio::test]
    async fn thin_graph_echoes_user_message() {
        let app = build_thin_graph();
        let state = VersionedState::new_with_user_message("ping");
        let final_state = app.invoke(state).await.expect("thin graph should complete");
        assert!(final_state.messages.snapshot().iter().any(|m| m.role == "assistant"));
    }

    #[test]
    fn full_graph_registers_interrupt_before_gates() {
        let app = build_full_graph();
        assert!(app
            .interrupt_before()
            .contains(&custom(node_names::HITL_GATE_INPUT)));
        assert!(app
            .interrupt_before()
            .contains(&custom(node_names::HITL_GATE_FINAL)));
    }

    #[test]
    fn full_graph_node_order_matches_registered_nodes() {
        let app = build_full_graph();
        for name in full_graph_node_order() {
            assert!(app.nodes().contains_key(&custom(&name)), "missing node {name}");
        }
    }
}
