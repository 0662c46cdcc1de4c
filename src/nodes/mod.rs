//! The full and thin workflow graphs' node implementations (C4).
//!
//! Each node is a thin, deterministic transform over `extra`-channel JSON;
//! the two interrupt-before gates (`hitl_gate_input`, `hitl_gate_final`)
//! are ordinary nodes whose execution the engine simply defers until an
//! external approval resumes the run — see [`crate::app::App::interrupt_before`].

pub mod adaptive_questions;
pub mod call_llm;
pub mod codegen;
pub mod coverage_check;
pub mod critic_cost;
pub mod critic_tech;
pub mod diff_and_persist;
pub mod hitl_gate_final;
pub mod hitl_gate_input;
pub mod intake_extract;
pub mod planner;
pub mod policy_eval;
pub mod rationale_compile;
pub mod support;
pub mod validators;

pub use adaptive_questions::AdaptiveQuestionsNode;
pub use call_llm::CallLlmNode;
pub use codegen::CodegenNode;
pub use coverage_check::CoverageCheckNode;
pub use critic_cost::CriticCostNode;
pub use critic_tech::CriticTechNode;
pub use diff_and_persist::DiffAndPersistNode;
pub use hitl_gate_final::HitlGateFinalNode;
pub use hitl_gate_input::HitlGateInputNode;
pub use intake_extract::IntakeExtractNode;
pub use planner::PlannerNode;
pub use policy_eval::PolicyEvalNode;
pub use rationale_compile::RationaleCompileNode;
pub use validators::ValidatorsNode;
