//! Workflow graph core for clinical decision workflows.
//!
//! This crate implements the Careflow engine: the workflow document model,
//! structural validation, clinical advisory linting, one-time linearization
//! into a step list, and the pure stepper that replays supplied outcomes.

pub mod clinical;
pub mod graph;
pub mod linearize;
pub mod outcome_source;
pub mod session;
pub mod stepper;
pub mod validation;

pub use careflow_types::{CareflowError, Outcome, Result, Ternary};
pub use clinical::{clinical_rules, lint, lint_diagnostics, LintReport};
pub use graph::{
    LogicOperator, NodeKind, Workflow, WorkflowEdge, WorkflowGraph, WorkflowMetadata,
    WorkflowNode, WorkflowStatus, WorkflowType,
};
pub use linearize::{linearize, Guard, NextStep, Step, StepList};
pub use outcome_source::{choices, drive, ConsoleSource, OutcomeSource, ScriptedSource};
pub use session::WorkflowSession;
pub use stepper::{advance, reset, CompletedStep, RunState, RunStatus};
pub use validation::{
    check, diagnose, ensure_runnable, structural_rules, validate, Diagnostic, LintRule, Severity,
    ValidationReport,
};
