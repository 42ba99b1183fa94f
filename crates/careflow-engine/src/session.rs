//! A validated workflow together with its step list and current run.

use careflow_types::{CareflowError, Outcome, Result};

use crate::graph::Workflow;
use crate::linearize::{linearize, Step, StepList};
use crate::stepper::{self, RunState};
use crate::validation::{ensure_runnable, ValidationReport};

/// Owns one runnable workflow and replays outcomes against it.
///
/// The step list is rebuilt only through [`WorkflowSession::replace_workflow`];
/// editing the document elsewhere does not affect an open session.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    workflow: Workflow,
    report: ValidationReport,
    steps: StepList,
    state: RunState,
}

impl WorkflowSession {
    /// Validate and linearize `workflow`. Fails with
    /// [`CareflowError::Validation`](careflow_types::CareflowError::Validation)
    /// when the graph has structural errors.
    pub fn open(workflow: Workflow) -> Result<Self> {
        let report = ensure_runnable(&workflow)?;
        let steps = linearize(&workflow);
        tracing::info!(
            workflow = %workflow.name,
            steps = steps.len(),
            warnings = report.warnings.len(),
            "Workflow session opened"
        );
        Ok(Self {
            workflow,
            report,
            steps,
            state: RunState::new(),
        })
    }

    /// Swap in an edited workflow and start a fresh run.
    ///
    /// On validation failure the current workflow and run are kept.
    pub fn replace_workflow(&mut self, workflow: Workflow) -> Result<()> {
        *self = Self::open(workflow)?;
        Ok(())
    }

    /// The step for `node_id`, or [`CareflowError::NodeNotFound`] when the
    /// node is not part of the linearized workflow.
    pub fn step(&self, node_id: &str) -> Result<&Step> {
        self.steps
            .position(node_id)
            .and_then(|index| self.steps.get(index))
            .ok_or_else(|| CareflowError::NodeNotFound {
                node: node_id.to_string(),
            })
    }

    /// Apply `outcome` to `node_id`. Returns `Ok(true)` if the run moved and
    /// `Ok(false)` for an outcome that does not apply right now.
    pub fn advance(&mut self, node_id: &str, outcome: impl Into<Outcome>) -> Result<bool> {
        self.step(node_id)?;
        let next = stepper::advance(&self.state, &self.steps, node_id, &outcome.into());
        let moved = next != self.state;
        self.state = next;
        Ok(moved)
    }

    /// Apply `outcome` to whichever step is active.
    pub fn complete_current(&mut self, outcome: impl Into<Outcome>) -> Result<bool> {
        let Some(node_id) = self.current_step().map(|s| s.node_id.clone()) else {
            return Ok(false);
        };
        self.advance(&node_id, outcome)
    }

    pub fn reset(&mut self) {
        self.state = stepper::reset(&self.state);
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.state.current_step(&self.steps)
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Validation result captured when the workflow was opened.
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }
}
