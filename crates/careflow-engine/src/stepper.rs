//! Pure run-state reducer over a [`StepList`].
//!
//! [`advance`] never mutates its input: it returns the next state, or a copy of
//! the current one when the outcome does not apply (wrong node, finished run,
//! no matching edge). Those non-events are logged at `debug` level.
//!
//! The Start step needs no answer. While the cursor rests on it, its first
//! successor is the active step, and Start itself never enters the history.

use std::collections::BTreeMap;

use careflow_types::{Outcome, Ternary};
use serde::{Deserialize, Serialize};

use crate::graph::NodeKind;
use crate::linearize::{Guard, NextStep, Step, StepList};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub node_id: String,
    pub label: String,
    pub result: Outcome,
    /// 1-based position of this completion within the run.
    pub tick: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Index into the step list of the last position reached.
    pub cursor: usize,
    pub status: RunStatus,
    pub history: Vec<CompletedStep>,
    pub outputs: BTreeMap<String, Outcome>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Index of the step awaiting an outcome. A Start step under the cursor
    /// hands over to its first successor.
    pub fn active_index(&self, steps: &StepList) -> usize {
        match steps.get(self.cursor) {
            Some(step) if matches!(step.kind, NodeKind::Start) => step
                .next_steps
                .first()
                .and_then(|next| steps.position(&next.target_id))
                .unwrap_or(self.cursor),
            _ => self.cursor,
        }
    }

    /// The step awaiting an outcome, or `None` once the run has completed.
    pub fn current_step<'s>(&self, steps: &'s StepList) -> Option<&'s Step> {
        if self.is_complete() {
            None
        } else {
            steps.get(self.active_index(steps))
        }
    }
}

enum Resolution {
    Next(usize),
    Finished,
    NoMatch,
}

impl Guard {
    /// Decision and LogicTree steps answer with true/false, plus `unknown`
    /// when an edge names it.
    fn matches_ternary(&self, outcome: &Outcome) -> bool {
        match (self, outcome) {
            (Guard::Condition(expected), Outcome::Ternary(t)) => t.as_bool() == Some(*expected),
            (Guard::Branch(name), Outcome::Ternary(Ternary::Unknown)) => {
                name.eq_ignore_ascii_case(Ternary::Unknown.as_str())
            }
            _ => false,
        }
    }

    fn matches_branch(&self, outcome: &Outcome) -> bool {
        match (self, outcome) {
            (Guard::Always, _) => false,
            (Guard::Condition(expected), Outcome::Ternary(t)) => t.as_bool() == Some(*expected),
            (Guard::Condition(_), Outcome::Branch(_)) => false,
            (Guard::Branch(name), Outcome::Ternary(t)) => name.eq_ignore_ascii_case(t.as_str()),
            (Guard::Branch(name), Outcome::Branch(b)) => name == b,
        }
    }
}

fn select<'s>(step: &'s Step, outcome: &Outcome) -> Option<&'s NextStep> {
    if !step.routes_on_outcome() {
        return step.next_steps.first();
    }
    if step.kind.is_ternary() {
        step.next_steps.iter().find(|n| n.guard.matches_ternary(outcome))
    } else {
        step.next_steps.iter().find(|n| n.guard.matches_branch(outcome))
    }
}

fn resolve(step: &Step, steps: &StepList, outcome: &Outcome) -> Resolution {
    if step.next_steps.is_empty() {
        return Resolution::Finished;
    }
    match select(step, outcome).and_then(|next| steps.position(&next.target_id)) {
        Some(index) => Resolution::Next(index),
        None => Resolution::NoMatch,
    }
}

/// Apply `outcome` for `node_id` to `state`.
pub fn advance(state: &RunState, steps: &StepList, node_id: &str, outcome: &Outcome) -> RunState {
    if state.is_complete() {
        tracing::debug!(node = %node_id, "Run already completed; outcome ignored");
        return state.clone();
    }
    let Some(step) = steps.get(state.active_index(steps)) else {
        tracing::debug!(node = %node_id, cursor = state.cursor, "No active step; outcome ignored");
        return state.clone();
    };
    if step.node_id != node_id {
        tracing::debug!(
            node = %node_id,
            active = %step.node_id,
            "Outcome is for a node that is not active; ignored"
        );
        return state.clone();
    }

    let next_cursor = match resolve(step, steps, outcome) {
        Resolution::Next(index) => Some(index),
        Resolution::Finished => None,
        Resolution::NoMatch => {
            tracing::debug!(node = %node_id, outcome = %outcome, "No edge matches outcome; ignored");
            return state.clone();
        }
    };

    let mut next = state.clone();
    next.history.push(CompletedStep {
        node_id: step.node_id.clone(),
        label: step.label.clone(),
        result: outcome.clone(),
        tick: state.history.len() as u64 + 1,
    });
    next.outputs.insert(step.node_id.clone(), outcome.clone());
    match next_cursor {
        Some(index) => {
            next.cursor = index;
            tracing::debug!(node = %node_id, next = %steps.steps()[index].node_id, "Step completed");
        }
        None => {
            if let Some(index) = steps.position(&step.node_id) {
                next.cursor = index;
            }
            next.status = RunStatus::Completed;
            tracing::debug!(node = %node_id, "Run completed");
        }
    }
    next
}

/// The initial state, regardless of `state`.
pub fn reset(_state: &RunState) -> RunState {
    RunState::new()
}
