//! Flatten a workflow graph into an ordered, deduplicated step list.

use std::collections::HashSet;

use serde::Serialize;

use crate::graph::{NodeKind, Workflow};

/// Condition under which a step's successor is followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Guard {
    Always,
    Condition(bool),
    Branch(String),
}

impl Guard {
    /// Map an edge outcome: `true`/`false` (any case) become conditions,
    /// other text a branch name, nothing at all an unconditional guard.
    pub fn from_outcome(outcome: Option<&str>) -> Self {
        match outcome.map(str::trim) {
            None | Some("") => Guard::Always,
            Some(o) if o.eq_ignore_ascii_case("true") => Guard::Condition(true),
            Some(o) if o.eq_ignore_ascii_case("false") => Guard::Condition(false),
            Some(o) => Guard::Branch(o.to_string()),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Guard::Always)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextStep {
    pub edge_id: String,
    pub target_id: String,
    /// Label of the target node.
    pub label: String,
    pub guard: Guard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub node_id: String,
    pub kind: NodeKind,
    pub label: String,
    pub next_steps: Vec<NextStep>,
}

impl Step {
    /// Whether the supplied outcome picks the successor. Branching nodes whose
    /// edges carry no outcome at all follow their first edge like any other node.
    pub fn routes_on_outcome(&self) -> bool {
        self.kind.is_branching() && self.next_steps.iter().any(|n| !n.guard.is_always())
    }
}

/// Steps in DFS pre-order from the start node. Built once per workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepList {
    steps: Vec<Step>,
}

impl StepList {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Index of the step for `node_id`.
    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.node_id == node_id)
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Linearize `workflow` from its start node.
///
/// Expects a workflow that passed validation; on anything else the result is
/// still deterministic but may omit nodes. Edges to unknown nodes are dropped.
pub fn linearize(workflow: &Workflow) -> StepList {
    let graph = workflow.graph();
    let Some(start) = graph.start_node() else {
        tracing::debug!(workflow = %workflow.name, "No start node; nothing to linearize");
        return StepList::default();
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![start];
    let mut steps = Vec::new();

    while let Some(node) = stack.pop() {
        if !visited.insert(node.id.as_str()) {
            continue;
        }

        let mut next_steps = Vec::new();
        let mut children = Vec::new();
        for edge in graph.outgoing_edges(&node.id) {
            let Some(target) = graph.node(&edge.target) else {
                continue;
            };
            next_steps.push(NextStep {
                edge_id: edge.id.clone(),
                target_id: target.id.clone(),
                label: target.label.clone(),
                guard: Guard::from_outcome(edge.outcome.as_deref()),
            });
            children.push(target);
        }

        // Reverse so the first edge is popped first, matching recursive pre-order.
        stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|c| !visited.contains(c.id.as_str())),
        );

        steps.push(Step {
            node_id: node.id.clone(),
            kind: node.kind.clone(),
            label: node.label.clone(),
            next_steps,
        });
    }

    tracing::debug!(workflow = %workflow.name, steps = steps.len(), "Workflow linearized");
    StepList { steps }
}
