//! Structural validation: lint rules and diagnostics.
//!
//! Every rule runs on every call so the caller receives the complete list of
//! problems in one pass. Call [`validate`] for the editor-facing report,
//! [`diagnose`] for the raw diagnostics, or [`ensure_runnable`] to refuse a
//! workflow that has `Error`-severity issues.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use careflow_types::{CareflowError, Result};
use regex::Regex;
use serde::Serialize;

use crate::graph::{NodeKind, Workflow, WorkflowEdge, WorkflowGraph};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub node_id: Option<String>,
    pub edge_id: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Editor-facing summary: `valid` is false when any error was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut report = ValidationReport {
            valid: true,
            ..Default::default()
        };
        for diag in diagnostics {
            match diag.severity {
                Severity::Error => {
                    report.valid = false;
                    report.errors.push(diag.message.clone());
                }
                Severity::Warning => report.warnings.push(diag.message.clone()),
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static ACTION_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("action identifier pattern is valid")
});

fn is_valid_action_identifier(action: &str) -> bool {
    ACTION_IDENTIFIER.is_match(action)
}

fn is_ternary_token(outcome: &str) -> bool {
    matches!(
        outcome.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "unknown"
    )
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// Three-color DFS from `start`. Re-entering a gray node means a back edge.
fn has_cycle_from<'a>(graph: &WorkflowGraph<'a>, start: &'a str) -> bool {
    let mut color: HashMap<&'a str, Color> = HashMap::new();
    let mut stack: Vec<(&'a str, usize)> = vec![(start, 0)];
    color.insert(start, Color::Gray);

    while let Some(frame) = stack.last_mut() {
        let (node, next) = *frame;
        let edges = graph.outgoing_edges(node);
        if next >= edges.len() {
            color.insert(node, Color::Black);
            stack.pop();
            continue;
        }
        frame.1 += 1;

        let edge: &'a WorkflowEdge = edges[next];
        let target = edge.target.as_str();
        match color.get(target) {
            Some(Color::Gray) => return true,
            Some(Color::Black) => {}
            None => {
                // Dangling targets are reported by EdgeReferencesRule.
                if graph.node(target).is_some() {
                    color.insert(target, Color::Gray);
                    stack.push((target, 0));
                }
            }
        }
    }
    false
}

fn bfs<'a>(seeds: Vec<&'a str>, adjacency: &HashMap<&'a str, Vec<&'a str>>) -> HashSet<&'a str> {
    let mut visited: HashSet<&str> = seeds.iter().copied().collect();
    let mut queue: VecDeque<&str> = seeds.into_iter().collect();
    while let Some(current) = queue.pop_front() {
        for &next in adjacency.get(current).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct UniqueIdsRule;
impl LintRule for UniqueIdsRule {
    fn name(&self) -> &str { "unique_ids" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();

        let mut node_ids = HashSet::new();
        for node in graph.all_nodes() {
            if !node_ids.insert(node.id.as_str()) {
                diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Duplicate node ID found: {}", node.id),
                    node_id: Some(node.id.clone()),
                    edge_id: None,
                    fix: Some(format!("Rename one of the nodes with id '{}'", node.id)),
                });
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in graph.all_edges() {
            if !edge_ids.insert(edge.id.as_str()) {
                diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Duplicate edge ID found: {}", edge.id),
                    node_id: None,
                    edge_id: Some(edge.id.clone()),
                    fix: Some(format!("Rename one of the edges with id '{}'", edge.id)),
                });
            }
        }
        diags
    }
}

struct EdgeReferencesRule;
impl LintRule for EdgeReferencesRule {
    fn name(&self) -> &str { "edge_references" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for edge in graph.all_edges() {
            for (end, id) in [("source", &edge.source), ("target", &edge.target)] {
                if graph.node(id).is_none() {
                    diags.push(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Error,
                        message: format!(
                            "Edge {} references non-existent {end} node: {id}",
                            edge.id
                        ),
                        node_id: None,
                        edge_id: Some(edge.id.clone()),
                        fix: Some(format!("Add node '{id}' or fix the edge {end}")),
                    });
                }
            }
        }
        diags
    }
}

struct EntryExitRule;
impl LintRule for EntryExitRule {
    fn name(&self) -> &str { "entry_exit" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        let starts: Vec<_> = graph.start_nodes().map(|n| n.id.as_str()).collect();
        if starts.len() != 1 {
            diags.push(Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!(
                    "Workflow must have exactly one start node (found {})",
                    starts.len()
                ),
                node_id: None,
                edge_id: None,
                fix: Some(if starts.is_empty() {
                    "Add a node of type \"start\"".into()
                } else {
                    format!("Keep only one of the start nodes: {}", starts.join(", "))
                }),
            });
        }
        if graph.end_nodes().next().is_none() {
            diags.push(Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: "Workflow must have at least one end node".into(),
                node_id: None,
                edge_id: None,
                fix: Some("Add a node of type \"end\"".into()),
            });
        }
        diags
    }
}

struct RequiredFieldsRule;
impl LintRule for RequiredFieldsRule {
    fn name(&self) -> &str { "required_fields" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.all_nodes() {
            if node.label.trim().is_empty() {
                diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Node {} must have a label", node.id),
                    node_id: Some(node.id.clone()),
                    edge_id: None,
                    fix: Some("Add a descriptive label".into()),
                });
            }

            let NodeKind::TakeAction { action } = &node.kind else {
                continue;
            };
            match action.as_deref().map(str::trim) {
                None | Some("") => diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Action node {} must have an action", node.id),
                    node_id: Some(node.id.clone()),
                    edge_id: None,
                    fix: Some("Set the action identifier, e.g. \"scheduleFollowup\"".into()),
                }),
                Some(name) if !is_valid_action_identifier(name) => diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Warning,
                    message: format!(
                        "Action name in node {} should follow camelCase convention",
                        node.id
                    ),
                    node_id: Some(node.id.clone()),
                    edge_id: None,
                    fix: Some(format!("Rename '{name}' to a camelCase identifier")),
                }),
                Some(_) => {}
            }
        }
        diags
    }
}

struct AcyclicRule;
impl LintRule for AcyclicRule {
    fn name(&self) -> &str { "acyclic" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let Some(start) = graph.start_node() else {
            return vec![]; // EntryExitRule will catch this
        };
        if !has_cycle_from(graph, &start.id) {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Error,
            message: "Workflow contains cycles".into(),
            node_id: None,
            edge_id: None,
            fix: Some("Remove the edge that leads back to an earlier step".into()),
        }]
    }
}

struct ConnectivityRule;
impl LintRule for ConnectivityRule {
    fn name(&self) -> &str { "connectivity" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let connected: HashSet<&str> = graph
            .all_edges()
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        graph
            .all_nodes()
            .filter(|n| !connected.contains(n.id.as_str()))
            .map(|n| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Node {} is not connected to any other node", n.id),
                node_id: Some(n.id.clone()),
                edge_id: None,
                fix: Some(format!("Connect '{}' to the flow or remove it", n.id)),
            })
            .collect()
    }
}

struct ConditionsHaveActionsRule;
impl LintRule for ConditionsHaveActionsRule {
    fn name(&self) -> &str { "conditions_have_actions" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let has_conditions = graph.all_nodes().any(|n| n.kind.is_condition_bearing());
        let has_actions = graph.all_nodes().any(|n| n.kind.is_action_bearing());
        if has_conditions && !has_actions {
            vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: "Workflow has conditions but no corresponding actions".into(),
                node_id: None,
                edge_id: None,
                fix: Some("Add a takeAction node for the decision outcomes".into()),
            }]
        } else {
            vec![]
        }
    }
}

struct ReachabilityRule;
impl LintRule for ReachabilityRule {
    fn name(&self) -> &str { "reachability" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut backward: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in graph.all_edges() {
            forward
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            backward
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }

        let from_start = bfs(
            graph.start_node().map(|n| n.id.as_str()).into_iter().collect(),
            &forward,
        );
        let to_end = bfs(graph.end_nodes().map(|n| n.id.as_str()).collect(), &backward);

        let mut seen = HashSet::new();
        graph
            .all_nodes()
            .filter(|n| seen.insert(n.id.as_str()))
            // Edge-less nodes are reported by ConnectivityRule.
            .filter(|n| forward.contains_key(n.id.as_str()) || backward.contains_key(n.id.as_str()))
            .filter(|n| !from_start.contains(n.id.as_str()) && !to_end.contains(n.id.as_str()))
            .map(|n| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!(
                    "Node {} is not reachable from the start node and cannot reach an end node",
                    n.id
                ),
                node_id: Some(n.id.clone()),
                edge_id: None,
                fix: Some(format!("Add an edge leading to '{}' or remove it", n.id)),
            })
            .collect()
    }
}

struct EdgeOutcomesRule;
impl LintRule for EdgeOutcomesRule {
    fn name(&self) -> &str { "edge_outcomes" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for edge in graph.all_edges() {
            let Some(source) = graph.node(&edge.source) else {
                continue;
            };
            let outcome = edge.outcome.as_deref().map(str::trim);
            let message = match (&source.kind, outcome) {
                (kind, None) if kind.is_branching() => format!(
                    "Edge {} from {} node {} has no outcome",
                    edge.id,
                    kind.name(),
                    source.id
                ),
                (kind, Some(o)) if kind.is_ternary() && !is_ternary_token(o) => format!(
                    "Edge {} from {} node {} has unrecognized outcome '{o}'",
                    edge.id,
                    kind.name(),
                    source.id
                ),
                (NodeKind::Branch { branches }, Some(o)) if !branches.iter().any(|b| b == o) => {
                    format!(
                        "Edge {} from branch node {} uses undeclared branch '{o}'",
                        edge.id, source.id
                    )
                }
                (kind, Some(o)) if !kind.is_branching() => format!(
                    "Edge {} carries outcome '{o}' but node {} does not branch",
                    edge.id, source.id
                ),
                _ => continue,
            };
            diags.push(Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message,
                node_id: Some(source.id.clone()),
                edge_id: Some(edge.id.clone()),
                fix: Some("Use true/false for decisions or a declared branch name".into()),
            });
        }
        diags
    }
}

struct SingleSuccessorRule;
impl LintRule for SingleSuccessorRule {
    fn name(&self) -> &str { "single_successor" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut diags = Vec::new();
        for node in graph.all_nodes().filter(|n| seen.insert(n.id.as_str())) {
            let count = graph.outgoing_edges(&node.id).len();
            let message = match node.kind {
                NodeKind::End if count > 0 => format!("End node {} has outgoing edges", node.id),
                ref kind if !kind.is_branching() && count > 1 => format!(
                    "Node {} has {count} outgoing edges but only the first is followed",
                    node.id
                ),
                _ => continue,
            };
            diags.push(Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message,
                node_id: Some(node.id.clone()),
                edge_id: None,
                fix: Some("Use a decision or branch node to split the flow".into()),
            });
        }
        diags
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The structural rule battery, in evaluation order.
pub fn structural_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(UniqueIdsRule),
        Box::new(EdgeReferencesRule),
        Box::new(EntryExitRule),
        Box::new(RequiredFieldsRule),
        Box::new(AcyclicRule),
        Box::new(ConnectivityRule),
        Box::new(ConditionsHaveActionsRule),
        Box::new(ReachabilityRule),
        Box::new(EdgeOutcomesRule),
        Box::new(SingleSuccessorRule),
    ]
}

/// Run all structural rules and return collected diagnostics.
pub fn diagnose(workflow: &Workflow) -> Vec<Diagnostic> {
    let graph = workflow.graph();
    let mut diagnostics = Vec::new();
    for rule in &structural_rules() {
        diagnostics.extend(rule.apply(&graph));
    }
    diagnostics
}

/// Structural validation report. Pure and deterministic.
pub fn validate(workflow: &Workflow) -> ValidationReport {
    let report = ValidationReport::from_diagnostics(&diagnose(workflow));
    tracing::debug!(
        workflow = %workflow.name,
        valid = report.valid,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Workflow validated"
    );
    report
}

/// Structural validation plus clinical lint warnings for clinical workflows.
pub fn check(workflow: &Workflow) -> ValidationReport {
    let mut report = validate(workflow);
    report.warnings.extend(crate::clinical::lint(workflow).warnings);
    report
}

/// Validate; return `Err` carrying every error message if the workflow cannot run.
pub fn ensure_runnable(workflow: &Workflow) -> Result<ValidationReport> {
    let report = validate(workflow);
    if !report.valid {
        return Err(CareflowError::Validation(report.errors.join("; ")));
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
