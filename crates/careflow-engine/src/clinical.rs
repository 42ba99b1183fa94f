//! Advisory lint rules for clinical workflows.
//!
//! These rules only ever produce warnings. They look for keywords in
//! condition text, action identifiers, and node labels/descriptions; matching
//! is case-insensitive substring search.

use serde::Serialize;

use crate::graph::{Workflow, WorkflowGraph, WorkflowNode};
use crate::validation::{Diagnostic, LintRule, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub warnings: Vec<String>,
}

/// Which part of a node a keyword rule searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// Decision `condition` and every LogicTree `conditions` entry.
    Condition,
    /// TakeAction `action` identifier.
    Action,
    /// Label and description.
    Descriptive,
}

fn texts(node: &WorkflowNode, field: Field) -> Vec<&str> {
    match field {
        Field::Condition => node.kind.conditions(),
        Field::Action => node.kind.action().into_iter().collect(),
        Field::Descriptive => std::iter::once(node.label.as_str())
            .chain(node.description.as_deref())
            .collect(),
    }
}

fn mentions_any(graph: &WorkflowGraph<'_>, field: Field, keywords: &[&str]) -> bool {
    graph.all_nodes().any(|node| {
        texts(node, field).into_iter().any(|text| {
            let text = text.to_lowercase();
            keywords.iter().any(|k| text.contains(&k.to_lowercase()))
        })
    })
}

fn warning(rule: &str, message: &str) -> Diagnostic {
    Diagnostic {
        rule: rule.into(),
        severity: Severity::Warning,
        message: message.into(),
        node_id: None,
        edge_id: None,
        fix: None,
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Warns when no node mentions any of `keywords` in `field`.
struct KeywordRule {
    name: &'static str,
    field: Field,
    keywords: &'static [&'static str],
    message: &'static str,
}

impl LintRule for KeywordRule {
    fn name(&self) -> &str { self.name }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        if mentions_any(graph, self.field, self.keywords) {
            vec![]
        } else {
            vec![warning(self.name, self.message)]
        }
    }
}

struct MedicationSafetyRule;
impl LintRule for MedicationSafetyRule {
    fn name(&self) -> &str { "medication_safety" }
    fn apply(&self, graph: &WorkflowGraph<'_>) -> Vec<Diagnostic> {
        let prescribes = mentions_any(graph, Field::Action, &["medication"]);
        let safety_checked = mentions_any(
            graph,
            Field::Condition,
            &["allergy", "interaction", "contraindication"],
        );
        if prescribes && !safety_checked {
            vec![warning(
                self.name(),
                "Medication-related actions should include safety checks (allergies, interactions, contraindications)",
            )]
        } else {
            vec![]
        }
    }
}

/// The clinical rule battery, in evaluation order.
pub fn clinical_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(KeywordRule {
            name: "patient_conditions",
            field: Field::Condition,
            keywords: &["patient."],
            message: "Clinical workflow should include patient-specific conditions",
        }),
        Box::new(KeywordRule {
            name: "clinical_actions",
            field: Field::Action,
            keywords: &["recommend", "schedule", "adjust"],
            message: "Clinical workflow should include clinical actions (recommendations, scheduling, or adjustments)",
        }),
        Box::new(KeywordRule {
            name: "follow_up",
            field: Field::Action,
            keywords: &["schedule"],
            message: "Clinical workflow should include follow-up scheduling",
        }),
        Box::new(KeywordRule {
            name: "critical_data",
            field: Field::Condition,
            keywords: &["vitalSigns", "allergies", "medications", "labResults"],
            message: "Clinical workflow should include checks for critical patient data (vitals, allergies, medications, lab results)",
        }),
        Box::new(MedicationSafetyRule),
        Box::new(KeywordRule {
            name: "guidelines",
            field: Field::Descriptive,
            keywords: &["guideline"],
            message: "Clinical workflow should reference clinical guidelines or protocols",
        }),
        Box::new(KeywordRule {
            name: "safety_measures",
            field: Field::Descriptive,
            keywords: &["alert", "warning", "caution", "emergency", "critical"],
            message: "Clinical workflow should include patient safety measures and alerts",
        }),
        Box::new(KeywordRule {
            name: "documentation",
            field: Field::Action,
            keywords: &["document", "record", "note", "chart"],
            message: "Clinical workflow should include documentation actions",
        }),
        Box::new(KeywordRule {
            name: "decision_support",
            field: Field::Action,
            keywords: &["calculate", "assess", "evaluate", "score"],
            message: "Clinical workflow should include clinical decision support features",
        }),
    ]
}

/// Raw clinical diagnostics. Empty for non-clinical workflows.
pub fn lint_diagnostics(workflow: &Workflow) -> Vec<Diagnostic> {
    if !workflow.is_clinical() {
        return Vec::new();
    }
    let graph = workflow.graph();
    clinical_rules()
        .iter()
        .flat_map(|rule| rule.apply(&graph))
        .collect()
}

pub fn lint(workflow: &Workflow) -> LintReport {
    let warnings: Vec<String> = lint_diagnostics(workflow)
        .into_iter()
        .map(|d| d.message)
        .collect();
    tracing::debug!(workflow = %workflow.name, warnings = warnings.len(), "Workflow linted");
    LintReport { warnings }
}
