//! End-to-end integration tests for the Careflow engine.
//!
//! Each test exercises the full path: load JSON -> validate -> linearize -> step -> verify.

use careflow_engine::{
    advance, check, drive, ensure_runnable, lint, linearize, validate, CareflowError, Outcome,
    RunState, ScriptedSource, Ternary, Workflow, WorkflowSession,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn workflow(kind: &str, nodes: Value, edges: Value) -> Workflow {
    serde_json::from_value(json!({
        "name": "Integration",
        "type": kind,
        "nodes": nodes,
        "edges": edges,
    }))
    .expect("workflow JSON should deserialize")
}

/// Start -> decision A -> End1 (true) / End2 (false).
fn decision_workflow() -> Workflow {
    workflow(
        "data",
        json!([
            { "id": "start", "type": "start", "label": "Start" },
            { "id": "A", "type": "decision", "label": "Is eligible?" },
            { "id": "End1", "type": "end", "label": "Enrolled" },
            { "id": "End2", "type": "end", "label": "Declined" }
        ]),
        json!([
            { "id": "e1", "source": "start", "target": "A" },
            { "id": "e2", "source": "A", "target": "End1", "outcome": "true" },
            { "id": "e3", "source": "A", "target": "End2", "outcome": "false" }
        ]),
    )
}

fn diabetes_screening() -> Workflow {
    Workflow::from_json(
        r#"{
            "id": "wf-diabetes",
            "name": "Diabetes Screening",
            "description": "ADA guideline based screening for adults",
            "type": "clinical",
            "nodes": [
                { "id": "start", "type": "start", "label": "Start" },
                { "id": "age", "type": "decision", "label": "Age 35 or older (ADA guideline)",
                  "condition": "patient.age >= 35" },
                { "id": "a1c", "type": "decision", "label": "A1C above threshold",
                  "condition": "patient.labResults.a1c >= 6.5" },
                { "id": "allergy", "type": "decision", "label": "Metformin allergy (caution)",
                  "condition": "patient.allergy.metformin" },
                { "id": "risk", "type": "takeAction", "label": "Assess risk",
                  "action": "calculateRiskScore" },
                { "id": "rx", "type": "takeAction", "label": "Start metformin",
                  "action": "recommendMedication" },
                { "id": "note", "type": "takeAction", "label": "Chart result",
                  "action": "documentEncounter" },
                { "id": "followup", "type": "takeAction", "label": "Follow up",
                  "action": "scheduleFollowup" },
                { "id": "end", "type": "end", "label": "End" }
            ],
            "edges": [
                { "id": "e1", "source": "start", "target": "age" },
                { "id": "e2", "source": "age", "target": "a1c", "outcome": "true" },
                { "id": "e3", "source": "age", "target": "note", "outcome": "false" },
                { "id": "e4", "source": "a1c", "target": "allergy", "outcome": "true" },
                { "id": "e5", "source": "a1c", "target": "risk", "outcome": "false" },
                { "id": "e6", "source": "allergy", "target": "followup", "outcome": "true" },
                { "id": "e7", "source": "allergy", "target": "rx", "outcome": "false" },
                { "id": "e8", "source": "risk", "target": "note" },
                { "id": "e9", "source": "rx", "target": "note" },
                { "id": "e10", "source": "note", "target": "followup" },
                { "id": "e11", "source": "followup", "target": "end" }
            ]
        }"#,
    )
    .expect("diabetes workflow should parse")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn decision_routing_end_to_end() {
    let wf = decision_workflow();
    assert!(validate(&wf).valid);

    let steps = linearize(&wf);
    let order: Vec<_> = steps.iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(order, vec!["start", "A", "End1", "End2"]);

    let fresh = RunState::new();
    assert_eq!(fresh.current_step(&steps).unwrap().node_id, "A");

    let s1 = advance(&fresh, &steps, "A", &Outcome::from(true));
    assert_eq!(s1.current_step(&steps).unwrap().node_id, "End1");
    assert_eq!(s1.history.len(), 1);
    assert_eq!(s1.history[0].node_id, "A");
    assert_eq!(s1.history[0].result, Outcome::from(true));
}

#[test]
fn decision_routing_false_from_fresh_run_reaches_end2() {
    let wf = decision_workflow();
    let steps = linearize(&wf);

    let next = advance(&RunState::new(), &steps, "A", &Outcome::from(false));
    assert_eq!(next.current_step(&steps).unwrap().node_id, "End2");
    assert_eq!(next.history.len(), 1);
    assert_eq!(next.history[0].node_id, "A");
    assert_eq!(next.outputs["A"], Outcome::from(false));
}

#[test]
fn decision_rejects_outcomes_outside_true_false_unknown() {
    let mut wf = decision_workflow();
    wf.edges.push(
        serde_json::from_value(
            json!({ "id": "e4", "source": "A", "target": "End2", "outcome": "maybe" }),
        )
        .unwrap(),
    );
    let steps = linearize(&wf);
    let initial = RunState::new();
    assert_eq!(advance(&initial, &steps, "A", &Outcome::from("maybe")), initial);
}

#[test]
fn logic_tree_routes_on_ternary_outcomes() {
    let wf = workflow(
        "data",
        json!([
            { "id": "start", "type": "start", "label": "Start" },
            { "id": "lt", "type": "logicTree", "label": "Any risk factor?", "operator": "or",
              "conditions": ["patient.bmi > 30", "patient.familyHistory"] },
            { "id": "screen", "type": "end", "label": "Screen" },
            { "id": "skip", "type": "end", "label": "Skip" },
            { "id": "review", "type": "end", "label": "Review" }
        ]),
        json!([
            { "id": "e1", "source": "start", "target": "lt" },
            { "id": "e2", "source": "lt", "target": "screen", "outcome": "true" },
            { "id": "e3", "source": "lt", "target": "skip", "outcome": "false" },
            { "id": "e4", "source": "lt", "target": "review", "outcome": "unknown" }
        ]),
    );
    assert!(validate(&wf).valid);

    for (answer, expected) in [
        (Ternary::True, "screen"),
        (Ternary::False, "skip"),
        (Ternary::Unknown, "review"),
    ] {
        let mut session = WorkflowSession::open(wf.clone()).unwrap();
        assert!(session.advance("lt", answer).unwrap());
        assert_eq!(session.current_step().unwrap().node_id, expected);
    }
}

#[test]
fn editor_canvas_export_loads_and_runs() {
    let wf = Workflow::from_json(
        r#"{
            "name": "Diabetes Screening Workflow",
            "type": "clinical",
            "nodes": [
                { "id": "start", "type": "start", "data": { "label": "Start" } },
                { "id": "check_age", "type": "condition",
                  "data": { "label": "Check Patient Age", "condition": "patient.age >= 45" } },
                { "id": "recommend", "type": "action",
                  "data": { "label": "Recommend Screening", "action": "recommendScreening" } },
                { "id": "end", "type": "end", "data": { "label": "End" } }
            ],
            "edges": [
                { "id": "e1", "source": "start", "target": "check_age" },
                { "id": "e2", "source": "check_age", "target": "recommend" },
                { "id": "e3", "source": "recommend", "target": "end" }
            ]
        }"#,
    )
    .expect("canvas export should parse");
    assert_eq!(wf.nodes[1].label, "Check Patient Age");
    assert!(validate(&wf).valid);

    let mut session = WorkflowSession::open(wf).unwrap();
    assert!(drive(&mut session, &mut ScriptedSource::new()).unwrap());
    let labels: Vec<_> = session.state().history.iter().map(|h| h.label.as_str()).collect();
    assert_eq!(labels, vec!["Check Patient Age", "Recommend Screening", "End"]);
}

#[test]
fn duplicate_ids_are_reported() {
    let wf = workflow(
        "data",
        json!([
            { "id": "n1", "type": "start", "label": "Start" },
            { "id": "n1", "type": "end", "label": "End" }
        ]),
        json!([]),
    );
    let report = validate(&wf);
    assert!(!report.valid);
    assert!(report.errors.contains(&"Duplicate node ID found: n1".to_string()));
}

#[test]
fn cycle_is_rejected() {
    let wf = workflow(
        "data",
        json!([
            { "id": "start", "type": "start", "label": "Start" },
            { "id": "A", "type": "narrative", "label": "A" },
            { "id": "B", "type": "narrative", "label": "B" },
            { "id": "end", "type": "end", "label": "End" }
        ]),
        json!([
            { "id": "e1", "source": "start", "target": "A" },
            { "id": "e2", "source": "A", "target": "B" },
            { "id": "e3", "source": "B", "target": "A" }
        ]),
    );
    let report = validate(&wf);
    assert!(!report.valid);
    assert!(report.errors.contains(&"Workflow contains cycles".to_string()));
    assert!(matches!(ensure_runnable(&wf), Err(CareflowError::Validation(_))));
}

#[test]
fn isolated_node_is_a_warning_only() {
    let wf = workflow(
        "data",
        json!([
            { "id": "start", "type": "start", "label": "Start" },
            { "id": "end", "type": "end", "label": "End" },
            { "id": "C", "type": "narrative", "label": "Loose note" }
        ]),
        json!([{ "id": "e1", "source": "start", "target": "end" }]),
    );
    let report = validate(&wf);
    assert!(report.valid);
    assert!(report
        .warnings
        .contains(&"Node C is not connected to any other node".to_string()));
}

#[test]
fn clinical_workflow_without_clinical_actions_is_warned() {
    let wf = workflow(
        "clinical",
        json!([
            { "id": "start", "type": "start", "label": "Start" },
            { "id": "bp", "type": "decision", "label": "High BP",
              "condition": "patient.vitalSigns.systolic > 140" },
            { "id": "log", "type": "takeAction", "label": "Log", "action": "logReading" },
            { "id": "end", "type": "end", "label": "End" }
        ]),
        json!([
            { "id": "e1", "source": "start", "target": "bp" },
            { "id": "e2", "source": "bp", "target": "log", "outcome": "true" },
            { "id": "e3", "source": "bp", "target": "end", "outcome": "false" },
            { "id": "e4", "source": "log", "target": "end" }
        ]),
    );
    let warnings = lint(&wf).warnings;
    assert!(warnings.contains(
        &"Clinical workflow should include clinical actions (recommendations, scheduling, or adjustments)"
            .to_string()
    ));
    assert!(validate(&wf).valid);
}

#[test]
fn complete_clinical_workflow_runs_end_to_end() {
    let wf = diabetes_screening();
    let report = check(&wf);
    assert!(report.valid, "errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);

    let mut session = WorkflowSession::open(wf).unwrap();
    let mut source = ScriptedSource::new()
        .answer("age", true)
        .answer("a1c", true)
        .answer("allergy", false);
    assert!(drive(&mut session, &mut source).unwrap());

    let path: Vec<_> = session
        .state()
        .history
        .iter()
        .map(|h| h.node_id.as_str())
        .collect();
    assert_eq!(
        path,
        vec!["age", "a1c", "allergy", "rx", "note", "followup", "end"]
    );
    let ticks: Vec<_> = session.state().history.iter().map(|h| h.tick).collect();
    assert_eq!(ticks, (1..=7).collect::<Vec<u64>>());
}

#[test]
fn load_from_file_and_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("screening.json");
    diabetes_screening().save(&path).unwrap();

    let loaded = Workflow::load(&path).unwrap();
    assert_eq!(loaded, diabetes_screening());

    let mut session = WorkflowSession::open(loaded).unwrap();
    let mut source = ScriptedSource::new().answer("age", false);
    assert!(drive(&mut session, &mut source).unwrap());
    assert_eq!(session.state().outputs["age"], Outcome::from(false));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn uniqueness_holds_for_valid_workflows() {
    let wf = diabetes_screening();
    assert!(validate(&wf).valid);
    let mut ids: Vec<_> = wf.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), wf.nodes.len());
}

#[test]
fn linearized_walk_never_revisits_a_node() {
    let wf = diabetes_screening();
    let steps = linearize(&wf);
    let mut seen = std::collections::HashSet::new();
    assert!(steps.iter().all(|s| seen.insert(s.node_id.clone())));
    assert_eq!(steps.len(), wf.nodes.len());
}

#[test]
fn valid_workflow_has_one_start_and_an_end() {
    let wf = diabetes_screening();
    let graph = wf.graph();
    assert_eq!(graph.start_nodes().count(), 1);
    assert!(graph.end_nodes().count() >= 1);
}

#[test]
fn linearization_is_deterministic_across_serialization() {
    let wf = diabetes_screening();
    let restored = Workflow::from_json(&wf.to_json_pretty().unwrap()).unwrap();
    assert_eq!(linearize(&wf), linearize(&restored));
}

#[test]
fn connecting_isolated_node_does_not_add_errors() {
    let mut wf = decision_workflow();
    wf.nodes.push(
        serde_json::from_value(json!({ "id": "C", "type": "narrative", "label": "Aside" })).unwrap(),
    );
    let before = validate(&wf);
    assert!(before.warnings.iter().any(|w| w == "Node C is not connected to any other node"));

    wf.edges.push(
        serde_json::from_value(json!({ "id": "e4", "source": "C", "target": "End1" })).unwrap(),
    );
    let after = validate(&wf);
    assert!(!after.warnings.iter().any(|w| w == "Node C is not connected to any other node"));
    assert_eq!(after.errors, before.errors);
}

#[test]
fn stepper_ignores_outcomes_for_inactive_nodes() {
    let wf = decision_workflow();
    let steps = linearize(&wf);
    let initial = RunState::new();
    for node in ["start", "End1", "End2", "missing"] {
        assert_eq!(advance(&initial, &steps, node, &Outcome::from(true)), initial);
    }
}

#[test]
fn unknown_never_falls_through_to_true_or_false() {
    let wf = decision_workflow();
    let steps = linearize(&wf);
    let initial = RunState::new();
    let next = advance(&initial, &steps, "A", &Outcome::Ternary(Ternary::Unknown));
    assert_eq!(next, initial);
    assert_eq!(next.current_step(&steps).unwrap().node_id, "A");
}

#[test]
fn session_rejects_answers_for_unknown_nodes() {
    let mut session = WorkflowSession::open(decision_workflow()).unwrap();
    let err = session.advance("B", true).unwrap_err();
    assert!(matches!(err, CareflowError::NodeNotFound { ref node } if node == "B"));
    assert_eq!(err.to_string(), "Node 'B' not found in workflow");
}

#[test]
fn bundled_demo_workflow_is_clean() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/diabetes-screening.json");
    let wf = Workflow::load(&path).expect("demo workflow should load");
    assert!(wf.is_clinical());
    let report = check(&wf);
    assert!(report.valid, "errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
}
