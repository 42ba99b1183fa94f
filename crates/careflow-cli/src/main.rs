//! CLI binary for validating and stepping through Careflow workflows.

use std::path::{Path, PathBuf};

use careflow_engine::{
    diagnose, drive, ensure_runnable, lint_diagnostics, linearize, ConsoleSource, Guard, OutcomeSource,
    ScriptedSource, Severity, Workflow, WorkflowSession,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "careflow", version, about = "Validator and step runner for clinical workflow graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow .json file
    Validate {
        /// Path to the workflow .json file
        workflow: PathBuf,

        /// Skip clinical lint rules
        #[arg(long)]
        no_lint: bool,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Show information about a workflow
    Info {
        /// Path to the workflow .json file
        workflow: PathBuf,
    },

    /// Print the linearized step list
    Steps {
        /// Path to the workflow .json file
        workflow: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Replay outcomes through a workflow
    Run {
        /// Path to the workflow .json file
        workflow: PathBuf,

        /// Outcome for a node, e.g. `check-age=true` or `risk=high`. Repeatable.
        #[arg(short, long = "answer", value_name = "NODE=OUTCOME", value_parser = parse_answer)]
        answers: Vec<(String, String)>,

        /// Prompt on stdin for each decision
        #[arg(short, long, conflicts_with = "answers")]
        interactive: bool,

        /// Print the final run state as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((node, outcome)) if !node.trim().is_empty() && !outcome.trim().is_empty() => {
            Ok((node.trim().to_string(), outcome.trim().to_string()))
        }
        _ => Err(format!("expected NODE=OUTCOME, got '{raw}'")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing; RUST_LOG wins over --verbose.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            workflow,
            no_lint,
            strict,
        } => {
            cmd_validate(&workflow, no_lint, strict)?;
        }
        Commands::Info { workflow } => {
            cmd_info(&workflow)?;
        }
        Commands::Steps { workflow, json } => {
            cmd_steps(&workflow, json)?;
        }
        Commands::Run {
            workflow,
            answers,
            interactive,
            json,
        } => {
            cmd_run(&workflow, answers, interactive, json)?;
        }
    }

    Ok(())
}

fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    if !path.exists() {
        anyhow::bail!("workflow file not found: {}", path.display());
    }
    Ok(Workflow::load(path)?)
}

fn cmd_validate(path: &Path, no_lint: bool, strict: bool) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    let mut diagnostics = diagnose(&workflow);
    if !no_lint {
        diagnostics.extend(lint_diagnostics(&workflow));
    }

    if diagnostics.is_empty() {
        println!("Workflow is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let (Severity::Error, Some(fix)) = (diag.severity, &diag.fix) {
            println!("        fix: {fix}");
        }
    }

    if has_error || strict {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    let graph = workflow.graph();

    println!("Workflow: {}", workflow.name);
    if !workflow.description.is_empty() {
        println!("Description: {}", workflow.description);
    }
    println!("Type: {:?}", workflow.workflow_type);
    println!("Status: {:?}", workflow.metadata.status);
    if let Some(version) = &workflow.metadata.version {
        println!("Version: {version}");
    }

    println!("Nodes: {}", graph.all_nodes().count());
    println!("Edges: {}", graph.all_edges().len());

    if let Some(start) = graph.start_node() {
        println!("Start: {} ({})", start.id, start.label);
    }
    for end in graph.end_nodes() {
        println!("End: {} ({})", end.id, end.label);
    }

    println!("\nNodes:");
    for node in graph.all_nodes() {
        println!(
            "  {} [{}] type={} out={}",
            node.id,
            node.label,
            node.kind.name(),
            graph.outgoing_edges(&node.id).len()
        );
    }

    Ok(())
}

fn cmd_steps(path: &Path, json: bool) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    ensure_runnable(&workflow)?;

    let steps = linearize(&workflow);
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    for (i, step) in steps.iter().enumerate() {
        println!("{:>3}. {} [{}] {}", i + 1, step.node_id, step.kind.name(), step.label);
        for next in &step.next_steps {
            let guard = match &next.guard {
                Guard::Always => String::new(),
                Guard::Condition(value) => format!(" when {value}"),
                Guard::Branch(name) => format!(" when {name}"),
            };
            println!("       -> {}{}", next.target_id, guard);
        }
    }
    Ok(())
}

fn cmd_run(
    path: &Path,
    answers: Vec<(String, String)>,
    interactive: bool,
    json: bool,
) -> anyhow::Result<()> {
    let workflow = load_workflow(path)?;
    let mut session = WorkflowSession::open(workflow)?;
    for warning in &session.report().warnings {
        tracing::warn!("{warning}");
    }

    let mut source: Box<dyn OutcomeSource> = if interactive {
        Box::new(ConsoleSource::stdio())
    } else {
        Box::new(scripted_answers(&session, answers)?)
    };

    let completed = drive(&mut session, source.as_mut())?;
    let state = session.state();

    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!("\n=== Run {} ===", if completed { "Completed" } else { "Paused" });
    for step in &state.history {
        println!("  {:>3}. {} [{}] -> {}", step.tick, step.node_id, step.label, step.result);
    }
    if let Some(step) = session.current_step() {
        println!("Waiting on: {} [{}]", step.node_id, step.label);
    }
    Ok(())
}

/// Build a scripted source, refusing answers for nodes the workflow lacks.
fn scripted_answers(
    session: &WorkflowSession,
    answers: Vec<(String, String)>,
) -> careflow_engine::Result<ScriptedSource> {
    let mut scripted = ScriptedSource::new();
    for (node, outcome) in answers {
        session.step(&node)?;
        scripted.push(node, outcome.as_str());
    }
    Ok(scripted)
}
