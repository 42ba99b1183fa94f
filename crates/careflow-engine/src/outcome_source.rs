//! Outcome sources: where a run gets the answer for each active step.

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, Write};

use careflow_types::{Outcome, Result, Ternary};

use crate::linearize::{Guard, Step};
use crate::session::WorkflowSession;

pub trait OutcomeSource {
    /// Outcome for `step`, or `None` when the source has nothing more to give.
    fn outcome_for(&mut self, step: &Step) -> Result<Option<Outcome>>;
}

/// Answers a caller can pick from for `step`. Empty when the successor does
/// not depend on the answer.
pub fn choices(step: &Step) -> Vec<String> {
    if !step.routes_on_outcome() {
        return Vec::new();
    }
    let mut choices: Vec<String> = if step.kind.is_ternary() {
        vec![Ternary::True.to_string(), Ternary::False.to_string()]
    } else {
        step.kind.branches().to_vec()
    };
    for next in &step.next_steps {
        let choice = match &next.guard {
            Guard::Always => continue,
            Guard::Condition(value) => Ternary::from(*value).to_string(),
            Guard::Branch(name) if step.kind.is_ternary() => {
                if !name.eq_ignore_ascii_case(Ternary::Unknown.as_str()) {
                    continue;
                }
                Ternary::Unknown.to_string()
            }
            Guard::Branch(name) => name.clone(),
        };
        if !choices.iter().any(|c| c.eq_ignore_ascii_case(&choice)) {
            choices.push(choice);
        }
    }
    choices
}

/// Outcome for steps whose successor does not depend on the answer.
fn pass_through() -> Outcome {
    Outcome::Ternary(Ternary::True)
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Plays back pre-recorded answers per node. Steps whose successor does not
/// depend on the answer pass through.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    answers: HashMap<String, VecDeque<Outcome>>,
    asked: Vec<String>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, node_id: impl Into<String>, outcome: impl Into<Outcome>) -> Self {
        self.push(node_id, outcome);
        self
    }

    pub fn push(&mut self, node_id: impl Into<String>, outcome: impl Into<Outcome>) {
        self.answers
            .entry(node_id.into())
            .or_default()
            .push_back(outcome.into());
    }

    /// Node ids this source was asked about, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl OutcomeSource for ScriptedSource {
    fn outcome_for(&mut self, step: &Step) -> Result<Option<Outcome>> {
        self.asked.push(step.node_id.clone());
        let scripted = self
            .answers
            .get_mut(&step.node_id)
            .and_then(VecDeque::pop_front);
        Ok(match scripted {
            Some(outcome) => Some(outcome),
            None if !step.routes_on_outcome() => Some(pass_through()),
            None => None,
        })
    }
}

// ---------------------------------------------------------------------------
// ConsoleSource
// ---------------------------------------------------------------------------

/// Prompts on a line-oriented reader/writer pair, stdin/stdout by default.
pub struct ConsoleSource<R, W> {
    input: R,
    output: W,
}

impl ConsoleSource<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> OutcomeSource for ConsoleSource<R, W> {
    fn outcome_for(&mut self, step: &Step) -> Result<Option<Outcome>> {
        if !step.routes_on_outcome() {
            writeln!(self.output, "-> {} [{}]", step.label, step.kind.name())?;
            return Ok(Some(pass_through()));
        }
        let choices = choices(step);

        writeln!(self.output, "\n{} [{}]", step.label, step.node_id)?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  [{}] {}", i + 1, choice)?;
        }
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if let Ok(idx) = trimmed.parse::<usize>() {
            if idx > 0 && idx <= choices.len() {
                return Ok(Some(Outcome::parse(&choices[idx - 1])));
            }
        }
        Ok(Some(Outcome::parse(trimmed)))
    }
}

// ---------------------------------------------------------------------------
// drive
// ---------------------------------------------------------------------------

/// Feed outcomes from `source` into `session` until the run completes or the
/// source runs dry. Returns whether the run completed.
///
/// A step that rejects the same outcome twice in a row pauses the run, so a
/// source that keeps repeating an answer cannot spin forever.
pub fn drive(session: &mut WorkflowSession, source: &mut dyn OutcomeSource) -> Result<bool> {
    let mut rejected: Option<(String, Outcome)> = None;
    while let Some(step) = session.current_step().cloned() {
        let Some(outcome) = source.outcome_for(&step)? else {
            tracing::info!(node = %step.node_id, "No outcome available; run paused");
            break;
        };
        if session.advance(&step.node_id, outcome.clone())? {
            rejected = None;
            continue;
        }
        if rejected
            .as_ref()
            .is_some_and(|(node, previous)| *node == step.node_id && *previous == outcome)
        {
            tracing::warn!(node = %step.node_id, outcome = %outcome, "Outcome rejected twice; run paused");
            break;
        }
        tracing::warn!(node = %step.node_id, outcome = %outcome, "Outcome does not match any edge");
        rejected = Some((step.node_id, outcome));
    }
    Ok(session.is_complete())
}
