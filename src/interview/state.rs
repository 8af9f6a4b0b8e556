//! Interview state machine types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::question::{Deferred, QuestionId};
use super::transcript::Transcript;

/// Accepted values keyed by the question's external id.
///
/// Keys are only ever added or overwritten by a later acceptance of the same
/// id; nothing is removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(Map<String, Value>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub(crate) fn insert(&mut self, id: impl Into<String>, value: Value) {
        self.0.insert(id.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Answers {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// An in-flight asynchronous step.
///
/// `content` is what the pipeline resumes with if the computation fails: the
/// raw answer while transforming, the transformed value while validating.
pub struct Pending<T> {
    ticket: u64,
    content: Value,
    task: Option<Deferred<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(ticket: u64, content: Value, task: Deferred<T>) -> Self {
        Self {
            ticket,
            content,
            task: Some(task),
        }
    }

    /// Identifies this suspension; resolutions carrying another ticket are stale.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Hand the computation to whoever will await it. Yields `Some` once.
    pub fn take_task(&mut self) -> Option<Deferred<T>> {
        self.task.take()
    }

    /// Whether the computation has already been handed off.
    pub fn is_claimed(&self) -> bool {
        self.task.is_none()
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("ticket", &self.ticket)
            .field("content", &self.content)
            .field("claimed", &self.is_claimed())
            .finish()
    }
}

/// Where the answer pipeline currently is.
#[derive(Debug, Default)]
pub enum Phase {
    /// No outstanding async work.
    #[default]
    Ready,
    /// Waiting on an asynchronous transform.
    Transforming(Pending<Value>),
    /// Waiting on an asynchronous validation.
    Validating(Pending<Option<String>>),
}

impl Phase {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Ticket of the in-flight step, if any.
    pub fn ticket(&self) -> Option<u64> {
        match self {
            Self::Ready => None,
            Self::Transforming(pending) => Some(pending.ticket()),
            Self::Validating(pending) => Some(pending.ticket()),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Transforming(_) => "transforming",
            Self::Validating(_) => "validating",
        };
        write!(f, "{s}")
    }
}

/// Inputs to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Move the cursor to another question (or to none).
    StepChanged(Option<QuestionId>),
    /// A raw answer was submitted for the current question.
    Answered(Value),
    /// An asynchronous transform settled with this content.
    Transformed(Value),
    /// An asynchronous validation settled.
    Validated {
        reason: Option<String>,
        content: Value,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StepChanged(_) => "step_changed",
            Self::Answered(_) => "answered",
            Self::Transformed(_) => "transformed",
            Self::Validated { .. } => "validated",
        }
    }
}

/// Full interview machine state.
#[derive(Debug, Default)]
pub struct InterviewState {
    pub(crate) step: Option<QuestionId>,
    pub(crate) log: Transcript,
    pub(crate) answers: Answers,
    pub(crate) phase: Phase,
    pub(crate) tickets: u64,
}

impl InterviewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing transcript (e.g. one seeded with a greeting).
    pub fn with_log(log: Transcript) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn step(&self) -> Option<QuestionId> {
        self.step
    }

    pub fn log(&self) -> &Transcript {
        &self.log
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_mut(&mut self) -> &mut Phase {
        &mut self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase.is_ready()
    }

    pub fn is_pending(&self) -> bool {
        !self.phase.is_ready()
    }

    pub(crate) fn next_ticket(&mut self) -> u64 {
        self.tickets += 1;
        self.tickets
    }
}
