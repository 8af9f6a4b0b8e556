//! Renderer boundary — turns settled state into what a chat UI displays.
//!
//! The core hands out data (ordered transcript items, a pending flag) and
//! the active question's input widget. Layout, styling and the widgets
//! themselves belong to the renderer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

use super::catalog::Catalog;
use super::question::QuestionId;
use super::reducer::current_question;
use super::runtime::Inbound;
use super::state::{Answers, InterviewState};
use super::transcript::LogEntry;

/// Held by every clone of one frame's [`Submitter`]. Dropping the last
/// clone wakes the interview, which then knows nobody can answer.
#[derive(Debug, Default)]
pub(crate) struct Lease(Option<Arc<Notify>>);

impl Lease {
    pub(crate) fn new(released: Arc<Notify>) -> Self {
        Self(Some(released))
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(released) = &self.0 {
            released.notify_one();
        }
    }
}

/// The `submit(raw)` capability handed to an input widget.
///
/// Bound to the question and transcript position it was issued for; a
/// submission arriving after the interview moved on is dropped.
#[derive(Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<Inbound>,
    step: QuestionId,
    window: usize,
    _lease: Arc<Lease>,
}

impl Submitter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>, step: QuestionId, window: usize) -> Self {
        Self {
            tx,
            step,
            window,
            _lease: Arc::new(Lease::default()),
        }
    }

    pub(crate) fn with_lease(mut self, lease: Arc<Lease>) -> Self {
        self._lease = lease;
        self
    }

    /// Submit a raw answer. Returns false if the interview is gone.
    pub fn submit(&self, raw: impl Into<Value>) -> bool {
        let sent = self
            .tx
            .send(Inbound::Answer {
                step: self.step,
                window: self.window,
                raw: raw.into(),
            })
            .is_ok();
        if !sent {
            debug!(question = %self.step, "Submission after interview ended; dropped");
        }
        sent
    }

    /// The question this submitter answers.
    pub fn step(&self) -> QuestionId {
        self.step
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("step", &self.step)
            .field("window", &self.window)
            .finish()
    }
}

/// One renderable line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptItem {
    /// A persisted transcript entry.
    Entry(LogEntry),
    /// The open question's prompt; persisted only once it gets answered.
    Prompt { content: String },
    /// A transform or validation is in flight.
    Typing,
}

impl TranscriptItem {
    /// Text of the line, if it has any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Entry(entry) => Some(&entry.content),
            Self::Prompt { content } => Some(content),
            Self::Typing => None,
        }
    }

    /// Whether the interviewee authored this line.
    pub fn is_mine(&self) -> bool {
        matches!(self, Self::Entry(entry) if entry.mine)
    }
}

/// Everything a renderer needs for one frame. Transcript is chronological.
#[derive(Debug)]
pub struct RenderView<W> {
    pub transcript: Vec<TranscriptItem>,
    pub pending: bool,
    pub input: Option<W>,
}

/// Presentation layer (chat bubbles, composer, picker, loading indicator).
#[async_trait]
pub trait Renderer<W: Send + 'static>: Send {
    /// Display a frame. Called after every settled change.
    async fn render(&mut self, view: RenderView<W>);

    /// Called once when the interview completes.
    async fn complete(&mut self, _answers: &Answers) {}
}

/// Build the frame for `state`.
///
/// While ready with an open, unanswered question, a synthetic prompt for it
/// trails the persisted log and its input widget is built with the
/// submitter from `issue`. While pending, a typing marker trails instead
/// and there is no input.
pub fn assemble<W>(
    state: &InterviewState,
    catalog: &Catalog<W>,
    issue: impl FnOnce(QuestionId) -> Submitter,
) -> RenderView<W> {
    let mut transcript: Vec<TranscriptItem> = state
        .log()
        .iter()
        .cloned()
        .map(TranscriptItem::Entry)
        .collect();

    if state.is_pending() {
        transcript.push(TranscriptItem::Typing);
        return RenderView {
            transcript,
            pending: true,
            input: None,
        };
    }

    let open = current_question(state, catalog).and_then(|id| {
        catalog
            .get(id)
            .filter(|entry| !entry.is_answered())
            .map(|entry| (id, entry))
    });

    let input = open.map(|(id, entry)| {
        transcript.push(TranscriptItem::Prompt {
            content: entry.spec.text().to_string(),
        });
        entry.spec.input(issue(id))
    });

    RenderView {
        transcript,
        pending: false,
        input,
    }
}
