//! CLI channel — renders an interview on stdout and feeds stdin lines back
//! as answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::InterviewConfig;
use crate::interview::{Answers, Choice, RenderView, Renderer, Submitter, TranscriptItem};

/// Input widget for the terminal: free text or a numbered list of choices.
#[derive(Debug, Clone)]
pub enum TerminalInput {
    Text(Submitter),
    Choices {
        choices: Vec<Choice>,
        submit: Submitter,
    },
}

impl TerminalInput {
    /// Widget constructor for [`QuestionSpec::picker`](crate::interview::QuestionSpec::picker).
    pub fn choices(choices: Vec<Choice>, submit: Submitter) -> Self {
        Self::Choices { choices, submit }
    }

    /// Turn a typed line into the raw answer this widget submits.
    ///
    /// Choices accept a 1-based index or a label (case-insensitive).
    pub fn parse(&self, line: &str) -> Result<Value, String> {
        match self {
            Self::Text(_) => Ok(Value::String(line.to_string())),
            Self::Choices { choices, .. } => {
                let picked = match line.parse::<usize>() {
                    Ok(n) if (1..=choices.len()).contains(&n) => choices.get(n - 1),
                    Ok(_) => None,
                    Err(_) => choices
                        .iter()
                        .find(|c| c.label.eq_ignore_ascii_case(line)),
                };
                let choice =
                    picked.ok_or_else(|| format!("Pick a number between 1 and {}", choices.len()))?;
                serde_json::to_value(choice).map_err(|e| e.to_string())
            }
        }
    }

    fn submitter(&self) -> &Submitter {
        match self {
            Self::Text(submit) => submit,
            Self::Choices { submit, .. } => submit,
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    input: Option<TerminalInput>,
    closed: bool,
}

/// What became of a line fed to the slot.
#[derive(Debug, PartialEq)]
pub enum Feed {
    Sent,
    /// No widget is mounted right now.
    Waiting,
    /// The widget could not parse the line; carries a hint.
    Invalid(String),
    /// The slot is closed or the interview is gone.
    Gone,
}

/// The widget the stdin reader currently feeds.
///
/// Once closed, the mounted widget is dropped and later ones are refused, so
/// the interview sees that nothing can answer its open question.
#[derive(Debug, Clone, Default)]
pub struct InputSlot(Arc<Mutex<SlotState>>);

impl InputSlot {
    /// Mount `input` in place of the current widget. Ignored once closed.
    pub async fn set(&self, input: Option<TerminalInput>) {
        let mut state = self.0.lock().await;
        if !state.closed {
            state.input = input;
        }
    }

    /// Drop the mounted widget and refuse any later one.
    pub async fn close(&self) {
        let mut state = self.0.lock().await;
        state.closed = true;
        state.input = None;
    }

    pub async fn is_closed(&self) -> bool {
        self.0.lock().await.closed
    }

    pub async fn is_mounted(&self) -> bool {
        self.0.lock().await.input.is_some()
    }

    /// Parse `line` with the mounted widget and submit the result.
    pub async fn feed(&self, line: &str) -> Feed {
        let state = self.0.lock().await;
        if state.closed {
            return Feed::Gone;
        }
        let Some(input) = state.input.as_ref() else {
            return Feed::Waiting;
        };
        match input.parse(line) {
            Ok(raw) if input.submitter().submit(raw.clone()) => Feed::Sent,
            Ok(_) => Feed::Gone,
            Err(hint) => Feed::Invalid(hint),
        }
    }
}

/// Prints each frame's new lines, prefixed with the speaker label.
pub struct TerminalRenderer {
    config: InterviewConfig,
    /// Transcript entries already printed.
    shown: usize,
    /// Position and text of the last prompt printed.
    prompt: Option<(usize, String)>,
    typing_at: Option<usize>,
    slot: InputSlot,
}

impl TerminalRenderer {
    pub fn new(config: InterviewConfig) -> Self {
        Self {
            config,
            shown: 0,
            prompt: None,
            typing_at: None,
            slot: InputSlot::default(),
        }
    }

    /// Shared handle to the active widget, for [`spawn_stdin_reader`].
    pub fn slot(&self) -> InputSlot {
        self.slot.clone()
    }

    /// Lines not printed yet for this frame.
    ///
    /// An open prompt occupies the transcript position its persisted entry
    /// will take once answered. The entry is skipped when it echoes the
    /// prompt already printed there; a different prompt at that position is
    /// printed again.
    fn frame_lines(&mut self, view: &RenderView<TerminalInput>) -> Vec<String> {
        let mut lines = Vec::new();
        let mut prompted = false;
        for (index, item) in view.transcript.iter().enumerate() {
            match item {
                TranscriptItem::Typing => {
                    if self.typing_at != Some(index) {
                        self.typing_at = Some(index);
                        lines.push(format!(
                            "{}: {}",
                            self.config.interviewer_label, self.config.typing_marker
                        ));
                    }
                }
                TranscriptItem::Prompt { content } => {
                    let current = Some((index, content.clone()));
                    if self.prompt != current {
                        self.prompt = current;
                        prompted = true;
                        lines.push(format!("{}: {content}", self.config.interviewer_label));
                    }
                }
                TranscriptItem::Entry(entry) if index >= self.shown => {
                    self.shown = index + 1;
                    let echo = !entry.mine
                        && self
                            .prompt
                            .as_ref()
                            .is_some_and(|(at, text)| *at == index && *text == entry.content);
                    if echo {
                        continue;
                    }
                    let label = if entry.mine {
                        &self.config.interviewee_label
                    } else {
                        &self.config.interviewer_label
                    };
                    lines.push(format!("{label}: {}", entry.content));
                }
                _ => {}
            }
        }

        if prompted && let Some(TerminalInput::Choices { choices, .. }) = &view.input {
            for (n, choice) in choices.iter().enumerate() {
                lines.push(format!("  {}. {}", n + 1, choice.label));
            }
        }
        lines
    }
}

#[async_trait]
impl Renderer<TerminalInput> for TerminalRenderer {
    async fn render(&mut self, view: RenderView<TerminalInput>) {
        let lines = self.frame_lines(&view);
        for line in &lines {
            println!("{line}");
        }
        let prompt = view.input.is_some() && !lines.is_empty();
        self.slot.set(view.input).await;
        if prompt {
            eprint!("> ");
        }
    }

    async fn complete(&mut self, answers: &Answers) {
        self.slot.set(None).await;
        eprintln!("\n✅ Interview complete ({} answers)", answers.len());
    }
}

/// Read stdin lines and submit them through whatever widget is active.
///
/// The slot is closed when stdin ends, which lets the interview stop.
pub fn spawn_stdin_reader(slot: InputSlot) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        eprint!("> ");
                        continue;
                    }
                    match slot.feed(line).await {
                        Feed::Sent => {}
                        Feed::Waiting => eprintln!("(please wait)"),
                        Feed::Invalid(hint) => {
                            eprintln!("{hint}");
                            eprint!("> ");
                        }
                        Feed::Gone => break,
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
        slot.close().await;
        tracing::debug!("stdin reader stopped");
    })
}
