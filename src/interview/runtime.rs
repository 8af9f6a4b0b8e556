//! Interview runtime — the serialized event loop.
//!
//! Owns the state, the catalog (through its [`Registrar`]), the
//! coordinator and the renderer. Events are applied one at a time: answers
//! from input widgets and resolutions from the coordinator arrive on one
//! channel, catalog changes wake the loop through a notifier.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

use super::catalog::{Catalog, Registrar};
use super::coordinator::Coordinator;
use super::declarations::{Declarations, Roster};
use super::question::QuestionId;
use super::reducer::{current_question, reduce};
use super::render::{Lease, Renderer, Submitter, assemble};
use super::state::{Answers, Event, InterviewState};
use super::transcript::Transcript;
use super::watcher::{CompletionLatch, Verdict, evaluate};
use crate::config::InterviewConfig;
use crate::error::{InterviewError, Result};

/// Messages into the event loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A widget submitted a raw answer.
    Answer {
        step: QuestionId,
        window: usize,
        raw: Value,
    },
    /// The coordinator finished awaiting a pending step.
    Resolved { ticket: u64, event: Event },
}

/// A running interview.
pub struct Interview<W: Send + 'static> {
    config: InterviewConfig,
    registrar: Registrar<W>,
    roster: Option<Roster<W>>,
    state: InterviewState,
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    coordinator: Coordinator,
    renderer: Box<dyn Renderer<W>>,
    latch: CompletionLatch,
    /// Signalled when the last submitter of a frame is dropped.
    released: Arc<Notify>,
    /// Lease of the input handed out by the latest frame, if any.
    lease: Option<Weak<Lease>>,
}

impl<W: Send + 'static> Interview<W> {
    pub fn new(config: InterviewConfig, renderer: impl Renderer<W> + 'static) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut log = Transcript::new();
        if let Some(greeting) = &config.greeting {
            log.push_interviewer(greeting.clone());
        }

        Self {
            config,
            registrar: Registrar::new(),
            roster: None,
            state: InterviewState::with_log(log),
            coordinator: Coordinator::new(tx.clone()),
            tx,
            rx,
            renderer: Box::new(renderer),
            latch: CompletionLatch::silent(),
            released: Arc::new(Notify::new()),
            lease: None,
        }
    }

    /// Drive question registration from a declaration function, re-evaluated
    /// after every change.
    pub fn with_declarations(mut self, declarations: impl Declarations<W> + 'static) -> Self {
        self.roster = Some(Roster::new(declarations));
        self
    }

    /// Callback fired once with the final answers.
    pub fn on_complete(mut self, callback: impl FnOnce(&Answers) + Send + 'static) -> Self {
        self.latch = CompletionLatch::new(callback);
        self
    }

    /// Handle for registering and unregistering questions directly.
    pub fn registrar(&self) -> Registrar<W> {
        self.registrar.clone()
    }

    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    pub fn state(&self) -> &InterviewState {
        &self.state
    }

    /// Run until every registered question has an accepted answer.
    ///
    /// Returns the accumulated answers; once complete, later calls return
    /// them again. Fails with [`InterviewError::Closed`] when every input
    /// for the open question has been dropped. Dropping the future (or the
    /// interview) tears everything down; a pending step's outcome is then
    /// never applied.
    pub async fn run(&mut self) -> Result<Answers> {
        if self.latch.has_fired() {
            return Ok(self.state.answers().clone());
        }

        let changed = Arc::clone(self.registrar.changed());
        let released = Arc::clone(&self.released);
        loop {
            if let Some(answers) = self.settle().await {
                info!(answers = answers.len(), "Interview complete");
                self.renderer.complete(&answers).await;
                return Ok(answers);
            }
            self.render().await;

            loop {
                tokio::select! {
                    biased;
                    inbound = self.rx.recv() => {
                        match inbound {
                            Some(inbound) => self.handle(inbound).await,
                            None => return Err(InterviewError::Closed),
                        }
                        break;
                    }
                    _ = changed.notified() => {
                        debug!("Catalog changed");
                        break;
                    }
                    _ = released.notified() => {
                        if self.abandoned() {
                            info!("Every input for the open question was dropped");
                            return Err(InterviewError::Closed);
                        }
                    }
                }
            }
        }
    }

    /// Ready with an open question whose input nobody holds anymore.
    fn abandoned(&self) -> bool {
        self.state.is_ready()
            && self
                .lease
                .as_ref()
                .is_some_and(|lease| lease.strong_count() == 0)
    }

    /// Reconcile declarations, claim pending work and apply watcher
    /// verdicts until nothing moves. Returns the answers on completion.
    async fn settle(&mut self) -> Option<Answers> {
        let catalog = Arc::clone(self.registrar.catalog());
        let mut catalog = catalog.write().await;

        loop {
            if let Some(roster) = &mut self.roster {
                roster.reconcile(&mut catalog, self.state.answers(), self.state.log());
            }
            self.coordinator.watch(&mut self.state);

            match evaluate(&self.state, &catalog) {
                Verdict::Idle => return None,
                Verdict::Advance(step) => self.apply(Event::StepChanged(step), &mut catalog),
                Verdict::Complete => {
                    if self.latch.fire(self.state.answers()) {
                        return Some(self.state.answers().clone());
                    }
                    return None;
                }
            }
        }
    }

    async fn handle(&mut self, inbound: Inbound) {
        let catalog = Arc::clone(self.registrar.catalog());
        let mut catalog = catalog.write().await;

        match inbound {
            Inbound::Answer { step, window, raw } => {
                let open = self.state.is_ready()
                    && current_question(&self.state, &catalog) == Some(step)
                    && self.state.log().len() == window;
                if !open {
                    debug!(question = %step, "Stale submission dropped");
                    return;
                }
                self.apply(Event::Answered(raw), &mut catalog);
            }
            Inbound::Resolved { ticket, event } => {
                if self.state.phase().ticket() != Some(ticket) {
                    debug!(ticket, "Stale resolution dropped");
                    return;
                }
                self.apply(event, &mut catalog);
            }
        }
    }

    fn apply(&mut self, event: Event, catalog: &mut Catalog<W>) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event, catalog);
    }

    async fn render(&mut self) {
        let mut issued = None;
        let view = {
            let catalog = self.registrar.catalog().read().await;
            let tx = self.tx.clone();
            let released = Arc::clone(&self.released);
            let window = self.state.log().len();
            assemble(&self.state, &catalog, |step| {
                let lease = Arc::new(Lease::new(released));
                issued = Some(Arc::downgrade(&lease));
                Submitter::new(tx, step, window).with_lease(lease)
            })
        };
        self.lease = issued;
        self.renderer.render(view).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::interview::question::{QuestionSpec, StepOutcome};
    use crate::interview::render::RenderView;

    const WAIT: Duration = Duration::from_secs(2);

    /// Answers each newly opened question with the next scripted value and
    /// keeps the latest input mounted until a frame without one.
    struct Scripted {
        script: Vec<Value>,
        last: Option<(QuestionId, usize)>,
        mounted: Option<Submitter>,
    }

    #[async_trait]
    impl Renderer<Submitter> for Scripted {
        async fn render(&mut self, view: RenderView<Submitter>) {
            let Some(submit) = view.input else {
                self.mounted = None;
                return;
            };
            let frame = (submit.step(), view.transcript.len());
            if self.last != Some(frame) && !self.script.is_empty() {
                self.last = Some(frame);
                submit.submit(self.script.remove(0));
            }
            self.mounted = Some(submit);
        }
    }

    fn scripted(values: &[Value]) -> Scripted {
        Scripted {
            script: values.to_vec(),
            last: None,
            mounted: None,
        }
    }

    /// Unmounts every input it is given.
    struct Discarding;

    #[async_trait]
    impl Renderer<Submitter> for Discarding {
        async fn render(&mut self, _view: RenderView<Submitter>) {}
    }

    fn question(id: &str) -> QuestionSpec<Submitter> {
        QuestionSpec::new(id, format!("{id}?"), |submit| submit)
    }

    #[tokio::test]
    async fn zero_questions_complete_with_empty_answers() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[]));
        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn answers_registered_questions_in_order() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("x"), json!("y")]));
        let registrar = interview.registrar();
        registrar.register(QuestionId::mint(), question("a")).await;
        registrar.register(QuestionId::mint(), question("b")).await;

        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert_eq!(answers.get("a"), Some(&json!("x")));
        assert_eq!(answers.get("b"), Some(&json!("y")));
        assert_eq!(interview.state().log().len(), 4);
    }

    #[tokio::test]
    async fn greeting_opens_transcript() {
        let config = InterviewConfig {
            greeting: Some("Welcome".to_string()),
            ..InterviewConfig::default()
        };
        let mut interview: Interview<Submitter> = Interview::new(config, scripted(&[json!("x")]));
        interview.registrar().register(QuestionId::mint(), question("a")).await;

        timeout(WAIT, interview.run()).await.unwrap().unwrap();
        let log = interview.state().log();
        assert_eq!(log.entries()[0].content, "Welcome");
        assert!(!log.entries()[0].mine);
        assert_eq!(log.entries()[1].content, "a?");
    }

    #[tokio::test]
    async fn stale_submissions_are_dropped() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("ok")]));
        let a = QuestionId::mint();
        interview.registrar().register(a, question("a")).await;

        // A submission stamped for a transcript position that never comes.
        Submitter::new(interview.tx.clone(), a, 99).submit("stale");

        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert_eq!(answers.get("a"), Some(&json!("ok")));
    }

    #[tokio::test]
    async fn async_pipeline_completes() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("r")]));
        interview
            .registrar()
            .register(
                QuestionId::mint(),
                question("a")
                    .transform(|_, _| StepOutcome::deferred(async { Ok(json!("X")) }))
                    .validate(|_| StepOutcome::deferred(async { Ok(None) })),
            )
            .await;

        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert_eq!(answers.get("a"), Some(&json!("X")));
    }

    #[tokio::test]
    async fn on_complete_fires_once() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!(1)]))
                .on_complete(move |answers: &Answers| {
                    let _ = done_tx.send(answers.clone());
                });
        interview.registrar().register(QuestionId::mint(), question("a")).await;

        timeout(WAIT, interview.run()).await.unwrap().unwrap();
        let fired = done_rx.recv().await.unwrap();
        assert_eq!(fired.get("a"), Some(&json!("1")));
        assert!(done_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_inputs_close_the_interview() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), Discarding);
        interview.registrar().register(QuestionId::mint(), question("a")).await;

        let outcome = timeout(WAIT, interview.run()).await.unwrap();
        assert!(matches!(outcome, Err(InterviewError::Closed)));
        assert!(interview.state().answers().is_empty());
    }

    #[tokio::test]
    async fn pending_step_survives_dropped_inputs() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("r")]));
        interview
            .registrar()
            .register(
                QuestionId::mint(),
                question("a").transform(|_, _| {
                    StepOutcome::deferred(async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!("X"))
                    })
                }),
            )
            .await;

        // The widget is unmounted while the transform runs; the step still lands.
        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert_eq!(answers.get("a"), Some(&json!("X")));
    }

    #[tokio::test]
    async fn stale_resolution_leaves_pending_step_untouched() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("r")]));
        interview
            .registrar()
            .register(
                QuestionId::mint(),
                question("a").transform(|_, _| {
                    StepOutcome::deferred(futures::future::pending())
                }),
            )
            .await;

        let outcome = timeout(Duration::from_millis(100), interview.run()).await;
        assert!(outcome.is_err(), "transform never resolves");
        let ticket = interview.state().phase().ticket().expect("pending step");
        let log_len = interview.state().log().len();

        interview
            .handle(Inbound::Resolved {
                ticket: ticket + 1,
                event: Event::Transformed(json!("forged")),
            })
            .await;

        assert_eq!(interview.state().phase().ticket(), Some(ticket));
        assert_eq!(interview.state().log().len(), log_len);
        assert!(interview.state().answers().is_empty());
    }

    /// Unregisters the first question it is shown, answers the rest.
    struct Withdrawing {
        registrar: Registrar<Submitter>,
        withdraw: QuestionId,
        mounted: Option<Submitter>,
    }

    #[async_trait]
    impl Renderer<Submitter> for Withdrawing {
        async fn render(&mut self, view: RenderView<Submitter>) {
            let Some(submit) = view.input else {
                return;
            };
            if submit.step() == self.withdraw {
                self.registrar.unregister(self.withdraw).await;
            } else if self.mounted.as_ref().map(Submitter::step) != Some(submit.step()) {
                submit.submit("y");
            }
            self.mounted = Some(submit);
        }
    }

    #[tokio::test]
    async fn unregistering_open_question_moves_on() {
        let registrar: Registrar<Submitter> = Registrar::new();
        let a = QuestionId::mint();
        let b = QuestionId::mint();
        let renderer = Withdrawing {
            registrar: registrar.clone(),
            withdraw: a,
            mounted: None,
        };
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), renderer);
        // Share one catalog between the renderer and the interview.
        interview.registrar = registrar.clone();
        registrar.register(a, question("a")).await;
        registrar.register(b, question("b")).await;

        let answers = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert!(!answers.contains("a"));
        assert_eq!(answers.get("b"), Some(&json!("y")));
        assert_eq!(interview.state().log().entries()[0].content, "b?");
    }

    #[tokio::test]
    async fn run_after_completion_returns_answers_again() {
        let mut interview: Interview<Submitter> =
            Interview::new(InterviewConfig::default(), scripted(&[json!("x")]));
        interview.registrar().register(QuestionId::mint(), question("a")).await;

        let first = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        let second = timeout(WAIT, interview.run()).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.get("a"), Some(&json!("x")));
    }
}
