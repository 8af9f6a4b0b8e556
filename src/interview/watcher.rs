//! Completion watcher — decides, after each settled state, whether to move
//! the cursor or finish the interview.

use super::catalog::{Catalog, find_first_unanswered};
use super::question::QuestionId;
use super::state::{Answers, InterviewState};

/// What the watcher wants done next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing to do.
    Idle,
    /// Dispatch `StepChanged` with this target.
    Advance(Option<QuestionId>),
    /// No unanswered question and no open step: the interview is done.
    Complete,
}

/// Evaluate a state against the live catalog.
///
/// Never advances while a transform or validation is pending. When the
/// last question gets answered the step is first cleared (`Advance(None)`);
/// completion is reported on the following pass.
pub fn evaluate<W>(state: &InterviewState, catalog: &Catalog<W>) -> Verdict {
    if !state.is_ready() {
        return Verdict::Idle;
    }

    match (find_first_unanswered(catalog), state.step()) {
        (None, None) => Verdict::Complete,
        (next, step) if next == step => Verdict::Idle,
        (next, _) => Verdict::Advance(next),
    }
}

type OnComplete = Box<dyn FnOnce(&Answers) + Send>;

/// Fires the completion callback at most once.
pub struct CompletionLatch {
    callback: Option<OnComplete>,
    fired: bool,
}

impl CompletionLatch {
    pub fn new(callback: impl FnOnce(&Answers) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            fired: false,
        }
    }

    /// A latch with no callback; still tracks completion.
    pub fn silent() -> Self {
        Self {
            callback: None,
            fired: false,
        }
    }

    /// Fire with the final answers. Returns false if already fired.
    pub fn fire(&mut self, answers: &Answers) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        if let Some(callback) = self.callback.take() {
            callback(answers);
        }
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl std::fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("fired", &self.fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::interview::question::{QuestionSpec, StepOutcome};
    use crate::interview::reducer::reduce;
    use crate::interview::state::Event;

    fn spec(id: &str) -> QuestionSpec<()> {
        QuestionSpec::new(id, format!("{id}?"), |_| ())
    }

    /// Apply watcher verdicts until it goes idle or completes.
    fn settle(
        mut state: InterviewState,
        catalog: &mut Catalog<()>,
    ) -> (InterviewState, Verdict) {
        loop {
            match evaluate(&state, catalog) {
                Verdict::Advance(step) => {
                    state = reduce(state, Event::StepChanged(step), catalog);
                }
                verdict => return (state, verdict),
            }
        }
    }

    #[test]
    fn empty_catalog_completes_immediately() {
        let catalog: Catalog<()> = Catalog::new();
        assert_eq!(evaluate(&InterviewState::new(), &catalog), Verdict::Complete);
    }

    #[test]
    fn advances_to_first_unanswered() {
        let mut catalog = Catalog::new();
        let a = QuestionId::mint();
        catalog.register(a, spec("a"));
        assert_eq!(evaluate(&InterviewState::new(), &catalog), Verdict::Advance(Some(a)));

        let state = reduce(InterviewState::new(), Event::StepChanged(Some(a)), &mut catalog);
        assert_eq!(evaluate(&state, &catalog), Verdict::Idle);
    }

    #[test]
    fn clears_step_then_completes() {
        let mut catalog = Catalog::new();
        let a = QuestionId::mint();
        let b = QuestionId::mint();
        catalog.register(a, spec("a"));
        catalog.register(b, spec("b"));

        let (state, verdict) = settle(InterviewState::new(), &mut catalog);
        assert_eq!(verdict, Verdict::Idle);
        assert_eq!(state.step(), Some(a));

        let state = reduce(state, Event::Answered(json!("x")), &mut catalog);
        let (state, verdict) = settle(state, &mut catalog);
        assert_eq!(verdict, Verdict::Idle);
        assert_eq!(state.step(), Some(b));

        let state = reduce(state, Event::Answered(json!("y")), &mut catalog);
        assert_eq!(evaluate(&state, &catalog), Verdict::Advance(None));
        let (state, verdict) = settle(state, &mut catalog);
        assert_eq!(verdict, Verdict::Complete);
        assert_eq!(state.answers().get("a"), Some(&json!("x")));
        assert_eq!(state.answers().get("b"), Some(&json!("y")));
    }

    #[test]
    fn idle_while_pending() {
        let mut catalog = Catalog::new();
        let a = QuestionId::mint();
        let b = QuestionId::mint();
        catalog.register(
            a,
            spec("a").transform(|raw, _| StepOutcome::deferred(async move { Ok(raw) })),
        );
        catalog.register(b, spec("b"));

        let state = reduce(InterviewState::new(), Event::StepChanged(Some(a)), &mut catalog);
        let state = reduce(state, Event::Answered(json!("x")), &mut catalog);
        assert!(state.is_pending());
        // `a` is still unanswered and `b` exists, yet nothing may move.
        catalog.unregister(a);
        assert_eq!(evaluate(&state, &catalog), Verdict::Idle);
    }

    #[test]
    fn late_registration_reopens_flow() {
        let mut catalog = Catalog::new();
        let a = QuestionId::mint();
        catalog.register(a, spec("a"));
        let (state, _) = settle(InterviewState::new(), &mut catalog);
        let state = reduce(state, Event::Answered(json!("x")), &mut catalog);

        let late = QuestionId::mint();
        catalog.register(late, spec("late"));
        assert_eq!(evaluate(&state, &catalog), Verdict::Advance(Some(late)));
    }

    #[test]
    fn latch_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut latch = CompletionLatch::new(move |answers: &Answers| {
            assert!(answers.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!latch.has_fired());
        assert!(latch.fire(&Answers::new()));
        assert!(!latch.fire(&Answers::new()));
        assert!(latch.has_fired());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn silent_latch_tracks_state() {
        let mut latch = CompletionLatch::silent();
        assert!(latch.fire(&Answers::new()));
        assert!(!latch.fire(&Answers::new()));
    }
}
