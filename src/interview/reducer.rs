//! Interview reducer — synchronous `(state, event) -> state` transitions.
//!
//! The reducer never awaits. An asynchronous transform or validation parks
//! the machine in `Transforming`/`Validating` with the deferred computation
//! stored in the state; the coordinator awaits it and feeds the outcome back
//! as a `Transformed`/`Validated` event.
//!
//! The only in-place mutation outside the state value is the catalog
//! entry's `answered` flag, flipped on acceptance.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::catalog::Catalog;
use super::question::{QuestionId, StepOutcome};
use super::state::{Event, InterviewState, Phase, Pending};

/// The question an answer would currently apply to.
///
/// This is the explicit step when one is set. Before any step is set and
/// while the transcript is still empty, it falls back to the first
/// registered question.
pub fn current_question<W>(state: &InterviewState, catalog: &Catalog<W>) -> Option<QuestionId> {
    match state.step {
        Some(step) => Some(step),
        None if state.log.is_empty() => catalog.first().map(|(id, _)| id),
        None => None,
    }
}

/// Apply one event.
pub fn reduce<W>(state: InterviewState, event: Event, catalog: &mut Catalog<W>) -> InterviewState {
    let event_name = event.name();
    if !accepts(&state.phase, &event) {
        warn!(
            event = event_name,
            phase = %state.phase,
            "Ignoring event not valid in current phase"
        );
        return state;
    }

    match event {
        Event::StepChanged(step) => step_changed(state, step),
        Event::Answered(raw) => answered(state, raw, catalog),
        Event::Transformed(content) => {
            let mut state = state;
            state.phase = Phase::Ready;
            validate(state, content, catalog)
        }
        Event::Validated { reason, content } => {
            let mut state = state;
            state.phase = Phase::Ready;
            settle(state, reason, content, catalog)
        }
    }
}

fn accepts(phase: &Phase, event: &Event) -> bool {
    matches!(
        (phase, event),
        (Phase::Ready, Event::StepChanged(_))
            | (Phase::Ready, Event::Answered(_))
            | (Phase::Transforming(_), Event::Transformed(_))
            | (Phase::Validating(_), Event::Validated { .. })
    )
}

fn step_changed(mut state: InterviewState, step: Option<QuestionId>) -> InterviewState {
    debug!(
        from = ?state.step.map(|s| s.to_string()),
        to = ?step.map(|s| s.to_string()),
        "Step changed"
    );
    state.step = step;
    state
}

fn answered<W>(mut state: InterviewState, raw: Value, catalog: &mut Catalog<W>) -> InterviewState {
    let Some(step) = current_question(&state, catalog) else {
        warn!("Answer submitted with no current question; ignoring");
        return state;
    };
    let spec = match catalog.get(step) {
        Some(entry) if !entry.is_answered() => entry.spec.clone(),
        Some(_) => {
            warn!(question = %step, "Answer submitted for an already answered question; ignoring");
            return state;
        }
        None => {
            warn!(question = %step, "Answer submitted for an unregistered question; ignoring");
            return state;
        }
    };

    state.step = Some(step);
    state.log.push_interviewer(spec.text());
    state.log.push_interviewee(spec.format_answer(&raw));

    match spec.run_transform(raw.clone()) {
        StepOutcome::Immediate(value) => validate(state, value, catalog),
        StepOutcome::Deferred(task) => {
            let ticket = state.next_ticket();
            debug!(question = %step, ticket, "Transform deferred");
            state.phase = Phase::Transforming(Pending::new(ticket, raw, task));
            state
        }
    }
}

fn validate<W>(mut state: InterviewState, value: Value, catalog: &mut Catalog<W>) -> InterviewState {
    let Some((step, spec)) = state
        .step
        .and_then(|step| catalog.get(step).map(|entry| (step, entry.spec.clone())))
    else {
        return abandon(state);
    };

    match spec.run_validate(&value) {
        StepOutcome::Immediate(reason) => settle(state, reason, value, catalog),
        StepOutcome::Deferred(task) => {
            let ticket = state.next_ticket();
            debug!(question = %step, ticket, "Validation deferred");
            state.phase = Phase::Validating(Pending::new(ticket, value, task));
            state
        }
    }
}

fn settle<W>(
    mut state: InterviewState,
    reason: Option<String>,
    content: Value,
    catalog: &mut Catalog<W>,
) -> InterviewState {
    let Some((step, key)) = state
        .step
        .and_then(|step| catalog.get(step).map(|entry| (step, entry.spec.id().to_string())))
    else {
        return abandon(state);
    };

    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
        info!(question = %step, key = %key, reason = %reason, "Answer rejected");
        state.log.push_interviewer(reason);
        return state;
    }

    if catalog.mark_answered(step) {
        info!(question = %step, key = %key, "Answer accepted");
        state.answers.insert(key, content);
    } else {
        warn!(question = %step, "Question was already answered; keeping earlier value");
    }
    state
}

/// The current question disappeared mid-pipeline: drop the attempt.
fn abandon(state: InterviewState) -> InterviewState {
    warn!(
        question = ?state.step.map(|s| s.to_string()),
        "Current question is no longer registered; dropping answer"
    );
    state
}
