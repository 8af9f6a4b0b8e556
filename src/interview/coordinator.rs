//! Suspension coordinator — the only place that awaits a pending step.
//!
//! When the state parks in `Transforming` or `Validating`, the coordinator
//! claims the deferred computation (exactly once per ticket), awaits it on a
//! tokio task and posts the outcome back to the interview as an event.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::runtime::Inbound;
use super::state::{Event, InterviewState, Phase};

/// Fallback rejection when a failed validation carries no message.
const VALIDATION_FAILED: &str = "Validation failed";

pub struct Coordinator {
    tx: mpsc::UnboundedSender<Inbound>,
    inflight: Option<(u64, JoinHandle<()>)>,
}

impl Coordinator {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { tx, inflight: None }
    }

    /// Claim and start awaiting the pending step of `state`, if there is one
    /// that nobody has claimed yet. Returns the ticket started.
    ///
    /// Failure policy: a failed transform resumes with the raw answer as if
    /// it were the transformed value; a failed validation resumes with the
    /// error text as the rejection reason.
    pub fn watch(&mut self, state: &mut InterviewState) -> Option<u64> {
        match state.phase_mut() {
            Phase::Ready => None,
            Phase::Transforming(pending) => {
                let task = pending.take_task()?;
                let ticket = pending.ticket();
                let fallback = pending.content().clone();
                self.spawn(ticket, async move {
                    match task.await {
                        Ok(content) => Event::Transformed(content),
                        Err(e) => {
                            error!(ticket, error = %e, "Transform failed; continuing with the raw answer");
                            Event::Transformed(fallback)
                        }
                    }
                });
                Some(ticket)
            }
            Phase::Validating(pending) => {
                let task = pending.take_task()?;
                let ticket = pending.ticket();
                let content = pending.content().clone();
                self.spawn(ticket, async move {
                    match task.await {
                        Ok(reason) => Event::Validated { reason, content },
                        Err(e) => {
                            error!(ticket, error = %e, "Validation failed; treating failure as rejection");
                            let reason = e.to_string();
                            let reason = if reason.is_empty() {
                                VALIDATION_FAILED.to_string()
                            } else {
                                reason
                            };
                            Event::Validated {
                                reason: Some(reason),
                                content,
                            }
                        }
                    }
                });
                Some(ticket)
            }
        }
    }

    fn spawn(&mut self, ticket: u64, outcome: impl Future<Output = Event> + Send + 'static) {
        self.cancel();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let event = outcome.await;
            if tx.send(Inbound::Resolved { ticket, event }).is_err() {
                debug!(ticket, "Interview gone before step resolved");
            }
        });
        debug!(ticket, "Awaiting pending step");
        self.inflight = Some((ticket, handle));
    }

    /// Ticket of the computation currently being awaited, if unfinished.
    pub fn in_flight(&self) -> Option<u64> {
        self.inflight
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(ticket, _)| *ticket)
    }

    /// Abort the in-flight await, if any. Its outcome will never be posted.
    pub fn cancel(&mut self) {
        if let Some((ticket, handle)) = self.inflight.take()
            && !handle.is_finished()
        {
            debug!(ticket, "Cancelling pending step");
            handle.abort();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.cancel();
    }
}
