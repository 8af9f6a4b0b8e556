//! Declarative question registration.
//!
//! A [`Declarations`] implementation describes which questions should exist
//! given the answers (and transcript) so far. The [`Roster`] diffs each
//! declaration pass against the previous one and turns it into catalog
//! mounts, updates and unmounts. This is how conditional questions and
//! question text computed from earlier answers are expressed.

use tracing::{debug, warn};

use super::catalog::Catalog;
use super::question::{QuestionId, QuestionSpec};
use super::state::Answers;
use super::transcript::Transcript;

/// One declared question in a declaration slot.
///
/// `key` names the slot, not the answer: two slots may share a question id
/// (`spec.id()`) to ask the same thing again.
pub struct Declaration<W> {
    pub key: String,
    pub spec: QuestionSpec<W>,
}

impl<W> Declaration<W> {
    pub fn new(key: impl Into<String>, spec: QuestionSpec<W>) -> Self {
        Self {
            key: key.into(),
            spec,
        }
    }
}

/// Produces the questions that should currently exist.
pub trait Declarations<W>: Send {
    fn declare(&self, answers: &Answers, log: &Transcript) -> Vec<Declaration<W>>;
}

impl<W, F> Declarations<W> for F
where
    F: Fn(&Answers, &Transcript) -> Vec<Declaration<W>> + Send,
{
    fn declare(&self, answers: &Answers, log: &Transcript) -> Vec<Declaration<W>> {
        self(answers, log)
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterChange {
    pub mounted: usize,
    pub unmounted: usize,
}

/// Keeps declaration slots and catalog identities in sync.
pub struct Roster<W> {
    declarations: Box<dyn Declarations<W>>,
    mounted: Vec<(String, QuestionId)>,
}

impl<W> Roster<W> {
    pub fn new(declarations: impl Declarations<W> + 'static) -> Self {
        Self {
            declarations: Box::new(declarations),
            mounted: Vec::new(),
        }
    }

    /// Identity currently bound to a slot.
    pub fn identity(&self, key: &str) -> Option<QuestionId> {
        self.mounted
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    /// Run one declaration pass against `catalog`.
    ///
    /// New slots mint an identity and register; surviving slots re-register
    /// with their latest spec (answered state is kept by the catalog);
    /// vanished slots unregister.
    pub fn reconcile(
        &mut self,
        catalog: &mut Catalog<W>,
        answers: &Answers,
        log: &Transcript,
    ) -> RosterChange {
        let mut change = RosterChange::default();
        let mut next: Vec<(String, QuestionId)> = Vec::new();

        for Declaration { key, spec } in self.declarations.declare(answers, log) {
            if next.iter().any(|(k, _)| *k == key) {
                warn!(key = %key, "Duplicate declaration key; keeping the first");
                continue;
            }
            let id = match self.identity(&key) {
                Some(id) => id,
                None => {
                    change.mounted += 1;
                    QuestionId::mint()
                }
            };
            catalog.register(id, spec);
            next.push((key, id));
        }

        for (key, id) in &self.mounted {
            if !next.iter().any(|(k, _)| k == key) {
                catalog.unregister(*id);
                change.unmounted += 1;
            }
        }

        if change != RosterChange::default() {
            debug!(
                mounted = change.mounted,
                unmounted = change.unmounted,
                live = next.len(),
                "Declarations reconciled"
            );
        }
        self.mounted = next;
        change
    }
}
