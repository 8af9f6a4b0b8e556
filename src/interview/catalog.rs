//! Question catalog — the live set of registered questions.

use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tracing::debug;

use super::question::{QuestionId, QuestionSpec};

/// A registered question and whether it has an accepted answer.
#[derive(Debug)]
pub struct CatalogEntry<W> {
    pub spec: QuestionSpec<W>,
    answered: bool,
}

impl<W> CatalogEntry<W> {
    pub fn is_answered(&self) -> bool {
        self.answered
    }
}

/// Insertion-ordered map from question identity to catalog entry.
///
/// Order is first-registration order; re-registering an identity updates it
/// in place without moving it.
#[derive(Debug)]
pub struct Catalog<W> {
    entries: Vec<(QuestionId, CatalogEntry<W>)>,
}

impl<W> Default for Catalog<W> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<W> Catalog<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the entry for `id`, preserving its answered flag.
    /// Returns true if the identity was not registered before.
    pub fn register(&mut self, id: QuestionId, spec: QuestionSpec<W>) -> bool {
        if let Some((_, entry)) = self.entries.iter_mut().find(|(key, _)| *key == id) {
            entry.spec = spec;
            return false;
        }
        debug!(question = %id, key = spec.id(), "Question registered");
        self.entries.push((
            id,
            CatalogEntry {
                spec,
                answered: false,
            },
        ));
        true
    }

    /// Remove the entry for `id`.
    pub fn unregister(&mut self, id: QuestionId) -> Option<CatalogEntry<W>> {
        let index = self.entries.iter().position(|(key, _)| *key == id)?;
        let (_, entry) = self.entries.remove(index);
        debug!(question = %id, answered = entry.answered, "Question unregistered");
        Some(entry)
    }

    pub fn get(&self, id: QuestionId) -> Option<&CatalogEntry<W>> {
        self.entries
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, entry)| entry)
    }

    /// Flip `answered` to true. Returns false if the entry is gone or was
    /// already answered.
    pub fn mark_answered(&mut self, id: QuestionId) -> bool {
        match self.entries.iter_mut().find(|(key, _)| *key == id) {
            Some((_, entry)) if !entry.answered => {
                entry.answered = true;
                true
            }
            _ => false,
        }
    }

    /// The first registered entry, answered or not.
    pub fn first(&self) -> Option<(QuestionId, &CatalogEntry<W>)> {
        self.entries.first().map(|(id, entry)| (*id, entry))
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &CatalogEntry<W>)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }
}

/// Finds the first unanswered question, in registration order.
pub fn find_first_unanswered<W>(catalog: &Catalog<W>) -> Option<QuestionId> {
    catalog
        .iter()
        .find(|(_, entry)| !entry.is_answered())
        .map(|(id, _)| id)
}

/// Shared registration handle injected into whatever layer declares
/// questions.
///
/// Every change wakes the owning interview so the next completion check
/// sees it.
pub struct Registrar<W> {
    catalog: Arc<RwLock<Catalog<W>>>,
    changed: Arc<Notify>,
}

impl<W> Clone for Registrar<W> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            changed: Arc::clone(&self.changed),
        }
    }
}

impl<W> Default for Registrar<W> {
    fn default() -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::new())),
            changed: Arc::new(Notify::new()),
        }
    }
}

impl<W> Registrar<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (mount) or update a question declaration.
    pub async fn register(&self, id: QuestionId, spec: QuestionSpec<W>) {
        self.catalog.write().await.register(id, spec);
        self.changed.notify_one();
    }

    /// Unregister (unmount) a question declaration.
    pub async fn unregister(&self, id: QuestionId) {
        self.catalog.write().await.unregister(id);
        self.changed.notify_one();
    }

    /// Number of registered questions.
    pub async fn len(&self) -> usize {
        self.catalog.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.catalog.read().await.is_empty()
    }

    pub(crate) fn catalog(&self) -> &Arc<RwLock<Catalog<W>>> {
        &self.catalog
    }

    pub(crate) fn changed(&self) -> &Arc<Notify> {
        &self.changed
    }
}
