//! Notifying connection over a fact source.
//!
//! Every successful add or remove is reported synchronously to the registered
//! [`StatementListener`]s, and newly added statements are recorded in the
//! current batch for the forward-chaining driver.

use std::sync::{Arc, Mutex, RwLock};

use crate::error::StoreResult;

use super::source::{FactSource, StatementListener, Statements};
use super::{Iri, Statement, Term};

/// A [`FactSource`] wrapper owning the session's observer list.
pub struct Connection {
    source: Arc<dyn FactSource>,
    listeners: RwLock<Vec<Arc<dyn StatementListener>>>,
    /// Statements added since the batch was last taken.
    batch: Mutex<Vec<Statement>>,
}

impl Connection {
    pub fn new(source: Arc<dyn FactSource>) -> Self {
        Self {
            source,
            listeners: RwLock::new(Vec::new()),
            batch: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener; it sees every later change.
    pub fn add_listener(&self, listener: Arc<dyn StatementListener>) {
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// The wrapped source.
    pub fn source(&self) -> &Arc<dyn FactSource> {
        &self.source
    }

    /// Take the statements added since the last call.
    pub fn take_batch(&self) -> Vec<Statement> {
        std::mem::take(&mut *self.batch.lock().expect("batch lock poisoned"))
    }

    fn listeners(&self) -> Vec<Arc<dyn StatementListener>> {
        self.listeners.read().expect("listener lock poisoned").clone()
    }
}

impl FactSource for Connection {
    fn statements(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> StoreResult<Statements<'_>> {
        self.source.statements(subject, predicate, object)
    }

    fn insert(&self, statement: &Statement) -> StoreResult<bool> {
        let added = self.source.insert(statement)?;
        if added {
            self.batch
                .lock()
                .expect("batch lock poisoned")
                .push(statement.clone());
            for listener in self.listeners() {
                listener.statement_added(statement);
            }
        }
        Ok(added)
    }

    fn remove(&self, statement: &Statement) -> StoreResult<bool> {
        let removed = self.source.remove(statement)?;
        if removed {
            for listener in self.listeners() {
                listener.statement_removed(statement);
            }
        }
        Ok(removed)
    }

    fn begin(&self) -> StoreResult<()> {
        self.source.begin()
    }

    fn commit(&self) -> StoreResult<()> {
        self.source.commit()
    }

    fn flush(&self) -> StoreResult<()> {
        self.source.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::graph::index::MemoryGraph;

    #[derive(Default)]
    struct Counter {
        added: AtomicUsize,
        removed: AtomicUsize,
    }

    impl StatementListener for Counter {
        fn statement_added(&self, _: &Statement) {
            self.added.fetch_add(1, Ordering::Relaxed);
        }
        fn statement_removed(&self, _: &Statement) {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn listeners_only_see_effective_changes() {
        let conn = Connection::new(Arc::new(MemoryGraph::new()));
        let counter = Arc::new(Counter::default());
        conn.add_listener(counter.clone());

        let st = Statement::new(Term::iri("http://ex/a"), "http://ex/p", Term::string("v"));
        assert!(conn.insert(&st).unwrap());
        assert!(!conn.insert(&st).unwrap());
        assert!(conn.remove(&st).unwrap());
        assert!(!conn.remove(&st).unwrap());

        assert_eq!(counter.added.load(Ordering::Relaxed), 1);
        assert_eq!(counter.removed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn batch_collects_new_statements() {
        let conn = Connection::new(Arc::new(MemoryGraph::new()));
        let st = Statement::new(Term::iri("http://ex/a"), "http://ex/p", Term::string("v"));
        conn.insert(&st).unwrap();
        conn.insert(&st).unwrap();
        assert_eq!(conn.take_batch(), vec![st]);
        assert!(conn.take_batch().is_empty());
    }
}
