//! In-memory fact store with subject and predicate indexes.
//!
//! Statements live in a `RwLock`ed ordered set so iteration is deterministic;
//! `DashMap` secondary indexes give fast lookups by subject or predicate.

use std::collections::BTreeSet;
use std::sync::RwLock;

use dashmap::DashMap;

use crate::error::StoreResult;

use super::source::{FactSource, Statements};
use super::{Iri, Statement, Term};

/// In-memory [`FactSource`].
pub struct MemoryGraph {
    /// All statements, ordered.
    statements: RwLock<BTreeSet<Statement>>,
    /// Subject index: subject → statements with that subject.
    subject_index: DashMap<Term, BTreeSet<Statement>>,
    /// Predicate index: predicate → statements with that predicate.
    predicate_index: DashMap<Iri, BTreeSet<Statement>>,
}

impl MemoryGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            statements: RwLock::new(BTreeSet::new()),
            subject_index: DashMap::new(),
            predicate_index: DashMap::new(),
        }
    }

    /// Build a graph from a batch of statements.
    pub fn from_statements(statements: impl IntoIterator<Item = Statement>) -> Self {
        let graph = Self::new();
        for st in statements {
            graph.add(st);
        }
        graph
    }

    fn add(&self, statement: Statement) -> bool {
        let mut all = self.statements.write().expect("graph lock poisoned");
        if !all.insert(statement.clone()) {
            return false;
        }
        self.subject_index
            .entry(statement.subject.clone())
            .or_default()
            .insert(statement.clone());
        self.predicate_index
            .entry(statement.predicate.clone())
            .or_default()
            .insert(statement);
        true
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.read().expect("graph lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all statements.
    pub fn all_statements(&self) -> Vec<Statement> {
        self.statements
            .read()
            .expect("graph lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FactSource for MemoryGraph {
    fn statements(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> StoreResult<Statements<'_>> {
        // Collect under the index guard so no lock outlives the call.
        let matches: Vec<Statement> = if let Some(s) = subject {
            self.subject_index
                .get(s)
                .map(|set| {
                    set.iter()
                        .filter(|st| st.matches(None, predicate, object))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        } else if let Some(p) = predicate {
            self.predicate_index
                .get(p)
                .map(|set| {
                    set.iter()
                        .filter(|st| st.matches(None, None, object))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        } else {
            self.statements
                .read()
                .expect("graph lock poisoned")
                .iter()
                .filter(|st| st.matches(None, None, object))
                .cloned()
                .collect()
        };
        Ok(Box::new(matches.into_iter().map(Ok)))
    }

    fn insert(&self, statement: &Statement) -> StoreResult<bool> {
        Ok(self.add(statement.clone()))
    }

    fn remove(&self, statement: &Statement) -> StoreResult<bool> {
        let mut all = self.statements.write().expect("graph lock poisoned");
        if !all.remove(statement) {
            return Ok(false);
        }
        if let Some(mut set) = self.subject_index.get_mut(&statement.subject) {
            set.remove(statement);
        }
        if let Some(mut set) = self.predicate_index.get_mut(&statement.predicate) {
            set.remove(statement);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(s: &str, p: &str, o: &str) -> Statement {
        Statement::new(Term::iri(s), p, Term::iri(o))
    }

    #[test]
    fn insert_is_idempotent() {
        let g = MemoryGraph::new();
        assert!(g.insert(&st("http://ex/a", "http://ex/p", "http://ex/b")).unwrap());
        assert!(!g.insert(&st("http://ex/a", "http://ex/p", "http://ex/b")).unwrap());
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn lookup_by_each_position() {
        let g = MemoryGraph::from_statements([
            st("http://ex/a", "http://ex/p", "http://ex/b"),
            st("http://ex/a", "http://ex/q", "http://ex/c"),
            st("http://ex/d", "http://ex/p", "http://ex/c"),
        ]);
        let a = Term::iri("http://ex/a");
        let p = Iri::new("http://ex/p");
        let c = Term::iri("http://ex/c");
        assert_eq!(g.statements(Some(&a), None, None).unwrap().count(), 2);
        assert_eq!(g.statements(None, Some(&p), None).unwrap().count(), 2);
        assert_eq!(g.statements(None, None, Some(&c)).unwrap().count(), 2);
        assert_eq!(g.statements(Some(&a), Some(&p), Some(&c)).unwrap().count(), 0);
        assert_eq!(g.subjects("http://ex/p", &c).unwrap(), vec![Term::iri("http://ex/d")]);
    }

    #[test]
    fn remove_updates_indexes() {
        let g = MemoryGraph::new();
        let s = st("http://ex/a", "http://ex/p", "http://ex/b");
        g.insert(&s).unwrap();
        assert!(g.remove(&s).unwrap());
        assert!(!g.remove(&s).unwrap());
        let p = Iri::new("http://ex/p");
        assert_eq!(g.statements(None, Some(&p), None).unwrap().count(), 0);
        assert!(g.is_empty());
    }
}
