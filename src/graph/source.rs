//! Collaborator traits: fact lookup, rule-body evaluation and change listeners.

use crate::error::{QueryResult, StoreResult};

use super::{Iri, Statement, Term};

/// Iterator over statements matching a pattern.
pub type Statements<'a> = Box<dyn Iterator<Item = StoreResult<Statement>> + 'a>;

/// Synchronous statement store.
///
/// All optimizer and inference logic issues its lookups and additions through
/// this trait only.
pub trait FactSource: Send + Sync {
    /// Statements matching the pattern; `None` is a wildcard.
    fn statements(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> StoreResult<Statements<'_>>;

    /// Add a statement. Returns `true` if it was not already present.
    fn insert(&self, statement: &Statement) -> StoreResult<bool>;

    /// Remove a statement. Returns `true` if it was present.
    fn remove(&self, statement: &Statement) -> StoreResult<bool>;

    /// Start an edit batch.
    fn begin(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Make pending edits durable.
    fn commit(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Make pending edits visible to subsequent lookups.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Whether any statement matches the pattern.
    fn contains(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> StoreResult<bool> {
        match self.statements(subject, predicate, object)?.next() {
            Some(res) => res.map(|_| true),
            None => Ok(false),
        }
    }

    /// Objects of `(subject, predicate, ?)`, in store order.
    fn objects(&self, subject: &Term, predicate: &str) -> StoreResult<Vec<Term>> {
        let predicate = Iri::new(predicate);
        self.statements(Some(subject), Some(&predicate), None)?
            .map(|res| res.map(|st| st.object))
            .collect()
    }

    /// The first object of `(subject, predicate, ?)`, if any.
    fn object(&self, subject: &Term, predicate: &str) -> StoreResult<Option<Term>> {
        let predicate = Iri::new(predicate);
        self.statements(Some(subject), Some(&predicate), None)?
            .next()
            .transpose()
            .map(|st| st.map(|st| st.object))
    }

    /// Subjects of `(?, predicate, object)`, in store order.
    fn subjects(&self, predicate: &str, object: &Term) -> StoreResult<Vec<Term>> {
        let predicate = Iri::new(predicate);
        self.statements(None, Some(&predicate), Some(object))?
            .map(|res| res.map(|st| st.subject))
            .collect()
    }
}

/// Result of evaluating a stored body.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// CONSTRUCT / DESCRIBE result.
    Graph(Vec<Statement>),
    /// ASK result.
    Boolean(bool),
    /// SELECT result; rows of (variable, value).
    Solutions(Vec<Vec<(String, Term)>>),
}

impl QueryOutcome {
    pub fn form(&self) -> &'static str {
        match self {
            Self::Graph(_) => "CONSTRUCT",
            Self::Boolean(_) => "ASK",
            Self::Solutions(_) => "SELECT",
        }
    }
}

/// Evaluates rule, constructor and constraint bodies with `?this` bound.
pub trait QueryEvaluator: Send + Sync {
    fn evaluate(&self, query: &str, this: &Term) -> QueryResult<QueryOutcome>;
}

/// Observer of statement additions and removals.
///
/// Invoked synchronously on the mutating thread, after the store has applied
/// the change.
pub trait StatementListener: Send + Sync {
    fn statement_added(&self, statement: &Statement);
    fn statement_removed(&self, statement: &Statement);
}
