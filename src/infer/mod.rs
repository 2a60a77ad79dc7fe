//! Forward-chaining SPIN rule and constraint inference.
//!
//! Per changed subject: order its classes most-specific first, run every
//! rule attached through the ordered rule properties, then constructors
//! (once per subject), then constraints.

pub mod engine;
pub mod hierarchy;
pub mod listener;
pub mod rules;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::graph::vocab::spin;
use crate::graph::{Iri, Term};

pub use engine::{InferencerConfig, SpinInferencer};
pub use hierarchy::ClassHierarchyCache;
pub use listener::SchemaListener;
pub use rules::{RulePropertyCache, RulePropertyOrder};

/// One rule-chain slot: a property (`spin:rule` or a sub-property of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleProperty {
    pub uri: Iri,
    /// Rule properties that must run after this one.
    pub next_rules: Vec<Iri>,
    /// Maximum firings per rule per run; `None` is unbounded.
    pub max_iteration_count: Option<usize>,
}

/// Severity of a constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViolationLevel {
    Info,
    Warning,
    Error,
    Fatal,
}

impl ViolationLevel {
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            spin::INFO => Some(Self::Info),
            spin::WARNING => Some(Self::Warning),
            spin::ERROR => Some(Self::Error),
            spin::FATAL => Some(Self::Fatal),
            _ => None,
        }
    }

    /// ERROR and FATAL stop inference for the subject.
    pub fn is_fatal(self) -> bool {
        self >= Self::Error
    }
}

impl fmt::Display for ViolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        })
    }
}

/// A constraint check result. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintViolation {
    pub level: ViolationLevel,
    pub message: Option<String>,
    pub root: Option<Term>,
    pub path: Option<Term>,
    pub value: Option<Term>,
}

impl ConstraintViolation {
    pub fn new(level: ViolationLevel) -> Self {
        Self {
            level,
            message: None,
            root: None,
            path: None,
            value: None,
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message.as_deref().unwrap_or("No message"))?;
        for term in [&self.root, &self.path, &self.value].into_iter().flatten() {
            write!(f, " {term}")?;
        }
        Ok(())
    }
}

/// Per-rule firing counters for the current run.
#[derive(Debug, Clone, Default)]
pub struct Executions {
    counts: HashMap<Term, usize>,
}

impl Executions {
    pub fn count(&self, rule: &Term) -> usize {
        self.counts.get(rule).copied().unwrap_or(0)
    }

    pub(crate) fn increment(&mut self, rule: &Term) {
        *self.counts.entry(rule.clone()).or_insert(0) += 1;
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}

/// Counters accumulated across inference runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceStats {
    /// Subjects processed by `apply_rules`.
    pub subjects: usize,
    pub rules_executed: usize,
    /// Rule firings skipped because the iteration cap was reached.
    pub rules_skipped: usize,
    pub constructors_executed: usize,
    pub constraints_checked: usize,
    /// Violations by level name.
    pub violations: HashMap<String, usize>,
    /// Subjects whose class hierarchy contained a cycle.
    pub class_cycles: usize,
    /// Rule-property orderings that contained a cycle.
    pub rule_cycles: usize,
    /// Statements added by rules and constructors.
    pub inferred: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(ViolationLevel::Info < ViolationLevel::Warning);
        assert!(!ViolationLevel::Warning.is_fatal());
        assert!(ViolationLevel::Error.is_fatal());
        assert!(ViolationLevel::Fatal.is_fatal());
        assert_eq!(ViolationLevel::from_iri(spin::FATAL), Some(ViolationLevel::Fatal));
        assert_eq!(ViolationLevel::from_iri("http://ex/Other"), None);
    }

    #[test]
    fn violation_display_defaults_message() {
        let mut v = ConstraintViolation::new(ViolationLevel::Warning);
        assert_eq!(v.to_string(), "WARNING: No message");
        v.message = Some("too big".into());
        v.root = Some(Term::iri("http://ex/w"));
        assert_eq!(v.to_string(), "WARNING: too big <http://ex/w>");
    }

    #[test]
    fn executions_count_per_rule() {
        let mut ex = Executions::default();
        let rule = Term::blank("r");
        ex.increment(&rule);
        ex.increment(&rule);
        assert_eq!(ex.count(&rule), 2);
        ex.reset();
        assert_eq!(ex.count(&rule), 0);
    }
}
