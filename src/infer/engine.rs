//! The SPIN inferencer: rules, constructors and constraints per subject.
//!
//! [`SpinInferencer::apply_rules`] handles one batch of changed statements;
//! [`SpinInferencer::infer`] drives batches to a fixpoint.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BodyFailure, InferError, InferResult, QueryError, ResolveError};
use crate::function::DefinitionParser;
use crate::graph::connection::Connection;
use crate::graph::source::{FactSource, QueryEvaluator, QueryOutcome};
use crate::graph::vocab::{rdf, rdfs, spin, spl};
use crate::graph::{Iri, Statement, Term};

use super::{
    ClassHierarchyCache, ConstraintViolation, Executions, InferenceStats, RulePropertyCache,
    ViolationLevel,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the inferencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferencerConfig {
    /// Check `spin:constraint`s after rules and constructors (default: true).
    pub validate_constraints: bool,
}

impl Default for InferencerConfig {
    fn default() -> Self {
        Self {
            validate_constraints: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Inferencer
// ---------------------------------------------------------------------------

/// Forward-chaining SPIN inferencer over a notifying connection.
pub struct SpinInferencer {
    config: InferencerConfig,
    connection: Arc<Connection>,
    evaluator: Arc<dyn QueryEvaluator>,
    parser: Arc<DefinitionParser>,
    hierarchy: Arc<ClassHierarchyCache>,
    rule_properties: Arc<RulePropertyCache>,
    executions: Executions,
    stats: InferenceStats,
}

impl SpinInferencer {
    pub fn new(
        config: InferencerConfig,
        connection: Arc<Connection>,
        evaluator: Arc<dyn QueryEvaluator>,
        parser: Arc<DefinitionParser>,
        hierarchy: Arc<ClassHierarchyCache>,
        rule_properties: Arc<RulePropertyCache>,
    ) -> Self {
        Self {
            config,
            connection,
            evaluator,
            parser,
            hierarchy,
            rule_properties,
            executions: Executions::default(),
            stats: InferenceStats::default(),
        }
    }

    pub fn config(&self) -> &InferencerConfig {
        &self.config
    }

    /// Rule firings in the current run.
    pub fn executions(&self) -> &Executions {
        &self.executions
    }

    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }

    /// Run to a fixpoint: apply rules to every batch of new statements until
    /// a round adds nothing. Returns the number of statements inferred.
    pub fn infer(&mut self) -> InferResult<usize> {
        self.executions.reset();
        let mut total = 0;
        let mut rounds = 0;
        loop {
            let batch = self.connection.take_batch();
            if batch.is_empty() {
                break;
            }
            rounds += 1;

            self.connection.begin()?;
            let result = self.apply_rules(&batch);
            self.connection.commit()?;

            match result {
                Ok(n) => {
                    tracing::debug!(
                        round = rounds,
                        changed = batch.len(),
                        inferred = n,
                        "inference round"
                    );
                    total += n;
                }
                Err(InferError::Aborted { inferred, failures }) => {
                    return Err(InferError::Aborted {
                        inferred: total + inferred,
                        failures,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(rounds, inferred = total, "inference complete");
        Ok(total)
    }

    /// Apply rules, constructors and constraints to every resource touched
    /// by `changed`: subjects first, then resource objects.
    ///
    /// Subject-scoped failures stop that subject only and are reported
    /// together as [`InferError::Aborted`]; store and schema failures abort
    /// immediately.
    pub fn apply_rules(&mut self, changed: &[Statement]) -> InferResult<usize> {
        let mut seen = HashSet::new();
        let subjects = changed.iter().map(|st| &st.subject);
        let objects = changed.iter().map(|st| &st.object).filter(|o| o.is_resource());
        let resources: Vec<Term> = subjects
            .chain(objects)
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect();

        let mut inferred = 0;
        let mut failures = Vec::new();
        for subject in &resources {
            self.stats.subjects += 1;
            match self.infer_subject(subject) {
                Ok(n) => inferred += n,
                Err(e) if e.is_subject_scoped() => {
                    if matches!(e, InferError::Body { .. }) {
                        tracing::warn!(subject = %subject, error = %e, "subject inference stopped");
                    }
                    failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        if failures.is_empty() {
            Ok(inferred)
        } else {
            Err(InferError::Aborted { inferred, failures })
        }
    }

    fn infer_subject(&mut self, subject: &Term) -> InferResult<usize> {
        let classes: Vec<Iri> = self
            .connection
            .objects(subject, rdf::TYPE)?
            .into_iter()
            .filter_map(|t| t.as_iri().cloned())
            .collect();
        if classes.is_empty() {
            return Ok(0);
        }

        let order = self.hierarchy.order_classes(&classes, self.connection.as_ref())?;
        if !order.cycle.is_empty() {
            tracing::warn!(
                subject = %subject,
                cycle = ?order.cycle,
                "cycle detected in class hierarchy"
            );
            self.stats.class_cycles += 1;
        }

        let mut inferred = self.execute_rules(subject, &order.classes)?;
        self.connection.flush()?;
        inferred += self.execute_constructors(subject, &order.classes)?;
        self.connection.flush()?;
        if self.config.validate_constraints {
            self.check_constraints(subject, &order.classes)?;
        }
        Ok(inferred)
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    fn execute_rules(&mut self, subject: &Term, classes: &[Iri]) -> InferResult<usize> {
        let (order, built) = self.rule_properties.get_or_build(self.connection.as_ref())?;
        if built && !order.cycle.is_empty() {
            self.stats.rule_cycles += 1;
        }

        let mut inferred = 0;
        for class in classes {
            for property in &order.properties {
                for rule in self.rules_for(class, &property.uri)? {
                    if let Some(max) = property.max_iteration_count {
                        if self.executions.count(&rule) >= max {
                            tracing::debug!(rule = %rule, max, "rule reached its iteration cap");
                            self.stats.rules_skipped += 1;
                            continue;
                        }
                    }
                    self.executions.increment(&rule);
                    self.stats.rules_executed += 1;

                    match self.run_body(subject, Some(class), &rule)? {
                        None => {}
                        Some(QueryOutcome::Graph(statements)) => {
                            inferred += self.add_inferred(&statements)?
                        }
                        Some(other) => {
                            return Err(body_error(
                                subject,
                                Some(class),
                                &rule,
                                BodyFailure::WrongForm {
                                    expected: "CONSTRUCT",
                                    actual: other.form(),
                                },
                            ));
                        }
                    }
                }
            }
        }
        Ok(inferred)
    }

    /// Rules attached to `class` by `property`: uncommented rules first,
    /// then by highest `rdfs:comment`.
    fn rules_for(&self, class: &Iri, property: &Iri) -> InferResult<Vec<Term>> {
        let rules = self.connection.objects(&Term::Iri(class.clone()), property.as_str())?;
        let mut keyed = Vec::with_capacity(rules.len());
        for rule in rules {
            let comment = if rule.is_resource() {
                self.connection
                    .objects(&rule, rdfs::COMMENT)?
                    .into_iter()
                    .filter_map(|c| c.as_literal().map(|l| l.lexical.clone()))
                    .max()
            } else {
                None
            };
            keyed.push((comment, rule));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, rule)| rule).collect())
    }

    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    fn execute_constructors(&mut self, subject: &Term, classes: &[Iri]) -> InferResult<usize> {
        let executed = Iri::new(spin::EXECUTED);
        let mut inferred = 0;
        for class in classes {
            let constructors = self
                .connection
                .objects(&Term::Iri(class.clone()), spin::CONSTRUCTOR)?;
            for constructor in constructors {
                if self
                    .connection
                    .contains(Some(subject), Some(&executed), Some(&constructor))?
                {
                    continue;
                }
                self.stats.constructors_executed += 1;

                match self.run_body(subject, Some(class), &constructor)? {
                    None => continue,
                    Some(QueryOutcome::Graph(statements)) => {
                        inferred += self.add_inferred(&statements)?
                    }
                    Some(other) => {
                        return Err(body_error(
                            subject,
                            Some(class),
                            &constructor,
                            BodyFailure::WrongForm {
                                expected: "CONSTRUCT",
                                actual: other.form(),
                            },
                        ));
                    }
                }
                self.connection
                    .insert(&Statement::new(subject.clone(), executed.clone(), constructor))?;
            }
        }
        Ok(inferred)
    }

    // -----------------------------------------------------------------------
    // Constraints
    // -----------------------------------------------------------------------

    fn check_constraints(&mut self, subject: &Term, classes: &[Iri]) -> InferResult<()> {
        for class in classes {
            let constraints = self
                .connection
                .objects(&Term::Iri(class.clone()), spin::CONSTRAINT)?;
            for constraint in constraints {
                if constraint.is_resource()
                    && self
                        .parser
                        .is_instance_of(&constraint, spl::ARGUMENT, self.connection.as_ref())?
                {
                    continue;
                }
                self.stats.constraints_checked += 1;

                let violations = match self.run_body(subject, Some(class), &constraint)? {
                    None | Some(QueryOutcome::Boolean(false)) => Vec::new(),
                    Some(QueryOutcome::Boolean(true)) => {
                        let mut violation = ConstraintViolation::new(ViolationLevel::Error);
                        violation.message = self.describe(&constraint)?;
                        violation.root = Some(subject.clone());
                        vec![violation]
                    }
                    Some(QueryOutcome::Graph(statements)) => violations_in(&statements)
                        .map_err(|f| body_error(subject, Some(class), &constraint, f))?,
                    Some(other) => {
                        return Err(body_error(
                            subject,
                            Some(class),
                            &constraint,
                            BodyFailure::WrongForm {
                                expected: "ASK or CONSTRUCT",
                                actual: other.form(),
                            },
                        ));
                    }
                };

                for violation in violations {
                    self.report(subject, class, violation)?;
                }
            }
        }
        Ok(())
    }

    /// Message for an ASK constraint: its comment, else its label.
    fn describe(&self, constraint: &Term) -> InferResult<Option<String>> {
        if !constraint.is_resource() {
            return Ok(None);
        }
        for predicate in [rdfs::COMMENT, rdfs::LABEL] {
            if let Some(Term::Literal(lit)) = self.connection.object(constraint, predicate)? {
                return Ok(Some(lit.lexical));
            }
        }
        Ok(None)
    }

    fn report(
        &mut self,
        subject: &Term,
        class: &Iri,
        violation: ConstraintViolation,
    ) -> InferResult<()> {
        *self
            .stats
            .violations
            .entry(violation.level.to_string())
            .or_default() += 1;
        match violation.level {
            ViolationLevel::Info => {
                tracing::info!(target: "spinfer::constraint", %subject, %class, "{violation}")
            }
            ViolationLevel::Warning => {
                tracing::warn!(target: "spinfer::constraint", %subject, %class, "{violation}")
            }
            ViolationLevel::Error | ViolationLevel::Fatal => {
                tracing::error!(target: "spinfer::constraint", %subject, %class, "{violation}")
            }
        }
        if violation.level.is_fatal() {
            return Err(InferError::ConstraintViolated {
                subject: subject.clone(),
                class: Term::Iri(class.clone()),
                violation,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bodies
    // -----------------------------------------------------------------------

    /// Evaluate a stored body with `?this` bound to `subject`. `None` when the
    /// evaluator cannot bind the subject.
    fn run_body(
        &self,
        subject: &Term,
        class: Option<&Iri>,
        body: &Term,
    ) -> InferResult<Option<QueryOutcome>> {
        let text = match self.parser.query_text(body, self.connection.as_ref()) {
            Ok(text) => text,
            Err(ResolveError::Store(e)) => return Err(InferError::Store(e)),
            Err(e) => return Err(body_error(subject, class, body, e.into())),
        };
        match self.evaluator.evaluate(&text, subject) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(QueryError::Unbindable { term }) => {
                tracing::warn!(body = %body, term, "skipping body: ?this cannot be bound");
                Ok(None)
            }
            Err(QueryError::Store(e)) => Err(InferError::Store(e)),
            Err(e) => Err(body_error(subject, class, body, e.into())),
        }
    }

    fn add_inferred(&mut self, statements: &[Statement]) -> InferResult<usize> {
        let mut added = 0;
        for statement in statements {
            if self.connection.insert(statement)? {
                added += 1;
            }
        }
        self.stats.inferred += added;
        Ok(added)
    }
}

fn body_error(subject: &Term, class: Option<&Iri>, body: &Term, source: BodyFailure) -> InferError {
    InferError::Body {
        subject: subject.clone(),
        class: class.map(|c| Term::Iri(c.clone())),
        body: body.clone(),
        source,
    }
}

/// Every `spin:ConstraintViolation` described in a CONSTRUCT result.
fn violations_in(statements: &[Statement]) -> Result<Vec<ConstraintViolation>, BodyFailure> {
    let value = |resource: &Term, predicate: &str| {
        statements
            .iter()
            .find(|st| st.subject == *resource && st.predicate.as_str() == predicate)
            .map(|st| st.object.clone())
    };

    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for st in statements {
        if st.predicate.as_str() != rdf::TYPE || !st.object.is(spin::CONSTRAINT_VIOLATION) {
            continue;
        }
        let resource = &st.subject;
        if !seen.insert(resource) {
            continue;
        }

        let level = match value(resource, spin::VIOLATION_LEVEL) {
            None => ViolationLevel::Error,
            Some(Term::Iri(iri)) => ViolationLevel::from_iri(iri.as_str()).ok_or_else(|| {
                BodyFailure::MalformedViolation {
                    message: format!("unknown violation level {iri}"),
                }
            })?,
            Some(other) => {
                return Err(BodyFailure::MalformedViolation {
                    message: format!("violation level must be an IRI, found {other}"),
                });
            }
        };

        let mut violation = ConstraintViolation::new(level);
        violation.message = value(resource, rdfs::LABEL)
            .and_then(|t| t.as_literal().map(|l| l.lexical.clone()));
        violation.root = value(resource, spin::VIOLATION_ROOT);
        violation.path = value(resource, spin::VIOLATION_PATH);
        violation.value = value(resource, spin::VIOLATION_VALUE);
        violations.push(violation);
    }
    Ok(violations)
}
