//! Rule-property declarations and their execution order.
//!
//! Rule properties are `spin:rule` and every property declared
//! `rdfs:subPropertyOf spin:rule`. `spin:nextRuleProperty` edges say which
//! properties must run later; ordering peels terminal properties (no
//! successor still remaining) into a reverse list, then reverses it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::{InferError, InferResult};
use crate::graph::source::FactSource;
use crate::graph::vocab::{rdfs, spin};
use crate::graph::{Iri, Term};

use super::RuleProperty;

/// Rule properties in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePropertyOrder {
    pub properties: Vec<RuleProperty>,
    /// Properties that could not be ordered because of a cycle, by IRI.
    pub cycle: Vec<Iri>,
}

/// Read every rule property declared in `source`.
pub fn parse_rule_properties(
    source: &dyn FactSource,
) -> InferResult<BTreeMap<Iri, RuleProperty>> {
    let mut uris = BTreeSet::from([Iri::new(spin::RULE)]);
    for sub in source.subjects(rdfs::SUB_PROPERTY_OF, &Term::iri(spin::RULE))? {
        if let Term::Iri(iri) = sub {
            uris.insert(iri);
        }
    }

    let mut properties = BTreeMap::new();
    for uri in uris {
        let resource = Term::Iri(uri.clone());
        let next_rules = source
            .objects(&resource, spin::NEXT_RULE_PROPERTY)?
            .into_iter()
            .filter_map(|t| t.as_iri().cloned())
            .collect();
        let cap = source.object(&resource, spin::RULE_PROPERTY_MAX_ITERATION_COUNT)?;
        let max_iteration_count = match cap {
            None => None,
            Some(term) => {
                let count = term
                    .as_literal()
                    .and_then(|l| l.as_i64())
                    .ok_or_else(|| InferError::Schema {
                        resource: uri.to_string(),
                        message: format!(
                            "rulePropertyMaxIterationCount must be an integer, found {term}"
                        ),
                    })?;
                // Negative counts (conventionally -1) mean unbounded.
                usize::try_from(count).ok()
            }
        };
        properties.insert(
            uri.clone(),
            RuleProperty {
                uri,
                next_rules,
                max_iteration_count,
            },
        );
    }
    Ok(properties)
}

/// Order rule properties so that every property runs before its next rules.
///
/// A property naming itself as its next rule is not a cycle. A real cycle
/// leaves properties that can never be peeled; they are placed ahead of the
/// peeled ones, by IRI, and reported in `cycle`.
pub fn order_rule_properties(mut properties: BTreeMap<Iri, RuleProperty>) -> RulePropertyOrder {
    let mut remaining: BTreeSet<Iri> = properties.keys().cloned().collect();
    let mut reverse = Vec::new();
    let mut cycle = Vec::new();

    while !remaining.is_empty() {
        let mut progressed = false;
        for uri in remaining.clone() {
            let terminal = properties.get(&uri).is_none_or(|p| {
                !p.next_rules
                    .iter()
                    .any(|n| n != &uri && remaining.contains(n))
            });
            if terminal {
                remaining.remove(&uri);
                reverse.push(uri);
                progressed = true;
            }
        }
        if !progressed {
            cycle = remaining.iter().cloned().collect();
            reverse.extend(remaining.iter().rev().cloned());
            break;
        }
    }

    reverse.reverse();
    RulePropertyOrder {
        properties: reverse
            .into_iter()
            .filter_map(|uri| properties.remove(&uri))
            .collect(),
        cycle,
    }
}

/// Lazily built rule-property order, reset when declarations change.
pub struct RulePropertyCache {
    order: RwLock<Option<Arc<RulePropertyOrder>>>,
}

impl RulePropertyCache {
    pub fn new() -> Self {
        Self {
            order: RwLock::new(None),
        }
    }

    /// The cached order, building it if needed. The flag is `true` when the
    /// order was built by this call.
    pub fn get_or_build(
        &self,
        source: &dyn FactSource,
    ) -> InferResult<(Arc<RulePropertyOrder>, bool)> {
        if let Some(order) = self.order.read().expect("rule cache lock poisoned").as_ref() {
            return Ok((Arc::clone(order), false));
        }
        let order = Arc::new(order_rule_properties(parse_rule_properties(source)?));
        if !order.cycle.is_empty() {
            tracing::warn!(cycle = ?order.cycle, "cycle detected in rule properties");
        }
        tracing::debug!(count = order.properties.len(), "built rule-property order");
        *self.order.write().expect("rule cache lock poisoned") = Some(Arc::clone(&order));
        Ok((order, true))
    }

    pub fn reset(&self) {
        *self.order.write().expect("rule cache lock poisoned") = None;
    }

    pub fn is_cached(&self) -> bool {
        self.order.read().expect("rule cache lock poisoned").is_some()
    }
}

impl Default for RulePropertyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::MemoryGraph;
    use crate::graph::{Literal, Statement};

    fn ex(local: &str) -> Iri {
        Iri::new(format!("http://example.org/{local}"))
    }

    fn rule_property(local: &str) -> Statement {
        Statement::new(Term::Iri(ex(local)), rdfs::SUB_PROPERTY_OF, Term::iri(spin::RULE))
    }

    fn next(from: &str, to: &str) -> Statement {
        Statement::new(Term::Iri(ex(from)), spin::NEXT_RULE_PROPERTY, Term::Iri(ex(to)))
    }

    fn order_of(facts: MemoryGraph) -> RulePropertyOrder {
        order_rule_properties(parse_rule_properties(&facts).unwrap())
    }

    fn local_names(order: &RulePropertyOrder) -> Vec<&str> {
        order.properties.iter().map(|p| p.uri.local_name()).collect()
    }

    #[test]
    fn next_rules_run_later() {
        let order = order_of(MemoryGraph::from_statements([
            rule_property("a"),
            rule_property("b"),
            rule_property("c"),
            next("a", "b"),
            next("b", "c"),
        ]));
        assert!(order.cycle.is_empty());
        // `rule` and `c` peel together in the first pass.
        assert_eq!(local_names(&order), vec!["a", "b", "rule", "c"]);
    }

    #[test]
    fn cycle_is_appended_in_stable_order() {
        let order = order_of(MemoryGraph::from_statements([
            rule_property("a"),
            rule_property("b"),
            rule_property("z"),
            next("a", "b"),
            next("b", "a"),
            next("b", "z"),
        ]));
        assert_eq!(order.cycle, vec![ex("a"), ex("b")]);
        assert_eq!(local_names(&order), vec!["a", "b", "rule", "z"]);
        // Deterministic across runs.
        let again = order_of(MemoryGraph::from_statements([
            rule_property("z"),
            rule_property("b"),
            rule_property("a"),
            next("b", "z"),
            next("b", "a"),
            next("a", "b"),
        ]));
        assert_eq!(again, order);
    }

    #[test]
    fn self_next_rule_is_not_a_cycle() {
        let order = order_of(MemoryGraph::from_statements([
            rule_property("a"),
            rule_property("b"),
            next("a", "a"),
            next("a", "b"),
        ]));
        assert!(order.cycle.is_empty());
        assert_eq!(local_names(&order), vec!["a", "rule", "b"]);
    }

    #[test]
    fn max_iteration_count_parsing() {
        let props = parse_rule_properties(&MemoryGraph::from_statements([
            rule_property("capped"),
            rule_property("open"),
            Statement::new(
                Term::Iri(ex("capped")),
                spin::RULE_PROPERTY_MAX_ITERATION_COUNT,
                Term::Literal(Literal::integer(2)),
            ),
            Statement::new(
                Term::Iri(ex("open")),
                spin::RULE_PROPERTY_MAX_ITERATION_COUNT,
                Term::Literal(Literal::integer(-1)),
            ),
        ]))
        .unwrap();
        assert_eq!(props[&ex("capped")].max_iteration_count, Some(2));
        assert_eq!(props[&ex("open")].max_iteration_count, None);
        assert_eq!(props[&Iri::new(spin::RULE)].max_iteration_count, None);
    }

    #[test]
    fn non_integer_cap_is_a_schema_error() {
        let err = parse_rule_properties(&MemoryGraph::from_statements([
            rule_property("bad"),
            Statement::new(
                Term::Iri(ex("bad")),
                spin::RULE_PROPERTY_MAX_ITERATION_COUNT,
                Term::string("many"),
            ),
        ]))
        .unwrap_err();
        assert!(matches!(err, InferError::Schema { .. }));
    }

    #[test]
    fn cache_builds_once_until_reset() {
        let facts = MemoryGraph::from_statements([rule_property("a")]);
        let cache = RulePropertyCache::new();
        let (first, built) = cache.get_or_build(&facts).unwrap();
        assert!(built);
        let (second, built) = cache.get_or_build(&facts).unwrap();
        assert!(!built);
        assert!(Arc::ptr_eq(&first, &second));
        cache.reset();
        assert!(!cache.is_cached());
    }
}
