//! Cache invalidation driven by statement changes.

use std::sync::Arc;

use crate::function::{DefinitionParser, FunctionRegistry, TupleFunctionRegistry};
use crate::graph::source::StatementListener;
use crate::graph::vocab::{rdfs, spin};
use crate::graph::{Statement, Term};

use super::{ClassHierarchyCache, RulePropertyCache};

/// Resets schema caches and evicts transient definitions whose backing
/// facts changed.
pub struct SchemaListener {
    hierarchy: Arc<ClassHierarchyCache>,
    rule_properties: Arc<RulePropertyCache>,
    parser: Arc<DefinitionParser>,
    functions: Arc<FunctionRegistry>,
    tuple_functions: Arc<TupleFunctionRegistry>,
}

impl SchemaListener {
    pub fn new(
        hierarchy: Arc<ClassHierarchyCache>,
        rule_properties: Arc<RulePropertyCache>,
        parser: Arc<DefinitionParser>,
        functions: Arc<FunctionRegistry>,
        tuple_functions: Arc<TupleFunctionRegistry>,
    ) -> Self {
        Self {
            hierarchy,
            rule_properties,
            parser,
            functions,
            tuple_functions,
        }
    }

    fn changed(&self, statement: &Statement, added: bool) {
        let predicate = statement.predicate.as_str();

        // Literal superclasses never enter the hierarchy, so only their
        // removal can matter.
        if predicate == rdfs::SUB_CLASS_OF && (!added || statement.object.is_resource()) {
            self.hierarchy.reset();
        }

        let declares_rule_property =
            predicate == rdfs::SUB_PROPERTY_OF && statement.object.is(spin::RULE);
        if declares_rule_property
            || predicate == spin::NEXT_RULE_PROPERTY
            || predicate == spin::RULE_PROPERTY_MAX_ITERATION_COUNT
        {
            self.rule_properties.reset();
        }

        self.parser.reset(&statement.subject);
        if let Term::Iri(iri) = &statement.subject {
            let evicted_fn = self.functions.remove_transient(iri.as_str()).is_some();
            let evicted_tf = self.tuple_functions.remove_transient(iri.as_str()).is_some();
            if evicted_fn || evicted_tf {
                tracing::debug!(uri = %iri, "evicted transient definition");
            }
        }
    }
}

impl StatementListener for SchemaListener {
    fn statement_added(&self, statement: &Statement) {
        self.changed(statement, true);
    }

    fn statement_removed(&self, statement: &Statement) {
        self.changed(statement, false);
    }
}
