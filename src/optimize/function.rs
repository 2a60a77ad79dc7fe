//! Function resolution: registers stored `spin:Function` definitions for
//! every unregistered function call in the tree.

use crate::algebra::visitor::{QueryModelVisitor, visit, visit_children};
use crate::algebra::{BindingSet, Dataset, Node, NodeId, QueryModel};
use crate::error::AlgebraError;
use crate::function::{DefinitionParser, FunctionRegistry};
use crate::graph::source::FactSource;

use super::QueryOptimizer;

/// Resolves unregistered function calls against the fact source.
pub struct FunctionResolver<'a> {
    parser: &'a DefinitionParser,
    source: &'a dyn FactSource,
    registry: &'a FunctionRegistry,
}

impl<'a> FunctionResolver<'a> {
    pub fn new(
        parser: &'a DefinitionParser,
        source: &'a dyn FactSource,
        registry: &'a FunctionRegistry,
    ) -> Self {
        Self {
            parser,
            source,
            registry,
        }
    }

    fn resolve(&self, uri: &str) {
        match self.parser.is_function(uri, self.source) {
            Ok(true) => match self.parser.parse_function(uri, self.source) {
                Ok(def) => {
                    self.registry.add(def);
                }
                Err(e) => tracing::warn!(uri, error = %e, "failed to parse function definition"),
            },
            Ok(false) => tracing::trace!(uri, "not a stored function"),
            Err(e) => tracing::warn!(uri, error = %e, "function lookup failed"),
        }
    }
}

impl QueryOptimizer for FunctionResolver<'_> {
    fn optimize(&self, model: &mut QueryModel, _dataset: Option<&Dataset>, _bindings: &BindingSet) {
        let Some(root) = model.root() else {
            return;
        };
        let mut scanner = FunctionScanner { resolver: self };
        if let Err(e) = visit(model, root, &mut scanner) {
            tracing::warn!(error = %e, "function resolution stopped early");
        }
    }
}

struct FunctionScanner<'r, 'a> {
    resolver: &'r FunctionResolver<'a>,
}

impl QueryModelVisitor for FunctionScanner<'_, '_> {
    type Error = AlgebraError;

    fn meet_function_call(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), AlgebraError> {
        if let Node::FunctionCall { uri, .. } = model.node(id)? {
            if !self.resolver.registry.has(uri) {
                let uri = uri.clone();
                self.resolver.resolve(&uri);
            }
        }
        visit_children(model, id, self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::StoreResult;
    use crate::graph::index::MemoryGraph;
    use crate::graph::source::Statements;
    use crate::graph::vocab::{rdf, sp, spin};
    use crate::graph::{Iri, Statement, Term};

    /// Counts pattern lookups on top of an in-memory graph.
    struct CountingSource {
        inner: MemoryGraph,
        lookups: AtomicUsize,
    }

    impl FactSource for CountingSource {
        fn statements(
            &self,
            s: Option<&Term>,
            p: Option<&Iri>,
            o: Option<&Term>,
        ) -> StoreResult<Statements<'_>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.inner.statements(s, p, o)
        }
        fn insert(&self, st: &Statement) -> StoreResult<bool> {
            self.inner.insert(st)
        }
        fn remove(&self, st: &Statement) -> StoreResult<bool> {
            self.inner.remove(st)
        }
    }

    fn source() -> CountingSource {
        let double = Term::iri("http://ex/double");
        let function = Term::iri(spin::FUNCTION_CLASS);
        CountingSource {
            inner: MemoryGraph::from_statements([
                Statement::new(double.clone(), rdf::TYPE, function.clone()),
                Statement::new(double, spin::BODY, Term::blank("b")),
                Statement::new(
                    Term::blank("b"),
                    sp::TEXT,
                    Term::string("SELECT (2 * ?arg1 AS ?r) WHERE {}"),
                ),
                // Declared but without a body: parse fails.
                Statement::new(Term::iri("http://ex/broken"), rdf::TYPE, function),
            ]),
            lookups: AtomicUsize::new(0),
        }
    }

    fn model_with_calls(uris: &[&str]) -> QueryModel {
        let mut m = QueryModel::new();
        let s = m.var_node("s");
        let p = m.var_node("p");
        let o = m.var_node("o");
        let mut body = m.pattern(s, p, o);
        for uri in uris {
            let x = m.var_node("o");
            let call = m.function_call(*uri, vec![x]);
            body = m.filter(body, call);
        }
        m.set_root(body);
        m
    }

    #[test]
    fn registers_stored_function() {
        let src = source();
        let parser = DefinitionParser::new();
        let registry = FunctionRegistry::new();
        let mut model = model_with_calls(&["http://ex/double"]);

        FunctionResolver::new(&parser, &src, &registry).optimize(
            &mut model,
            None,
            &BindingSet::new(),
        );

        let def = registry.get("http://ex/double").unwrap();
        assert!(def.body.as_deref().unwrap().contains("2 * ?arg1"));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let src = source();
        let parser = DefinitionParser::new();
        let registry = FunctionRegistry::new();
        let mut model = model_with_calls(&["http://ex/double"]);
        let resolver = FunctionResolver::new(&parser, &src, &registry);

        resolver.optimize(&mut model, None, &BindingSet::new());
        let root = model.root().unwrap();
        let tree = model.display(root).to_string();
        let lookups = src.lookups.load(Ordering::Relaxed);

        resolver.optimize(&mut model, None, &BindingSet::new());
        assert_eq!(model.display(root).to_string(), tree);
        assert_eq!(registry.len(), 1);
        assert_eq!(src.lookups.load(Ordering::Relaxed), lookups);
    }

    #[test]
    fn failures_are_logged_and_skipped() {
        let src = source();
        let parser = DefinitionParser::new();
        let registry = FunctionRegistry::new();
        let mut model =
            model_with_calls(&["http://ex/broken", "http://ex/unknown", "http://ex/double"]);
        let root = model.root().unwrap();
        let before = model.display(root).to_string();

        FunctionResolver::new(&parser, &src, &registry).optimize(
            &mut model,
            None,
            &BindingSet::new(),
        );

        assert_eq!(registry.uris(), vec!["http://ex/double".to_string()]);
        assert_eq!(model.display(root).to_string(), before);
    }

    #[test]
    fn registered_functions_are_not_looked_up() {
        let src = source();
        let parser = DefinitionParser::new();
        let registry = FunctionRegistry::with_standard_functions();
        let mut model = model_with_calls(&["http://www.w3.org/2005/xpath-functions#concat"]);

        FunctionResolver::new(&parser, &src, &registry).optimize(
            &mut model,
            None,
            &BindingSet::new(),
        );
        assert_eq!(src.lookups.load(Ordering::Relaxed), 0);
    }
}
