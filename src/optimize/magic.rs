//! Magic-property rewriting.
//!
//! A statement pattern whose predicate is a registered (or stored)
//! magic property is replaced by
//!
//! ```text
//! Union
//!    Join(pattern, list patterns...)      -- plain triple interpretation
//!    TupleFunctionCall | Service(call)    -- function interpretation
//! ```
//!
//! RDF lists (`rdf:first`/`rdf:rest` chains ending in `rdf:nil`) bound to the
//! pattern's object become the call's positional arguments; the subject side
//! becomes its result variables. Inverse definitions swap the two sides.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::algebra::visitor::{QueryModelVisitor, visit, visit_children};
use crate::algebra::{BindingSet, Dataset, Node, NodeId, NodeKind, QueryModel};
use crate::error::{AlgebraError, AlgebraResult};
use crate::function::{DefinitionParser, TupleFunctionDef, TupleFunctionRegistry};
use crate::graph::source::FactSource;
use crate::graph::vocab::{rdf, sp, spin, spl};
use crate::graph::Term;

use super::{EvaluationMode, QueryOptimizer};

/// subject variable name → predicate IRI → plain patterns.
type PatternIndex = HashMap<String, HashMap<String, Vec<NodeId>>>;

/// Rewrites magic-property patterns into tuple-function calls.
pub struct MagicPropertyRewriter<'a> {
    parser: &'a DefinitionParser,
    source: &'a dyn FactSource,
    registry: &'a TupleFunctionRegistry,
    mode: EvaluationMode,
}

/// One side of a magic pattern: a reconstructed list or a single term.
struct ArgList {
    items: Vec<NodeId>,
    /// `rdf:first`/`rdf:rest` patterns the list was read from.
    patterns: Vec<NodeId>,
    is_list: bool,
}

impl<'a> MagicPropertyRewriter<'a> {
    pub fn new(
        parser: &'a DefinitionParser,
        source: &'a dyn FactSource,
        registry: &'a TupleFunctionRegistry,
        mode: EvaluationMode,
    ) -> Self {
        Self {
            parser,
            source,
            registry,
            mode,
        }
    }

    /// The magic-property definition for `uri`, registering a stored one on
    /// first use.
    fn lookup(&self, uri: &str) -> Option<Arc<TupleFunctionDef>> {
        if let Some(def) = self.registry.get(uri) {
            return Some(def);
        }
        match self.parser.is_magic_property(uri, self.source) {
            Ok(true) => match self.parser.parse_magic_property(uri, self.source) {
                Ok(def) => Some(self.registry.add(def)),
                Err(e) => {
                    tracing::warn!(uri, error = %e, "failed to parse magic property");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(uri, error = %e, "magic property lookup failed");
                None
            }
        }
    }

    /// Rewrite every magic pattern of one basic graph pattern.
    fn process_bgp(&self, model: &mut QueryModel, patterns: Vec<NodeId>) -> AlgebraResult<()> {
        let mut index = PatternIndex::new();
        let mut magic = Vec::new();
        for pattern in patterns {
            let Node::StatementPattern {
                subject, predicate, ..
            } = model.node(pattern)?
            else {
                continue;
            };
            let Some(predicate_iri) = model
                .var(*predicate)
                .and_then(|v| v.value.as_ref())
                .and_then(Term::as_iri)
                .map(|iri| iri.as_str().to_string())
            else {
                continue;
            };
            let subject_name = model.var(*subject).map(|v| v.name.clone());
            match self.lookup(&predicate_iri) {
                Some(def) => magic.push((pattern, def)),
                None => {
                    if let Some(name) = subject_name {
                        index
                            .entry(name)
                            .or_default()
                            .entry(predicate_iri)
                            .or_default()
                            .push(pattern);
                    }
                }
            }
        }

        for (pattern, def) in magic {
            if model.parent(pattern).is_some() {
                self.rewrite(model, pattern, &def, &mut index)?;
            }
        }
        Ok(())
    }

    fn rewrite(
        &self,
        model: &mut QueryModel,
        pattern: NodeId,
        def: &TupleFunctionDef,
        index: &mut PatternIndex,
    ) -> AlgebraResult<()> {
        let Node::StatementPattern {
            subject, object, ..
        } = model.node(pattern)?
        else {
            return Ok(());
        };
        let (subject, object) = (*subject, *object);
        let subjects = collect_list(model, subject, index);
        let objects = collect_list(model, object, index);

        let expression = render_expression(model, &def.uri, &subjects, &objects);
        let subject_args = clone_all(model, &subjects.items)?;
        let object_args = clone_all(model, &objects.items)?;
        // Arguments come from the object side, results bind on the subject
        // side; inverse properties swap the two.
        let (args, result_vars) = if def.inverse {
            (subject_args, object_args)
        } else {
            (object_args, subject_args)
        };
        let call = model.add(Node::TupleFunctionCall {
            uri: def.uri.clone(),
            args,
            result_vars,
        });
        let right = match self.mode {
            EvaluationMode::Native => call,
            EvaluationMode::Service => {
                let service_ref = model.constant(Term::iri(spin::TUPLE_FUNCTION_SERVICE));
                model.add(Node::Service {
                    service_ref,
                    arg: call,
                    expression,
                    prefixes: service_prefixes(),
                    base: None,
                    silent: false,
                })
            }
        };

        // Pull the pattern and its list patterns out of the BGP, leaving
        // join-neutral SingletonSets behind.
        let hole = model.add(Node::SingletonSet);
        model.replace_with(pattern, Some(hole))?;
        let mut left = pattern;
        let mut folded = HashSet::new();
        for &list_pattern in subjects.patterns.iter().chain(&objects.patterns) {
            if !folded.insert(list_pattern) {
                continue;
            }
            let filler = model.add(Node::SingletonSet);
            model.replace_with(list_pattern, Some(filler))?;
            left = model.join(left, list_pattern);
        }
        for by_predicate in index.values_mut() {
            for patterns in by_predicate.values_mut() {
                patterns.retain(|p| !folded.contains(p));
            }
        }

        let union = model.union(left, right);
        model.substitute(hole, union)?;
        tracing::debug!(
            uri = %def.uri,
            inverse = def.inverse,
            mode = ?self.mode,
            "rewrote magic property"
        );
        Ok(())
    }
}

impl QueryOptimizer for MagicPropertyRewriter<'_> {
    fn optimize(&self, model: &mut QueryModel, _dataset: Option<&Dataset>, _bindings: &BindingSet) {
        let Some(root) = model.root() else {
            return;
        };
        let mut scanner = PropertyScanner { rewriter: self };
        if let Err(e) = visit(model, root, &mut scanner) {
            tracing::warn!(error = %e, "magic property rewriting stopped early");
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Outer scanner: finds basic graph patterns.
struct PropertyScanner<'r, 'a> {
    rewriter: &'r MagicPropertyRewriter<'a>,
}

impl QueryModelVisitor for PropertyScanner<'_, '_> {
    type Error = AlgebraError;

    fn meet_join(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), AlgebraError> {
        let mut collector = BgpCollector {
            scanner: &mut *self,
            patterns: Vec::new(),
        };
        visit_children(model, id, &mut collector)?;
        let patterns = collector.patterns;
        self.rewriter.process_bgp(model, patterns)
    }

    fn meet_statement_pattern(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), AlgebraError> {
        self.rewriter.process_bgp(model, vec![id])
    }

    fn meet_union(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), AlgebraError> {
        if is_expansion(model, id) {
            return Ok(());
        }
        visit_children(model, id, self)
    }
}

/// Collects the patterns of one BGP; everything that is not a plain join or
/// a pattern goes back to the outer scanner.
struct BgpCollector<'s, 'r, 'a> {
    scanner: &'s mut PropertyScanner<'r, 'a>,
    patterns: Vec<NodeId>,
}

impl QueryModelVisitor for BgpCollector<'_, '_, '_> {
    type Error = AlgebraError;

    fn meet_join(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), AlgebraError> {
        visit_children(model, id, self)
    }

    fn meet_statement_pattern(
        &mut self,
        _: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), AlgebraError> {
        self.patterns.push(id);
        Ok(())
    }

    fn meet_node(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), AlgebraError> {
        visit(model, id, &mut *self.scanner)
    }
}

/// Whether `id` is a union produced by this pass.
fn is_expansion(model: &QueryModel, id: NodeId) -> bool {
    let Some(Node::Union { right, .. }) = model.get(id) else {
        return false;
    };
    match model.get(*right) {
        Some(Node::TupleFunctionCall { .. }) => true,
        Some(Node::Service { service_ref, .. }) => model
            .var(*service_ref)
            .is_some_and(|v| v.is_bound_to(spin::TUPLE_FUNCTION_SERVICE)),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// List reconstruction
// ---------------------------------------------------------------------------

/// The list headed by `head`, or `head` itself as a single argument.
fn collect_list(model: &QueryModel, head: NodeId, index: &PatternIndex) -> ArgList {
    walk_list(model, head, index).unwrap_or(ArgList {
        items: vec![head],
        patterns: Vec::new(),
        is_list: false,
    })
}

/// Follow `rdf:first`/`rdf:rest` links from `head` to `rdf:nil`.
///
/// Each list node must have exactly one `rdf:first` and one `rdf:rest`
/// pattern. Nothing is mutated; `None` means the chain is not a list.
fn walk_list(model: &QueryModel, head: NodeId, index: &PatternIndex) -> Option<ArgList> {
    let mut items = Vec::new();
    let mut patterns = Vec::new();
    let mut seen = HashSet::new();
    let mut current = model.var(head)?;
    while !current.is_bound_to(rdf::NIL) {
        if !seen.insert(current.name.clone()) {
            return None;
        }
        let by_predicate = index.get(&current.name)?;
        let first = single(by_predicate.get(rdf::FIRST))?;
        let rest = single(by_predicate.get(rdf::REST))?;
        let Node::StatementPattern { object: value, .. } = model.get(first)? else {
            return None;
        };
        let Node::StatementPattern { object: next, .. } = model.get(rest)? else {
            return None;
        };
        items.push(*value);
        patterns.push(first);
        patterns.push(rest);
        current = model.var(*next)?;
    }
    if patterns.is_empty() {
        return None;
    }
    Some(ArgList {
        items,
        patterns,
        is_list: true,
    })
}

fn single(patterns: Option<&Vec<NodeId>>) -> Option<NodeId> {
    match patterns?.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn clone_all(model: &mut QueryModel, ids: &[NodeId]) -> AlgebraResult<Vec<NodeId>> {
    ids.iter().map(|&id| model.deep_clone(id)).collect()
}

// ---------------------------------------------------------------------------
// Service rendering
// ---------------------------------------------------------------------------

fn service_prefixes() -> BTreeMap<String, String> {
    [("sp", sp::NAMESPACE), ("spin", spin::NAMESPACE), ("spl", spl::NAMESPACE)]
        .into_iter()
        .map(|(prefix, ns)| (prefix.to_string(), ns.to_string()))
        .collect()
}

fn render_term(model: &QueryModel, id: NodeId) -> String {
    match model.get(id) {
        Some(Node::Var(var)) => match &var.value {
            Some(value) => value.to_string(),
            None => format!("?{}", var.name),
        },
        Some(Node::ValueConstant(value)) => value.to_string(),
        _ => "[]".to_string(),
    }
}

fn render_side(model: &QueryModel, side: &ArgList) -> String {
    let terms: Vec<String> = side.items.iter().map(|&id| render_term(model, id)).collect();
    if side.is_list {
        format!("({})", terms.join(" "))
    } else {
        terms.join(" ")
    }
}

/// The magic pattern as query text for the tuple-function service.
fn render_expression(
    model: &QueryModel,
    uri: &str,
    subjects: &ArgList,
    objects: &ArgList,
) -> String {
    format!(
        "SELECT * WHERE {{\n  {} <{uri}> {} .\n}}",
        render_side(model, subjects),
        render_side(model, objects)
    )
}

/// The tuple-function call of a union produced by this pass.
pub fn expansion_call(model: &QueryModel, union: NodeId) -> Option<NodeId> {
    let Some(Node::Union { right, .. }) = model.get(union) else {
        return None;
    };
    match model.kind(*right)? {
        NodeKind::TupleFunctionCall => Some(*right),
        NodeKind::Service => model.children(*right).get(1).copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Definition;
    use crate::graph::index::MemoryGraph;
    use crate::graph::Statement;

    const MAGIC: &str = "http://example.org/magic";

    fn names(model: &QueryModel, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| model.var(id).unwrap().name.clone()).collect()
    }

    fn pattern(m: &mut QueryModel, s: &str, p: &str, o: Result<&str, &str>) -> NodeId {
        let s = m.var_node(s);
        let p = m.constant(Term::iri(p));
        let o = match o {
            Ok(var) => m.var_node(var),
            Err(iri) => m.constant(Term::iri(iri)),
        };
        m.pattern(s, p, o)
    }

    /// `?s <magic> ?x . ?x first ?a . ?x rest ?y . ?y first ?b . ?y rest nil`
    fn list_query(with_tail: bool) -> QueryModel {
        let mut m = QueryModel::new();
        let mut parts = vec![
            pattern(&mut m, "s", MAGIC, Ok("x")),
            pattern(&mut m, "x", rdf::FIRST, Ok("a")),
            pattern(&mut m, "x", rdf::REST, Ok("y")),
            pattern(&mut m, "y", rdf::FIRST, Ok("b")),
        ];
        if with_tail {
            parts.push(pattern(&mut m, "y", rdf::REST, Err(rdf::NIL)));
        }
        let mut body = parts[0];
        for &p in &parts[1..] {
            body = m.join(body, p);
        }
        m.set_root(body);
        m
    }

    fn find_call(model: &QueryModel) -> (NodeId, Vec<NodeId>, Vec<NodeId>) {
        let root = model.root().unwrap();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(Node::TupleFunctionCall { args, result_vars, .. }) = model.get(id) {
                return (id, args.clone(), result_vars.clone());
            }
            stack.extend(model.children(id));
        }
        panic!("no tuple function call in\n{}", model.display(root));
    }

    fn run(
        model: &mut QueryModel,
        registry: &TupleFunctionRegistry,
        source: &MemoryGraph,
        mode: EvaluationMode,
    ) {
        let parser = DefinitionParser::new();
        MagicPropertyRewriter::new(&parser, source, registry, mode).optimize(
            model,
            None,
            &BindingSet::new(),
        );
    }

    #[test]
    fn reconstructs_object_list() {
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC));
        let mut m = list_query(true);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);

        let (call, args, results) = find_call(&m);
        assert_eq!(names(&m, &args), vec!["a", "b"]);
        assert_eq!(names(&m, &results), vec!["s"]);

        // The union took the magic pattern's place and holds all five patterns.
        let union = m.parent(call).unwrap();
        assert_eq!(m.kind(union), Some(NodeKind::Union));
        let left = m.children(union)[0];
        let mut folded = 0;
        let mut stack = vec![left];
        while let Some(id) = stack.pop() {
            if m.kind(id) == Some(NodeKind::StatementPattern) {
                folded += 1;
            }
            stack.extend(m.children(id));
        }
        assert_eq!(folded, 5);
        assert_eq!(m.statement_patterns().len(), 5);
    }

    #[test]
    fn inverse_swaps_arguments_and_results() {
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC).inverse());
        let mut m = list_query(true);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);

        let (_, args, results) = find_call(&m);
        assert_eq!(names(&m, &args), vec!["s"]);
        assert_eq!(names(&m, &results), vec!["a", "b"]);
    }

    #[test]
    fn unterminated_list_falls_back_to_single_term() {
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC));
        let mut m = list_query(false);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);

        let (call, args, results) = find_call(&m);
        assert_eq!(names(&m, &args), vec!["x"]);
        assert_eq!(names(&m, &results), vec!["s"]);
        // List patterns stay outside the union.
        let union = m.parent(call).unwrap();
        let left = m.children(union)[0];
        assert_eq!(m.kind(left), Some(NodeKind::StatementPattern));
    }

    #[test]
    fn service_mode_wraps_call() {
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC));
        let mut m = list_query(true);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Service);

        let (call, _, _) = find_call(&m);
        let service = m.parent(call).unwrap();
        let Some(Node::Service { service_ref, expression, prefixes, .. }) = m.get(service) else {
            panic!("call is not wrapped in a service");
        };
        assert!(m.var(*service_ref).unwrap().is_bound_to(spin::TUPLE_FUNCTION_SERVICE));
        assert_eq!(expression, "SELECT * WHERE {\n  ?s <http://example.org/magic> (?a ?b) .\n}");
        assert_eq!(prefixes.get("spin").map(String::as_str), Some(spin::NAMESPACE));
        assert_eq!(expansion_call(&m, m.parent(service).unwrap()), Some(call));
    }

    #[test]
    fn rewriting_is_idempotent() {
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC));
        let mut m = list_query(true);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);
        let root = m.root().unwrap();
        let once = m.display(root).to_string();
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);
        assert_eq!(m.display(root).to_string(), once);
    }

    #[test]
    fn stored_magic_property_is_registered_on_demand() {
        let facts = MemoryGraph::from_statements([
            Statement::new(Term::iri(MAGIC), rdf::TYPE, Term::iri(spin::MAGIC_PROPERTY_CLASS)),
            Statement::new(
                Term::iri(MAGIC),
                spin::BODY,
                Term::string("SELECT ?s WHERE { ?s ?p ?arg1 }"),
            ),
        ]);
        let registry = TupleFunctionRegistry::new();
        let mut m = list_query(true);
        run(&mut m, &registry, &facts, EvaluationMode::Native);

        assert!(registry.get(MAGIC).unwrap().is_transient());
        find_call(&m);
    }

    #[test]
    fn unregistered_predicates_are_untouched() {
        let registry = TupleFunctionRegistry::new();
        let mut m = list_query(true);
        let root = m.root().unwrap();
        let before = m.display(root).to_string();
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);
        assert_eq!(m.display(root).to_string(), before);
    }

    #[test]
    fn bgp_stops_at_operator_boundaries() {
        // { ?x first ?a . ?x rest nil } OPTIONAL { ?s <magic> ?x }
        let registry = TupleFunctionRegistry::new();
        registry.add(TupleFunctionDef::native(MAGIC));
        let mut m = QueryModel::new();
        let first = pattern(&mut m, "x", rdf::FIRST, Ok("a"));
        let rest = pattern(&mut m, "x", rdf::REST, Err(rdf::NIL));
        let outer = m.join(first, rest);
        let magic = pattern(&mut m, "s", MAGIC, Ok("x"));
        let optional = m.add(Node::LeftJoin {
            left: outer,
            right: magic,
            condition: None,
        });
        m.set_root(optional);
        run(&mut m, &registry, &MemoryGraph::new(), EvaluationMode::Native);

        // The list lives in another BGP, so ?x is passed as a single term.
        let (_, args, _) = find_call(&m);
        assert_eq!(names(&m, &args), vec!["x"]);
        assert_eq!(m.parent(first), Some(outer));
    }
}
