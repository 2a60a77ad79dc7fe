//! Persistent SPARQL RDF store backed by oxigraph.
//!
//! Serves as both the [`FactSource`] the engine reads and writes through and
//! the [`QueryEvaluator`] that runs stored rule, constructor and constraint
//! bodies with `?this` bound to the current subject.

use std::io::Read;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model as ox;
use oxigraph::sparql::{QueryEvaluationError, QueryResults, SparqlEvaluator, Variable};
use oxigraph::store::Store;

use crate::error::{QueryError, QueryResult, StoreError, StoreResult};

use super::source::{FactSource, QueryEvaluator, QueryOutcome, Statements};
use super::{Iri, Literal, Statement, Term};

/// Persistent SPARQL-capable RDF store.
pub struct SparqlStore {
    store: Store,
}

impl SparqlStore {
    /// Create a new in-memory SPARQL store (no persistence).
    pub fn in_memory() -> StoreResult<Self> {
        let store = Store::new().map_err(|e| StoreError::Backend {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Open or create a persistent SPARQL store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(path).map_err(|source| StoreError::Io { source })?;
        let store = Store::open(path).map_err(|e| StoreError::Backend {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self { store })
    }

    /// Bulk-load RDF into the default graph, bypassing any connection.
    pub fn load(&self, format: RdfFormat, reader: impl Read) -> StoreResult<()> {
        self.store
            .load_from_reader(format, reader)
            .map_err(|e| StoreError::Load {
                message: e.to_string(),
            })
    }

    /// Get the number of statements in the store.
    pub fn len(&self) -> StoreResult<usize> {
        self.store.len().map_err(|e| StoreError::Backend {
            message: format!("count failed: {e}"),
        })
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Run `query` with the variable `?this` (or `$this`) pre-bound to
    /// `this`.
    ///
    /// The binding is an initial solution, not a text rewrite, so blank
    /// nodes bind like any other resource and `?this` inside string literals
    /// is left alone. A query that never mentions `?this` runs unbound.
    fn execute(&self, query: &str, this: &Term) -> QueryResult<QueryResults<'static>> {
        let prepared = SparqlEvaluator::new()
            .parse_query(query)
            .map_err(|e| QueryError::Evaluation {
                message: format!("syntax error: {e}"),
            })?;
        let value = to_term(this).map_err(|_| QueryError::Unbindable {
            term: this.to_string(),
        })?;
        let bound = prepared
            .clone()
            .substitute_variable(Variable::new_unchecked("this"), value)
            .on_store(&self.store)
            .execute();
        match bound {
            Err(QueryEvaluationError::NotExistingSubstitutedVariable(_)) => {
                prepared.on_store(&self.store).execute()
            }
            other => other,
        }
        .map_err(|e| QueryError::Evaluation {
            message: e.to_string(),
        })
    }
}

/// Parse RDF into statements without storing them. Named-graph quads are
/// folded into the default graph.
pub fn parse_statements(format: RdfFormat, reader: impl Read) -> StoreResult<Vec<Statement>> {
    RdfParser::from_format(format)
        .for_reader(reader)
        .map(|quad| {
            let quad = quad.map_err(|e| StoreError::Load {
                message: e.to_string(),
            })?;
            Ok(Statement {
                subject: from_term(quad.subject.into()),
                predicate: Iri::new(quad.predicate.as_str()),
                object: from_term(quad.object),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Term conversion
// ---------------------------------------------------------------------------

fn named_node(iri: &Iri) -> StoreResult<ox::NamedNode> {
    ox::NamedNode::new(iri.as_str()).map_err(|e| StoreError::InvalidTerm {
        message: format!("{iri}: {e}"),
    })
}

fn to_subject(term: &Term) -> StoreResult<ox::NamedOrBlankNode> {
    match term {
        Term::Iri(iri) => Ok(named_node(iri)?.into()),
        Term::BlankNode(label) => Ok(blank_node(label)?.into()),
        Term::Literal(lit) => Err(StoreError::InvalidTerm {
            message: format!("literal {lit} cannot be a subject"),
        }),
    }
}

fn blank_node(label: &str) -> StoreResult<ox::BlankNode> {
    ox::BlankNode::new(label).map_err(|e| StoreError::InvalidTerm {
        message: format!("_:{label}: {e}"),
    })
}

fn to_term(term: &Term) -> StoreResult<ox::Term> {
    match term {
        Term::Iri(iri) => Ok(named_node(iri)?.into()),
        Term::BlankNode(label) => Ok(blank_node(label)?.into()),
        Term::Literal(lit) => {
            let literal = match &lit.language {
                Some(lang) => ox::Literal::new_language_tagged_literal(&lit.lexical, lang)
                    .map_err(|e| StoreError::InvalidTerm {
                        message: format!("{lit}: {e}"),
                    })?,
                None => ox::Literal::new_typed_literal(&lit.lexical, named_node(&lit.datatype)?),
            };
            Ok(literal.into())
        }
    }
}

fn from_term(term: ox::Term) -> Term {
    #[allow(unreachable_patterns)]
    match term {
        ox::Term::NamedNode(n) => Term::iri(n.as_str()),
        ox::Term::BlankNode(b) => Term::blank(b.as_str()),
        ox::Term::Literal(l) => Term::Literal(Literal {
            lexical: l.value().to_string(),
            datatype: Iri::new(l.datatype().as_str()),
            language: l.language().map(str::to_string),
        }),
        other => Term::string(other.to_string()),
    }
}

fn from_triple(triple: ox::Triple) -> Statement {
    Statement {
        subject: from_term(triple.subject.into()),
        predicate: Iri::new(triple.predicate.as_str()),
        object: from_term(triple.object),
    }
}

fn to_quad(statement: &Statement) -> StoreResult<ox::Quad> {
    Ok(ox::Quad::new(
        to_subject(&statement.subject)?,
        named_node(&statement.predicate)?,
        to_term(&statement.object)?,
        ox::GraphName::DefaultGraph,
    ))
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

impl FactSource for SparqlStore {
    fn statements(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> StoreResult<Statements<'_>> {
        // A literal can never be a subject.
        if matches!(subject, Some(Term::Literal(_))) {
            return Ok(Box::new(std::iter::empty()));
        }
        let subject = subject.map(to_subject).transpose()?;
        let predicate = predicate.map(named_node).transpose()?;
        let object = object.map(to_term).transpose()?;

        let quads = self.store.quads_for_pattern(
            subject.as_ref().map(|s| s.as_ref()),
            predicate.as_ref().map(|p| p.as_ref()),
            object.as_ref().map(|o| o.as_ref()),
            Some(ox::GraphNameRef::DefaultGraph),
        );
        Ok(Box::new(quads.map(|quad| {
            let quad = quad.map_err(|e| StoreError::Backend {
                message: format!("pattern lookup failed: {e}"),
            })?;
            Ok(Statement {
                subject: from_term(quad.subject.into()),
                predicate: Iri::new(quad.predicate.as_str()),
                object: from_term(quad.object),
            })
        })))
    }

    fn insert(&self, statement: &Statement) -> StoreResult<bool> {
        self.store
            .insert(&to_quad(statement)?)
            .map_err(|e| StoreError::Backend {
                message: format!("insert failed: {e}"),
            })
    }

    fn remove(&self, statement: &Statement) -> StoreResult<bool> {
        self.store
            .remove(&to_quad(statement)?)
            .map_err(|e| StoreError::Backend {
                message: format!("remove failed: {e}"),
            })
    }

    fn flush(&self) -> StoreResult<()> {
        self.store.flush().map_err(|e| StoreError::Backend {
            message: format!("flush failed: {e}"),
        })
    }
}

impl QueryEvaluator for SparqlStore {
    fn evaluate(&self, query: &str, this: &Term) -> QueryResult<QueryOutcome> {
        match self.execute(query, this)? {
            QueryResults::Boolean(b) => Ok(QueryOutcome::Boolean(b)),
            QueryResults::Graph(triples) => {
                let mut out = Vec::new();
                for triple in triples {
                    let triple = triple.map_err(|e| QueryError::Evaluation {
                        message: format!("triple error: {e}"),
                    })?;
                    out.push(from_triple(triple));
                }
                Ok(QueryOutcome::Graph(out))
            }
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| QueryError::Evaluation {
                        message: format!("solution error: {e}"),
                    })?;
                    rows.push(
                        solution
                            .iter()
                            .map(|(var, term)| (var.as_str().to_string(), from_term(term.clone())))
                            .collect(),
                    );
                }
                Ok(QueryOutcome::Solutions(rows))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(local: &str) -> Term {
        Term::iri(format!("http://example.org/{local}"))
    }

    #[test]
    fn insert_and_lookup_round_trip() {
        let store = SparqlStore::in_memory().unwrap();
        let hi = Term::Literal(Literal::lang_string("hi", "en"));
        let st = Statement::new(ex("a"), "http://example.org/p", hi);
        assert!(store.insert(&st).unwrap());
        assert!(!store.insert(&st).unwrap());
        let found: Vec<_> = store
            .statements(Some(&ex("a")), None, None)
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(found, vec![st]);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn literal_subject_matches_nothing() {
        let store = SparqlStore::in_memory().unwrap();
        assert_eq!(store.statements(Some(&Term::string("x")), None, None).unwrap().count(), 0);
    }

    #[test]
    fn this_binds_both_sigils() {
        let store = SparqlStore::in_memory().unwrap();
        let out = store
            .evaluate("CONSTRUCT { ?this <http://ex/p> $this } WHERE {}", &ex("w"))
            .unwrap();
        assert_eq!(
            out,
            QueryOutcome::Graph(vec![Statement::new(ex("w"), "http://ex/p", ex("w"))])
        );
    }

    #[test]
    fn this_inside_a_string_literal_is_left_alone() {
        let store = SparqlStore::in_memory().unwrap();
        let out = store
            .evaluate(
                "CONSTRUCT { ?this <http://example.org/note> \"bound ?this here\" } WHERE {}",
                &ex("w"),
            )
            .unwrap();
        assert_eq!(
            out,
            QueryOutcome::Graph(vec![Statement::new(
                ex("w"),
                "http://example.org/note",
                Term::string("bound ?this here"),
            )])
        );
    }

    #[test]
    fn blank_node_this_is_bound() {
        let store = SparqlStore::in_memory().unwrap();
        store
            .insert(&Statement::new(
                Term::blank("w"),
                "http://example.org/label",
                Term::string("x"),
            ))
            .unwrap();
        let ask = "ASK { ?this <http://example.org/label> ?l }";
        assert_eq!(
            store.evaluate(ask, &Term::blank("w")).unwrap(),
            QueryOutcome::Boolean(true)
        );
        assert_eq!(
            store.evaluate(ask, &Term::blank("other")).unwrap(),
            QueryOutcome::Boolean(false)
        );
    }

    #[test]
    fn query_without_this_runs_unbound() {
        let store = SparqlStore::in_memory().unwrap();
        store
            .insert(&Statement::new(ex("a"), "http://example.org/p", ex("b")))
            .unwrap();
        let out = store
            .evaluate("ASK { ?s <http://example.org/p> ?o }", &ex("w"))
            .unwrap();
        assert_eq!(out, QueryOutcome::Boolean(true));
        assert!(matches!(
            store.evaluate("ASK {", &ex("w")),
            Err(QueryError::Evaluation { .. })
        ));
    }

    #[test]
    fn evaluates_construct_with_bound_this() {
        let store = SparqlStore::in_memory().unwrap();
        let out = store
            .evaluate(
                "CONSTRUCT { ?this <http://example.org/label> \"widget\" } WHERE {}",
                &ex("Widget"),
            )
            .unwrap();
        assert_eq!(
            out,
            QueryOutcome::Graph(vec![Statement::new(
                ex("Widget"),
                "http://example.org/label",
                Term::string("widget"),
            )])
        );
    }

    #[test]
    fn parses_turtle() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            ex:a ex:p "v" ; ex:q ex:b .
        "#;
        let mut parsed = parse_statements(RdfFormat::Turtle, ttl.as_bytes()).unwrap();
        parsed.sort();
        assert_eq!(
            parsed,
            vec![
                Statement::new(ex("a"), "http://example.org/p", Term::string("v")),
                Statement::new(ex("a"), "http://example.org/q", ex("b")),
            ]
        );
        assert!(parse_statements(RdfFormat::Turtle, "ex:a".as_bytes()).is_err());
    }

    #[test]
    fn bulk_load_counts_statements() {
        let store = SparqlStore::in_memory().unwrap();
        assert!(store.is_empty().unwrap());
        store
            .load(
                RdfFormat::NTriples,
                "<http://example.org/a> <http://example.org/p> \"v\" .\n".as_bytes(),
            )
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert!(matches!(
            store.load(RdfFormat::NTriples, "not rdf".as_bytes()),
            Err(StoreError::Load { .. })
        ));
    }

    #[test]
    fn evaluates_ask() {
        let store = SparqlStore::in_memory().unwrap();
        store
            .insert(&Statement::new(ex("a"), "http://example.org/p", ex("b")))
            .unwrap();
        let out = store
            .evaluate("ASK { ?this <http://example.org/p> ?o }", &ex("a"))
            .unwrap();
        assert_eq!(out, QueryOutcome::Boolean(true));
    }
}
