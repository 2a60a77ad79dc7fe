//! Parses SPIN definitions out of stored facts.
//!
//! Query texts and argument lists are memoized per resource; the statement
//! listeners call [`DefinitionParser::reset`] when a backing subject changes.

use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;

use crate::error::{ResolveError, ResolveResult, StoreResult};
use crate::graph::source::FactSource;
use crate::graph::vocab::{rdf, rdfs, sp, spin, spl};
use crate::graph::{Iri, Term};

use super::{Argument, FunctionDef, Origin, TupleFunctionDef};

/// Parser for stored function, magic-property and body definitions.
pub struct DefinitionParser {
    /// Query text per body resource.
    texts: DashMap<Term, String>,
    /// Ordered arguments per definition.
    arguments: DashMap<Term, Vec<Argument>>,
}

impl DefinitionParser {
    pub fn new() -> Self {
        Self {
            texts: DashMap::new(),
            arguments: DashMap::new(),
        }
    }

    /// Forget everything memoized for `resource`.
    pub fn reset(&self, resource: &Term) {
        self.texts.remove(resource);
        self.arguments.remove(resource);
    }

    /// Whether `resource` has `class` among its types, directly or through
    /// `rdfs:subClassOf` chains.
    pub fn is_instance_of(
        &self,
        resource: &Term,
        class: &str,
        source: &dyn FactSource,
    ) -> StoreResult<bool> {
        let mut queue: VecDeque<Term> = source.objects(resource, rdf::TYPE)?.into();
        let mut seen = HashSet::new();
        while let Some(ty) = queue.pop_front() {
            if ty.is(class) {
                return Ok(true);
            }
            if seen.insert(ty.clone()) {
                queue.extend(source.objects(&ty, rdfs::SUB_CLASS_OF)?);
            }
        }
        Ok(false)
    }

    pub fn is_function(&self, uri: &str, source: &dyn FactSource) -> StoreResult<bool> {
        self.is_instance_of(&Term::iri(uri), spin::FUNCTION_CLASS, source)
    }

    pub fn is_magic_property(&self, uri: &str, source: &dyn FactSource) -> StoreResult<bool> {
        self.is_instance_of(&Term::iri(uri), spin::MAGIC_PROPERTY_CLASS, source)
    }

    /// Parse a `spin:Function` declared in the store.
    pub fn parse_function(&self, uri: &str, source: &dyn FactSource) -> ResolveResult<FunctionDef> {
        if !self.is_function(uri, source)? {
            return Err(ResolveError::Undeclared {
                uri: uri.to_string(),
                expected: "spin:Function",
            });
        }
        let resource = Term::iri(uri);
        let return_type = source
            .object(&resource, spin::RETURN_TYPE)?
            .and_then(|t| t.as_iri().cloned());
        Ok(FunctionDef {
            uri: uri.to_string(),
            origin: Origin::Transient,
            body: Some(self.body(&resource, source)?),
            arguments: self.arguments(&resource, source)?,
            return_type,
        })
    }

    /// Parse a `spin:MagicProperty` declared in the store.
    pub fn parse_magic_property(
        &self,
        uri: &str,
        source: &dyn FactSource,
    ) -> ResolveResult<TupleFunctionDef> {
        let resource = Term::iri(uri);
        if !self.is_instance_of(&resource, spin::MAGIC_PROPERTY_CLASS, source)? {
            return Err(ResolveError::Undeclared {
                uri: uri.to_string(),
                expected: "spin:MagicProperty",
            });
        }
        Ok(TupleFunctionDef {
            uri: uri.to_string(),
            origin: Origin::Transient,
            body: Some(self.body(&resource, source)?),
            arguments: self.arguments(&resource, source)?,
            inverse: false,
        })
    }

    fn body(&self, definition: &Term, source: &dyn FactSource) -> ResolveResult<String> {
        let body = source
            .object(definition, spin::BODY)?
            .ok_or_else(|| ResolveError::MissingBody {
                resource: definition.to_string(),
            })?;
        self.query_text(&body, source)
    }

    /// The query text of a body resource: its `sp:text`, or the resource
    /// itself when it is a literal.
    pub fn query_text(&self, resource: &Term, source: &dyn FactSource) -> ResolveResult<String> {
        if let Term::Literal(lit) = resource {
            return Ok(lit.lexical.clone());
        }
        if let Some(text) = self.texts.get(resource) {
            return Ok(text.value().clone());
        }
        let text = match source.object(resource, sp::TEXT)? {
            Some(Term::Literal(lit)) => lit.lexical,
            Some(other) => {
                return Err(ResolveError::Malformed {
                    resource: resource.to_string(),
                    message: format!("sp:text must be a literal, found {other}"),
                });
            }
            None => {
                return Err(ResolveError::MissingBody {
                    resource: resource.to_string(),
                });
            }
        };
        self.texts.insert(resource.clone(), text.clone());
        Ok(text)
    }

    /// Declared `spl:Argument`s of a definition, ordered by `sp:argN`.
    pub fn arguments(
        &self,
        definition: &Term,
        source: &dyn FactSource,
    ) -> ResolveResult<Vec<Argument>> {
        if let Some(args) = self.arguments.get(definition) {
            return Ok(args.value().clone());
        }
        let mut args = Vec::new();
        for constraint in source.objects(definition, spin::CONSTRAINT)? {
            if !self.is_instance_of(&constraint, spl::ARGUMENT, source)? {
                continue;
            }
            let predicate = match source.object(&constraint, spl::PREDICATE)? {
                Some(Term::Iri(iri)) => iri,
                _ => {
                    return Err(ResolveError::Malformed {
                        resource: definition.to_string(),
                        message: format!("argument {constraint} has no IRI spl:predicate"),
                    });
                }
            };
            let value_type = source
                .object(&constraint, spl::VALUE_TYPE)?
                .and_then(|t| t.as_iri().cloned());
            let optional = source
                .object(&constraint, spl::OPTIONAL)?
                .and_then(|t| t.as_literal().and_then(|l| l.as_bool()))
                .unwrap_or(false);
            let default_value = source.object(&constraint, spl::DEFAULT_VALUE)?;
            args.push(Argument {
                predicate,
                value_type,
                optional,
                default_value,
            });
        }
        args.sort_by(|a, b| argument_order(&a.predicate).cmp(&argument_order(&b.predicate)));
        self.arguments.insert(definition.clone(), args.clone());
        Ok(args)
    }
}

impl Default for DefinitionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `sp:argN` sorts by N; any other predicate sorts after, by IRI.
fn argument_order(predicate: &Iri) -> (u32, String) {
    let index = predicate
        .as_str()
        .strip_prefix(sp::ARG_PREFIX)
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX);
    (index, predicate.as_str().to_string())
}
