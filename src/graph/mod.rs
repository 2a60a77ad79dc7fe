//! RDF data model and fact stores.
//!
//! Statements are (subject, predicate, object) triples over [`Term`]s.
//!
//! - **In-memory layer** ([`index::MemoryGraph`]): `DashMap` subject/predicate indexes
//! - **Persistent layer** ([`sparql::SparqlStore`]): `oxigraph`, which also evaluates
//!   stored rule bodies
//! - **Connection** ([`connection::Connection`]): notifies listeners on every change
//!   and records the statements added during the current batch

pub mod connection;
pub mod index;
pub mod source;
pub mod sparql;
pub mod vocab;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An absolute IRI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Iri(Arc<str>);

impl Iri {
    pub fn new(iri: impl AsRef<str>) -> Self {
        Self(Arc::from(iri.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the last `#` or `/`.
    pub fn local_name(&self) -> &str {
        self.0
            .rfind(['#', '/'])
            .map(|i| &self.0[i + 1..])
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A literal with a datatype and an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Iri,
    pub language: Option<String>,
}

impl Literal {
    /// A plain `xsd:string` literal.
    pub fn string(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri::new(vocab::xsd::STRING),
            language: None,
        }
    }

    pub fn integer(value: i64) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Iri::new(vocab::xsd::INTEGER),
            language: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            lexical: value.to_string(),
            datatype: Iri::new(vocab::xsd::BOOLEAN),
            language: None,
        }
    }

    pub fn lang_string(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri::new(vocab::rdf::LANG_STRING),
            language: Some(language.into()),
        }
    }

    /// Parse the lexical form as an integer, whatever the declared datatype.
    pub fn as_i64(&self) -> Option<i64> {
        self.lexical.trim().parse().ok()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.lexical.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.lexical.chars() {
            match c {
                '"' => write!(f, "\\\"")?,
                '\\' => write!(f, "\\\\")?,
                '\n' => write!(f, "\\n")?,
                '\r' => write!(f, "\\r")?,
                c => write!(f, "{c}")?,
            }
        }
        write!(f, "\"")?;
        if let Some(lang) = &self.language {
            write!(f, "@{lang}")
        } else if self.datatype.as_str() == vocab::xsd::STRING {
            Ok(())
        } else {
            write!(f, "^^{}", self.datatype)
        }
    }
}

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    BlankNode(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Self::Iri(Iri::new(iri))
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::BlankNode(label.into())
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Self::Literal(Literal::string(lexical))
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// IRIs and blank nodes; the terms that can be subjects.
    pub fn is_resource(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Whether this term is the IRI `iri`.
    pub fn is(&self, iri: &str) -> bool {
        matches!(self, Self::Iri(i) if i.as_str() == iri)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::BlankNode(label) => write!(f, "_:{label}"),
            Self::Literal(lit) => lit.fmt(f),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Self::Literal(lit)
    }
}

/// A statement (subject, predicate, object) in the fact store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Statement {
    /// The subject; an IRI or blank node.
    pub subject: Term,
    /// The predicate IRI.
    pub predicate: Iri,
    /// The object; any term.
    pub object: Term,
}

impl Statement {
    pub fn new(
        subject: impl Into<Term>,
        predicate: impl Into<Iri>,
        object: impl Into<Term>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Whether this statement matches an optional (s, p, o) pattern.
    pub fn matches(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> bool {
        subject.is_none_or(|s| *s == self.subject)
            && predicate.is_none_or(|p| *p == self.predicate)
            && object.is_none_or(|o| *o == self.object)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}
