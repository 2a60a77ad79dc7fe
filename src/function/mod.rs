//! Function and tuple-function (magic property) definitions.
//!
//! Definitions are either native (registered by the host) or transient
//! (parsed from stored SPIN facts and evicted when those facts change).

pub mod parser;
pub mod registry;

use serde::Serialize;

use crate::graph::{Iri, Term};

pub use parser::DefinitionParser;
pub use registry::{FunctionRegistry, Registry, TupleFunctionRegistry};

/// Where a definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    Native,
    /// Parsed from stored facts.
    Transient,
}

/// A declared argument of a function or magic property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    /// Positional predicate such as `sp:arg1`.
    pub predicate: Iri,
    pub value_type: Option<Iri>,
    pub optional: bool,
    pub default_value: Option<Term>,
}

/// A scalar function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub uri: String,
    pub origin: Origin,
    /// Query text of `spin:body`, for transient definitions.
    pub body: Option<String>,
    pub arguments: Vec<Argument>,
    pub return_type: Option<Iri>,
}

impl FunctionDef {
    pub fn native(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            origin: Origin::Native,
            body: None,
            arguments: Vec::new(),
            return_type: None,
        }
    }
}

/// A relation-producing function, used through a magic property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupleFunctionDef {
    pub uri: String,
    pub origin: Origin,
    pub body: Option<String>,
    pub arguments: Vec<Argument>,
    /// Arguments come from the object side and results bind the subject side.
    pub inverse: bool,
}

impl TupleFunctionDef {
    pub fn native(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            origin: Origin::Native,
            body: None,
            arguments: Vec::new(),
            inverse: false,
        }
    }

    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }
}

/// Common view over registry entries.
pub trait Definition: Send + Sync {
    fn uri(&self) -> &str;
    fn origin(&self) -> Origin;

    fn is_transient(&self) -> bool {
        self.origin() == Origin::Transient
    }
}

impl Definition for FunctionDef {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn origin(&self) -> Origin {
        self.origin
    }
}

impl Definition for TupleFunctionDef {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn origin(&self) -> Origin {
        self.origin
    }
}
