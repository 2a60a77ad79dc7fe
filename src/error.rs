//! Rich diagnostic error types for the spinfer engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::algebra::NodeId;
use crate::graph::Term;
use crate::infer::ConstraintViolation;

/// Top-level error type for the spinfer engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SpinError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(spinfer::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("oxigraph store error: {message}")]
    #[diagnostic(
        code(spinfer::store::oxigraph),
        help(
            "The underlying oxigraph store rejected the operation. \
             If the store is persistent, make sure no other process holds its lock."
        )
    )]
    Backend { message: String },

    #[error("invalid term: {message}")]
    #[diagnostic(
        code(spinfer::store::invalid_term),
        help("IRIs must be absolute and blank-node labels must be non-empty.")
    )]
    InvalidTerm { message: String },

    #[error("failed to load RDF data: {message}")]
    #[diagnostic(
        code(spinfer::store::load),
        help("Check that the file is valid Turtle or N-Triples and that the format flag matches.")
    )]
    Load { message: String },
}

/// Result type for fact-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query evaluation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("query evaluation failed: {message}")]
    #[diagnostic(
        code(spinfer::query::evaluation),
        help("Check that the stored sp:text body is valid SPARQL.")
    )]
    Evaluation { message: String },

    #[error("cannot bind ?this to {term}")]
    #[diagnostic(
        code(spinfer::query::unbindable),
        help("The evaluator cannot represent this term; the body is skipped for this subject.")
    )]
    Unbindable { term: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Result type for query evaluation.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Algebra errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AlgebraError {
    #[error("node {id} does not exist in the query model")]
    #[diagnostic(
        code(spinfer::algebra::not_found),
        help("The node was freed by an earlier removal. Re-read the parent's children.")
    )]
    NodeNotFound { id: NodeId },

    #[error("node {child} is not a child of node {parent}")]
    #[diagnostic(
        code(spinfer::algebra::not_a_child),
        help(
            "The structural mutator was called with a child that does not occupy \
             any slot of the named parent. This is a bug in the calling pass."
        )
    )]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {id} has no parent")]
    #[diagnostic(
        code(spinfer::algebra::detached),
        help("Only attached nodes can be replaced relative to their parent.")
    )]
    Detached { id: NodeId },

    #[error("replacement node {id} is already attached to node {parent}")]
    #[diagnostic(
        code(spinfer::algebra::attached),
        help("Detach the replacement first (e.g. replace it with a placeholder).")
    )]
    AlreadyAttached { id: NodeId, parent: NodeId },

    #[error("slot of {kind} node {parent} cannot be removed")]
    #[diagnostic(
        code(spinfer::algebra::required_slot),
        help("Statement pattern variables and service references must always be present.")
    )]
    RequiredSlot { parent: NodeId, kind: &'static str },
}

/// Result type for algebra operations.
pub type AlgebraResult<T> = std::result::Result<T, AlgebraError>;

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("{uri} is not declared as a {expected}")]
    #[diagnostic(
        code(spinfer::resolve::undeclared),
        help("Add an rdf:type statement for the definition to the store.")
    )]
    Undeclared { uri: String, expected: &'static str },

    #[error("{resource} has no query text")]
    #[diagnostic(
        code(spinfer::resolve::missing_body),
        help("Attach the query as a string literal via sp:text.")
    )]
    MissingBody { resource: String },

    #[error("malformed definition for {resource}: {message}")]
    #[diagnostic(code(spinfer::resolve::malformed))]
    Malformed { resource: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Result type for definition resolution.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("store access failed during inference: {0}")]
    #[diagnostic(
        code(spinfer::infer::store),
        help("The whole inference run was aborted. Check the backing store.")
    )]
    Store(#[from] StoreError),

    #[error("malformed rule schema at {resource}: {message}")]
    #[diagnostic(
        code(spinfer::infer::schema),
        help("Fix the rule-property declarations; the run cannot be ordered without them.")
    )]
    Schema { resource: String, message: String },

    #[error("body {body} failed for subject {subject}: {source}")]
    #[diagnostic(
        code(spinfer::infer::body),
        help("The stored rule, constructor or constraint body could not be executed.")
    )]
    Body {
        subject: Term,
        class: Option<Term>,
        body: Term,
        #[source]
        source: BodyFailure,
    },

    #[error("constraint violated on {subject} (class {class}): {violation}")]
    #[diagnostic(
        code(spinfer::infer::constraint),
        help("Inference for this subject stopped at the constraint stage.")
    )]
    ConstraintViolated {
        subject: Term,
        class: Term,
        violation: ConstraintViolation,
    },

    #[error(
        "inference failed for {} subject(s) after inferring {inferred} statement(s)",
        failures.len()
    )]
    #[diagnostic(
        code(spinfer::infer::aborted),
        help("Each related diagnostic names the subject and the underlying cause.")
    )]
    Aborted {
        inferred: usize,
        #[related]
        failures: Vec<InferError>,
    },
}

impl InferError {
    /// Whether the failure only affects the subject being processed.
    pub fn is_subject_scoped(&self) -> bool {
        matches!(self, Self::Body { .. } | Self::ConstraintViolated { .. })
    }
}

/// Why a stored body could not be executed.
#[derive(Debug, Error, Diagnostic)]
pub enum BodyFailure {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("expected a {expected} query, got {actual}")]
    WrongForm {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("malformed constraint violation: {message}")]
    MalformedViolation { message: String },
}

/// Result type for inference operations.
pub type InferResult<T> = std::result::Result<T, InferError>;

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(spinfer::engine::config),
        help("Check the configuration file against the documented EngineConfig fields.")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(spinfer::engine::data_dir),
        help("Ensure the data directory path is valid and writable.")
    )]
    DataDir { path: String },
}

/// Convenience result type for the top-level API.
pub type SpinResult<T> = std::result::Result<T, SpinError>;
