// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # spinfer
//!
//! SPIN-style query optimization and forward-chaining rule inference for
//! RDF/SPARQL.
//!
//! ## Architecture
//!
//! - **RDF model** (`graph`): terms, statements, fact sources, the notifying
//!   connection and an oxigraph-backed store that also evaluates rule bodies
//! - **Query algebra** (`algebra`): arena-allocated operator tree with
//!   double-dispatch visitors and a structural mutator
//! - **Definitions** (`function`): native and stored functions and magic
//!   properties, their registries and the SPIN definition parser
//! - **Optimizer** (`optimize`): function resolution and magic-property
//!   rewriting
//! - **Inference** (`infer`): rules, constructors and constraints driven to a
//!   fixpoint
//!
//! ## Library usage
//!
//! ```no_run
//! use spinfer::engine::{Engine, EngineConfig};
//! use spinfer::graph::{Statement, Term};
//! use spinfer::graph::vocab::rdf;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .add_statement(&Statement::new(
//!         Term::iri("http://example.org/Widget"),
//!         rdf::TYPE,
//!         Term::iri("http://example.org/Gadget"),
//!     ))
//!     .unwrap();
//! let inferred = engine.infer().unwrap();
//! println!("inferred {inferred} statements");
//! ```

pub mod algebra;
pub mod engine;
pub mod error;
pub mod function;
pub mod graph;
pub mod infer;
pub mod optimize;
