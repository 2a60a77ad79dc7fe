//! Query optimizer passes over the algebra tree.
//!
//! Both passes are best-effort: resolution failures are logged and the
//! affected node is left as it was. Running a pass again after everything is
//! resolved is a no-op.

pub mod function;
pub mod magic;

use serde::{Deserialize, Serialize};

use crate::algebra::{BindingSet, Dataset, QueryModel};

pub use function::FunctionResolver;
pub use magic::MagicPropertyRewriter;

/// An in-place rewrite of a query model.
pub trait QueryOptimizer {
    /// Rewrite `model`. `dataset` and `bindings` describe the query context.
    fn optimize(&self, model: &mut QueryModel, dataset: Option<&Dataset>, bindings: &BindingSet);
}

/// How rewritten magic properties are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// A direct `TupleFunctionCall` node.
    #[default]
    Native,
    /// The call wrapped in a `Service` node addressed to the internal
    /// tuple-function endpoint.
    Service,
}
