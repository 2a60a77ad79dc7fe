//! Algebra node variants and their structural categories.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::graph::Term;

/// Stable handle of a node in a [`QueryModel`](super::QueryModel).
///
/// Ids are never reused after their node is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A query variable, possibly bound to a constant.
///
/// Two variables are the same variable iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub name: String,
    pub value: Option<Term>,
    pub anonymous: bool,
    pub constant: bool,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            anonymous: false,
            constant: false,
        }
    }

    /// A variable standing for a constant term.
    pub fn constant(value: Term) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self {
            name: format!("_const_{:016x}", hasher.finish()),
            value: Some(value),
            anonymous: true,
            constant: true,
        }
    }

    /// Whether this variable is bound to the IRI `iri`.
    pub fn is_bound_to(&self, iri: &str) -> bool {
        self.value.as_ref().is_some_and(|v| v.is(iri))
    }
}

/// Which graphs a statement pattern ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    DefaultContexts,
    NamedContexts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One `BIND(expr AS ?name)` of an [`Node::Extension`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionElem {
    pub name: String,
    pub expr: NodeId,
}

/// Structural category, used for visitor fallback dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Root,
    Leaf,
    UnaryTuple,
    BinaryTuple,
    NaryTuple,
    UnaryValue,
    BinaryValue,
    NaryValue,
    SubQueryValue,
    Update,
}

/// Fieldless discriminant of [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    QueryRoot,
    StatementPattern,
    SingletonSet,
    EmptySet,
    Join,
    Union,
    LeftJoin,
    Difference,
    Filter,
    Projection,
    Distinct,
    Slice,
    Extension,
    TupleFunctionCall,
    Service,
    Var,
    ValueConstant,
    FunctionCall,
    Compare,
    And,
    Or,
    Not,
    Exists,
    Coalesce,
    Modify,
}

impl NodeKind {
    pub fn category(self) -> NodeCategory {
        use NodeCategory as C;
        match self {
            Self::QueryRoot => C::Root,
            Self::StatementPattern
            | Self::SingletonSet
            | Self::EmptySet
            | Self::Var
            | Self::ValueConstant => C::Leaf,
            Self::Join | Self::Union | Self::LeftJoin | Self::Difference => C::BinaryTuple,
            Self::Filter
            | Self::Projection
            | Self::Distinct
            | Self::Slice
            | Self::Extension
            | Self::Service => C::UnaryTuple,
            Self::TupleFunctionCall => C::NaryTuple,
            Self::FunctionCall | Self::Coalesce => C::NaryValue,
            Self::Compare | Self::And | Self::Or => C::BinaryValue,
            Self::Not => C::UnaryValue,
            Self::Exists => C::SubQueryValue,
            Self::Modify => C::Update,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QueryRoot => "QueryRoot",
            Self::StatementPattern => "StatementPattern",
            Self::SingletonSet => "SingletonSet",
            Self::EmptySet => "EmptySet",
            Self::Join => "Join",
            Self::Union => "Union",
            Self::LeftJoin => "LeftJoin",
            Self::Difference => "Difference",
            Self::Filter => "Filter",
            Self::Projection => "Projection",
            Self::Distinct => "Distinct",
            Self::Slice => "Slice",
            Self::Extension => "Extension",
            Self::TupleFunctionCall => "TupleFunctionCall",
            Self::Service => "Service",
            Self::Var => "Var",
            Self::ValueConstant => "ValueConstant",
            Self::FunctionCall => "FunctionCall",
            Self::Compare => "Compare",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::Exists => "Exists",
            Self::Coalesce => "Coalesce",
            Self::Modify => "Modify",
        }
    }
}

/// An algebra operator. Child slots hold [`NodeId`]s into the owning model.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    QueryRoot {
        arg: NodeId,
    },
    StatementPattern {
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        context: Option<NodeId>,
        scope: Scope,
    },
    SingletonSet,
    EmptySet,
    Join {
        left: NodeId,
        right: NodeId,
    },
    Union {
        left: NodeId,
        right: NodeId,
    },
    LeftJoin {
        left: NodeId,
        right: NodeId,
        condition: Option<NodeId>,
    },
    Difference {
        left: NodeId,
        right: NodeId,
    },
    Filter {
        arg: NodeId,
        condition: NodeId,
    },
    Projection {
        arg: NodeId,
        vars: Vec<String>,
    },
    Distinct {
        arg: NodeId,
    },
    Slice {
        arg: NodeId,
        offset: Option<u64>,
        limit: Option<u64>,
    },
    Extension {
        arg: NodeId,
        elems: Vec<ExtensionElem>,
    },
    TupleFunctionCall {
        uri: String,
        args: Vec<NodeId>,
        result_vars: Vec<NodeId>,
    },
    Service {
        service_ref: NodeId,
        arg: NodeId,
        /// The wrapped expression rendered as query text.
        expression: String,
        /// Prefix declarations, prefix → namespace.
        prefixes: BTreeMap<String, String>,
        base: Option<String>,
        silent: bool,
    },
    Var(Var),
    ValueConstant(Term),
    FunctionCall {
        uri: String,
        args: Vec<NodeId>,
    },
    Compare {
        left: NodeId,
        right: NodeId,
        op: CompareOp,
    },
    And {
        left: NodeId,
        right: NodeId,
    },
    Or {
        left: NodeId,
        right: NodeId,
    },
    Not {
        arg: NodeId,
    },
    Exists {
        subquery: NodeId,
    },
    Coalesce {
        args: Vec<NodeId>,
    },
    Modify {
        delete: Option<NodeId>,
        insert: Option<NodeId>,
        where_expr: Option<NodeId>,
    },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::QueryRoot { .. } => NodeKind::QueryRoot,
            Self::StatementPattern { .. } => NodeKind::StatementPattern,
            Self::SingletonSet => NodeKind::SingletonSet,
            Self::EmptySet => NodeKind::EmptySet,
            Self::Join { .. } => NodeKind::Join,
            Self::Union { .. } => NodeKind::Union,
            Self::LeftJoin { .. } => NodeKind::LeftJoin,
            Self::Difference { .. } => NodeKind::Difference,
            Self::Filter { .. } => NodeKind::Filter,
            Self::Projection { .. } => NodeKind::Projection,
            Self::Distinct { .. } => NodeKind::Distinct,
            Self::Slice { .. } => NodeKind::Slice,
            Self::Extension { .. } => NodeKind::Extension,
            Self::TupleFunctionCall { .. } => NodeKind::TupleFunctionCall,
            Self::Service { .. } => NodeKind::Service,
            Self::Var(_) => NodeKind::Var,
            Self::ValueConstant(_) => NodeKind::ValueConstant,
            Self::FunctionCall { .. } => NodeKind::FunctionCall,
            Self::Compare { .. } => NodeKind::Compare,
            Self::And { .. } => NodeKind::And,
            Self::Or { .. } => NodeKind::Or,
            Self::Not { .. } => NodeKind::Not,
            Self::Exists { .. } => NodeKind::Exists,
            Self::Coalesce { .. } => NodeKind::Coalesce,
            Self::Modify { .. } => NodeKind::Modify,
        }
    }

    pub fn category(&self) -> NodeCategory {
        self.kind().category()
    }

    /// Child ids in slot order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::QueryRoot { arg }
            | Self::Distinct { arg }
            | Self::Slice { arg, .. }
            | Self::Projection { arg, .. }
            | Self::Not { arg } => vec![*arg],
            Self::Exists { subquery } => vec![*subquery],
            Self::StatementPattern {
                subject,
                predicate,
                object,
                context,
                ..
            } => {
                let mut out = vec![*subject, *predicate, *object];
                out.extend(*context);
                out
            }
            Self::SingletonSet | Self::EmptySet | Self::Var(_) | Self::ValueConstant(_) => vec![],
            Self::Join { left, right }
            | Self::Union { left, right }
            | Self::Difference { left, right }
            | Self::Compare { left, right, .. }
            | Self::And { left, right }
            | Self::Or { left, right } => vec![*left, *right],
            Self::LeftJoin {
                left,
                right,
                condition,
            } => {
                let mut out = vec![*left, *right];
                out.extend(*condition);
                out
            }
            Self::Filter { arg, condition } => vec![*arg, *condition],
            Self::Extension { arg, elems } => std::iter::once(*arg)
                .chain(elems.iter().map(|e| e.expr))
                .collect(),
            Self::TupleFunctionCall {
                args, result_vars, ..
            } => args.iter().chain(result_vars).copied().collect(),
            Self::Service {
                service_ref, arg, ..
            } => vec![*service_ref, *arg],
            Self::FunctionCall { args, .. } | Self::Coalesce { args } => args.clone(),
            Self::Modify {
                delete,
                insert,
                where_expr,
            } => delete.iter().chain(insert).chain(where_expr).copied().collect(),
        }
    }

    /// Mutable references to every child slot, in slot order.
    pub(crate) fn child_slots_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Self::QueryRoot { arg }
            | Self::Distinct { arg }
            | Self::Slice { arg, .. }
            | Self::Projection { arg, .. }
            | Self::Not { arg } => vec![arg],
            Self::Exists { subquery } => vec![subquery],
            Self::StatementPattern {
                subject,
                predicate,
                object,
                context,
                ..
            } => {
                let mut out = vec![subject, predicate, object];
                out.extend(context.as_mut());
                out
            }
            Self::SingletonSet | Self::EmptySet | Self::Var(_) | Self::ValueConstant(_) => vec![],
            Self::Join { left, right }
            | Self::Union { left, right }
            | Self::Difference { left, right }
            | Self::Compare { left, right, .. }
            | Self::And { left, right }
            | Self::Or { left, right } => vec![left, right],
            Self::LeftJoin {
                left,
                right,
                condition,
            } => {
                let mut out = vec![left, right];
                out.extend(condition.as_mut());
                out
            }
            Self::Filter { arg, condition } => vec![arg, condition],
            Self::Extension { arg, elems } => std::iter::once(arg)
                .chain(elems.iter_mut().map(|e| &mut e.expr))
                .collect(),
            Self::TupleFunctionCall {
                args, result_vars, ..
            } => args.iter_mut().chain(result_vars.iter_mut()).collect(),
            Self::Service {
                service_ref, arg, ..
            } => vec![service_ref, arg],
            Self::FunctionCall { args, .. } | Self::Coalesce { args } => args.iter_mut().collect(),
            Self::Modify {
                delete,
                insert,
                where_expr,
            } => delete
                .as_mut()
                .into_iter()
                .chain(insert.as_mut())
                .chain(where_expr.as_mut())
                .collect(),
        }
    }

    /// One-line description used by the tree renderer.
    pub(crate) fn describe(&self) -> String {
        let name = self.kind().name();
        match self {
            Self::StatementPattern { scope, .. } if *scope == Scope::NamedContexts => {
                format!("{name} FROM NAMED")
            }
            Self::Projection { vars, .. } => format!("{name} ({})", vars.join(", ")),
            Self::Slice { offset, limit, .. } => {
                format!("{name} (offset={offset:?}, limit={limit:?})")
            }
            Self::Extension { elems, .. } => {
                let names: Vec<_> = elems.iter().map(|e| e.name.as_str()).collect();
                format!("{name} ({})", names.join(", "))
            }
            Self::TupleFunctionCall { uri, .. } | Self::FunctionCall { uri, .. } => {
                format!("{name} ({uri})")
            }
            Self::Service {
                expression, silent, ..
            } => {
                let silent = if *silent { " SILENT" } else { "" };
                format!("{name}{silent} ({})", expression.replace('\n', " "))
            }
            Self::Var(var) => match &var.value {
                Some(value) => format!("{name} (name={}, value={value})", var.name),
                None => format!("{name} (name={})", var.name),
            },
            Self::ValueConstant(term) => format!("{name} (value={term})"),
            Self::Compare { op, .. } => format!("{name} ({})", op.symbol()),
            _ => name.to_string(),
        }
    }
}
