//! Query algebra: an arena of operator nodes with parent back-references.
//!
//! A [`QueryModel`] owns every node; parents hold child [`NodeId`]s in their
//! slots and every attached node records its single parent. The arena alone
//! determines lifetime, so back-references never own anything.
//!
//! - [`visitor`]: pre-order double dispatch with category fallback
//! - [`mutate`]: in-place replacement and collapse of degenerate operators

pub mod mutate;
pub mod node;
pub mod visitor;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AlgebraError, AlgebraResult};
use crate::graph::{Iri, Term};

pub use node::{CompareOp, ExtensionElem, Node, NodeCategory, NodeId, NodeKind, Scope, Var};

/// Dataset clause of a query: default and named graphs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub default_graphs: Vec<Iri>,
    pub named_graphs: Vec<Iri>,
}

/// Externally supplied variable bindings, name → value.
pub type BindingSet = BTreeMap<String, Term>;

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
}

/// Arena-backed algebra tree.
#[derive(Debug, Clone, Default)]
pub struct QueryModel {
    slots: Vec<Option<Slot>>,
    root: Option<NodeId>,
}

impl QueryModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, adopting its children.
    ///
    /// Every child named by `node` must be detached.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len());
        for child in node.children() {
            debug_assert!(
                self.parent(child).is_none(),
                "child {child} is already attached"
            );
            self.set_parent(child, Some(id));
        }
        self.slots.push(Some(Slot { node, parent: None }));
        id
    }

    /// Wrap `arg` in a [`Node::QueryRoot`] and make it the model's root.
    pub fn set_root(&mut self, arg: NodeId) -> NodeId {
        let root = self.add(Node::QueryRoot { arg });
        self.root = Some(root);
        root
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0)?.as_ref().map(|s| &s.node)
    }

    pub fn node(&self, id: NodeId) -> AlgebraResult<&Node> {
        self.get(id).ok_or(AlgebraError::NodeNotFound { id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> AlgebraResult<&mut Node> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|s| &mut s.node)
            .ok_or(AlgebraError::NodeNotFound { id })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0)?.as_ref()?.parent
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            slot.parent = parent;
        }
    }

    /// Child ids of `id` in slot order; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).map(Node::children).unwrap_or_default()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(Node::kind)
    }

    pub fn category(&self, id: NodeId) -> Option<NodeCategory> {
        self.get(id).map(Node::category)
    }

    /// The variable stored at `id`, if that node is a [`Node::Var`].
    pub fn var(&self, id: NodeId) -> Option<&Var> {
        match self.get(id)? {
            Node::Var(var) => Some(var),
            _ => None,
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the subtree rooted at `id`; the copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> AlgebraResult<NodeId> {
        let mut node = self.node(id)?.clone();
        for slot in node.child_slots_mut() {
            *slot = self.deep_clone(*slot)?;
        }
        Ok(self.add(node))
    }

    /// Free the subtree rooted at `id`. Children re-homed elsewhere survive.
    pub(crate) fn free(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for child in slot.node.children() {
            if self.parent(child) == Some(id) {
                self.free(child);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    /// Free a single node, leaving its children in place but detached.
    pub(crate) fn free_single(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for child in slot.node.children() {
            if self.parent(child) == Some(id) {
                self.set_parent(child, None);
            }
        }
    }

    /// Ids of all live statement patterns reachable from the root, pre-order.
    pub fn statement_patterns(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if node.kind() == NodeKind::StatementPattern {
                    out.push(id);
                }
                stack.extend(node.children().into_iter().rev());
            }
        }
        out
    }

    /// Render the subtree at `id` as an indented tree.
    pub fn display(&self, id: NodeId) -> TreeDisplay<'_> {
        TreeDisplay { model: self, id }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn var_node(&mut self, name: impl Into<String>) -> NodeId {
        self.add(Node::Var(Var::new(name)))
    }

    pub fn constant(&mut self, value: Term) -> NodeId {
        self.add(Node::Var(Var::constant(value)))
    }

    /// A statement pattern over three variable nodes.
    pub fn pattern(&mut self, subject: NodeId, predicate: NodeId, object: NodeId) -> NodeId {
        self.add(Node::StatementPattern {
            subject,
            predicate,
            object,
            context: None,
            scope: Scope::DefaultContexts,
        })
    }

    pub fn join(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(Node::Join { left, right })
    }

    pub fn union(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(Node::Union { left, right })
    }

    pub fn filter(&mut self, arg: NodeId, condition: NodeId) -> NodeId {
        self.add(Node::Filter { arg, condition })
    }

    pub fn function_call(&mut self, uri: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.add(Node::FunctionCall {
            uri: uri.into(),
            args,
        })
    }
}

/// Indented rendering of a subtree, one node per line.
pub struct TreeDisplay<'a> {
    model: &'a QueryModel,
    id: NodeId,
}

impl TreeDisplay<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let indent = "   ".repeat(depth);
        match self.model.get(id) {
            Some(node) => {
                writeln!(f, "{indent}{}", node.describe())?;
                for child in node.children() {
                    self.write_node(f, child, depth + 1)?;
                }
                Ok(())
            }
            None => writeln!(f, "{indent}<freed {id}>"),
        }
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.id, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgp(model: &mut QueryModel) -> (NodeId, NodeId, NodeId) {
        let s = model.var_node("s");
        let p = model.constant(Term::iri("http://ex/p"));
        let o = model.var_node("o");
        let sp1 = model.pattern(s, p, o);
        let s2 = model.var_node("o");
        let p2 = model.constant(Term::iri("http://ex/q"));
        let o2 = model.var_node("x");
        let sp2 = model.pattern(s2, p2, o2);
        let join = model.join(sp1, sp2);
        (join, sp1, sp2)
    }

    #[test]
    fn add_links_parents() {
        let mut m = QueryModel::new();
        let (join, sp1, sp2) = bgp(&mut m);
        let root = m.set_root(join);
        assert_eq!(m.parent(join), Some(root));
        assert_eq!(m.parent(sp1), Some(join));
        assert_eq!(m.parent(sp2), Some(join));
        assert_eq!(m.children(join), vec![sp1, sp2]);
        assert_eq!(m.statement_patterns(), vec![sp1, sp2]);
    }

    #[test]
    fn deep_clone_is_detached_and_equal() {
        let mut m = QueryModel::new();
        let (join, _, _) = bgp(&mut m);
        m.set_root(join);
        let copy = m.deep_clone(join).unwrap();
        assert_eq!(m.parent(copy), None);
        assert_eq!(m.display(copy).to_string(), m.display(join).to_string());
        assert_eq!(m.len(), 2 * 9 + 1);
    }

    #[test]
    fn display_renders_indented_tree() {
        let mut m = QueryModel::new();
        let s = m.var_node("s");
        let p = m.constant(Term::iri("http://ex/p"));
        let o = m.var_node("o");
        let sp = m.pattern(s, p, o);
        let root = m.set_root(sp);
        let text = m.display(root).to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "QueryRoot");
        assert_eq!(lines[1], "   StatementPattern");
        assert_eq!(lines[2], "      Var (name=s)");
        assert!(lines[3].starts_with("      Var (name=_const_"));
        assert!(lines[3].ends_with("value=<http://ex/p>)"));
    }
}
