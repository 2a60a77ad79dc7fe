//! Structural mutation: replace or remove a child in place.
//!
//! Replacing keeps the former child alive but detached so it can be re-homed.
//! Removing frees the former child's subtree and collapses the parent when it
//! becomes degenerate:
//!
//! | parent | on removal |
//! |---|---|
//! | unary operator, `Not`, `Exists`, filter body | parent removes itself |
//! | binary operator | parent is replaced by the remaining argument |
//! | filter condition | filter is replaced by its body |
//! | left-join condition | condition dropped |
//! | argument lists, extension elements | element dropped |
//! | query root | argument becomes `SingletonSet` |

use crate::error::{AlgebraError, AlgebraResult};

use super::{Node, NodeId, QueryModel};

/// What happens to the parent after one of its children is removed.
enum Collapse {
    /// Slot already adjusted in place.
    Done,
    /// Parent removes itself from its own parent.
    RemoveSelf,
    /// Parent is replaced by this surviving child.
    ReplaceSelfWith(NodeId),
    /// Root argument must be re-seeded.
    ReseedRoot,
}

impl QueryModel {
    /// Replace `former` in `parent` with `replacement`, or remove it when
    /// `replacement` is `None`.
    ///
    /// `former` must occupy a slot of `parent` and `replacement` must be
    /// detached.
    pub fn replace_child_node(
        &mut self,
        parent: NodeId,
        former: NodeId,
        replacement: Option<NodeId>,
    ) -> AlgebraResult<()> {
        if !self.node(parent)?.children().contains(&former) {
            return Err(AlgebraError::NotAChild {
                parent,
                child: former,
            });
        }
        match replacement {
            Some(replacement) => self.replace_slot(parent, former, replacement),
            None => self.remove_child(parent, former),
        }
    }

    /// Replace `node` within its own parent; see [`Self::replace_child_node`].
    pub fn replace_with(&mut self, node: NodeId, replacement: Option<NodeId>) -> AlgebraResult<()> {
        let parent = self
            .parent(node)
            .ok_or(AlgebraError::Detached { id: node })?;
        self.replace_child_node(parent, node, replacement)
    }

    /// Replace `node` within its parent and free it afterwards.
    pub fn substitute(&mut self, node: NodeId, replacement: NodeId) -> AlgebraResult<()> {
        self.replace_with(node, Some(replacement))?;
        self.free(node);
        Ok(())
    }

    fn replace_slot(
        &mut self,
        parent: NodeId,
        former: NodeId,
        replacement: NodeId,
    ) -> AlgebraResult<()> {
        self.node(replacement)?;
        if let Some(attached) = self.parent(replacement) {
            return Err(AlgebraError::AlreadyAttached {
                id: replacement,
                parent: attached,
            });
        }
        if let Some(slot) = self
            .node_mut(parent)?
            .child_slots_mut()
            .into_iter()
            .find(|slot| **slot == former)
        {
            *slot = replacement;
        }
        self.set_parent(former, None);
        self.set_parent(replacement, Some(parent));
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, former: NodeId) -> AlgebraResult<()> {
        let collapse = match self.node_mut(parent)? {
            Node::QueryRoot { .. } => Collapse::ReseedRoot,
            Node::StatementPattern { context, .. } if *context == Some(former) => {
                *context = None;
                Collapse::Done
            }
            Node::StatementPattern { .. } => {
                return Err(AlgebraError::RequiredSlot {
                    parent,
                    kind: "StatementPattern",
                });
            }
            Node::Service { service_ref, .. } if *service_ref == former => {
                return Err(AlgebraError::RequiredSlot {
                    parent,
                    kind: "Service",
                });
            }
            Node::Join { left, right }
            | Node::Union { left, right }
            | Node::Difference { left, right }
            | Node::Compare { left, right, .. }
            | Node::And { left, right }
            | Node::Or { left, right } => {
                Collapse::ReplaceSelfWith(if *left == former { *right } else { *left })
            }
            Node::LeftJoin {
                left,
                right,
                condition,
            } => {
                if *condition == Some(former) {
                    *condition = None;
                    Collapse::Done
                } else {
                    Collapse::ReplaceSelfWith(if *left == former { *right } else { *left })
                }
            }
            Node::Filter { arg, .. } => {
                if *arg == former {
                    Collapse::RemoveSelf
                } else {
                    Collapse::ReplaceSelfWith(*arg)
                }
            }
            Node::Extension { arg, elems } => {
                if *arg == former {
                    Collapse::RemoveSelf
                } else {
                    elems.retain(|e| e.expr != former);
                    Collapse::Done
                }
            }
            Node::Projection { .. }
            | Node::Distinct { .. }
            | Node::Slice { .. }
            | Node::Service { .. }
            | Node::Not { .. }
            | Node::Exists { .. } => Collapse::RemoveSelf,
            Node::TupleFunctionCall {
                args, result_vars, ..
            } => {
                args.retain(|a| *a != former);
                result_vars.retain(|v| *v != former);
                Collapse::Done
            }
            Node::FunctionCall { args, .. } | Node::Coalesce { args } => {
                args.retain(|a| *a != former);
                Collapse::Done
            }
            Node::Modify {
                delete,
                insert,
                where_expr,
            } => {
                for slot in [delete, insert, where_expr] {
                    if *slot == Some(former) {
                        *slot = None;
                    }
                }
                Collapse::Done
            }
            Node::SingletonSet | Node::EmptySet | Node::Var(_) | Node::ValueConstant(_) => {
                return Err(AlgebraError::NotAChild {
                    parent,
                    child: former,
                });
            }
        };

        let grandparent = match collapse {
            Collapse::RemoveSelf | Collapse::ReplaceSelfWith(_) => Some(
                self.parent(parent)
                    .ok_or(AlgebraError::Detached { id: parent })?,
            ),
            Collapse::Done | Collapse::ReseedRoot => None,
        };

        self.free(former);

        match (collapse, grandparent) {
            (Collapse::ReseedRoot, _) => {
                let seed = self.add(Node::SingletonSet);
                if let Node::QueryRoot { arg } = self.node_mut(parent)? {
                    *arg = seed;
                }
                self.set_parent(seed, Some(parent));
                Ok(())
            }
            (Collapse::RemoveSelf, Some(grandparent)) => {
                self.replace_child_node(grandparent, parent, None)
            }
            (Collapse::ReplaceSelfWith(survivor), Some(grandparent)) => {
                self.set_parent(survivor, None);
                self.replace_slot(grandparent, parent, survivor)?;
                self.free_single(parent);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::NodeKind;
    use crate::graph::Term;

    fn pattern(m: &mut QueryModel, s: &str) -> NodeId {
        let s = m.var_node(s);
        let p = m.constant(Term::iri("http://ex/p"));
        let o = m.var_node("o");
        m.pattern(s, p, o)
    }

    #[test]
    fn replace_round_trip() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let join = m.join(a, b);
        m.set_root(join);

        let y = pattern(&mut m, "y");
        m.replace_child_node(join, a, Some(y)).unwrap();

        assert_eq!(m.children(join), vec![y, b]);
        assert_eq!(m.parent(y), Some(join));
        assert_eq!(m.parent(a), None);
        assert!(m.contains(a));
    }

    #[test]
    fn unary_collapse_removes_operator() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let distinct = m.add(Node::Distinct { arg: b });
        let join = m.join(a, distinct);
        let root = m.set_root(join);

        m.replace_child_node(distinct, b, None).unwrap();

        // The distinct vanished and its parent join collapsed onto `a`.
        assert!(!m.contains(distinct));
        assert!(!m.contains(join));
        assert_eq!(m.children(root), vec![a]);
        assert_eq!(m.parent(a), Some(root));
    }

    #[test]
    fn binary_collapse_keeps_remaining_argument() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let union = m.union(a, b);
        let proj = m.add(Node::Projection {
            arg: union,
            vars: vec!["a".into()],
        });
        m.set_root(proj);

        m.replace_with(a, None).unwrap();
        assert_eq!(m.children(proj), vec![b]);
        assert_eq!(m.parent(b), Some(proj));
        assert!(!m.contains(union));
        assert!(!m.contains(a));
    }

    #[test]
    fn filter_rebinds_to_body_when_condition_removed() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let x = m.var_node("x");
        let cond = m.function_call("http://ex/f", vec![x]);
        let filter = m.filter(a, cond);
        let root = m.set_root(filter);

        m.replace_with(cond, None).unwrap();
        assert_eq!(m.children(root), vec![a]);
        assert!(!m.contains(filter));
        assert!(!m.contains(x));
    }

    #[test]
    fn filter_removes_itself_with_body() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let x = m.var_node("x");
        let cond = m.function_call("http://ex/f", vec![x]);
        let filter = m.filter(a, cond);
        let root = m.set_root(filter);

        m.replace_with(a, None).unwrap();
        assert!(!m.contains(filter));
        assert!(!m.contains(cond));
        let seed = m.children(root)[0];
        assert_eq!(m.kind(seed), Some(NodeKind::SingletonSet));
        assert_eq!(m.parent(seed), Some(root));
    }

    #[test]
    fn list_slots_drop_elements() {
        let mut m = QueryModel::new();
        let x = m.var_node("x");
        let y = m.var_node("y");
        let call = m.function_call("http://ex/f", vec![x, y]);
        m.replace_child_node(call, x, None).unwrap();
        assert_eq!(m.children(call), vec![y]);
    }

    #[test]
    fn structural_faults() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let join = m.join(a, b);
        m.set_root(join);
        let stranger = m.var_node("z");

        assert!(matches!(
            m.replace_child_node(join, stranger, None),
            Err(AlgebraError::NotAChild { .. })
        ));
        let subject = m.children(a)[0];
        assert!(matches!(
            m.replace_child_node(a, subject, None),
            Err(AlgebraError::RequiredSlot { .. })
        ));
        assert!(matches!(
            m.replace_child_node(join, a, Some(b)),
            Err(AlgebraError::AlreadyAttached { .. })
        ));
        assert!(matches!(
            m.replace_with(stranger, None),
            Err(AlgebraError::Detached { .. })
        ));
    }

    #[test]
    fn substitute_frees_former() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let root = m.set_root(a);
        let empty = m.add(Node::EmptySet);
        m.substitute(a, empty).unwrap();
        assert_eq!(m.children(root), vec![empty]);
        assert!(!m.contains(a));
    }
}
