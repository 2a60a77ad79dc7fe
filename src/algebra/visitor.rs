//! Pre-order double dispatch over a [`QueryModel`].
//!
//! [`visit`] calls the handler for the node's concrete kind. Every `meet_*`
//! handler defaults to [`visit_category`], which picks the category handler
//! (`meet_binary_tuple_operator`, `meet_nary_value_operator`, ...) from
//! [`NodeKind::category`]. Category handlers default to
//! [`QueryModelVisitor::meet_node`], which recurses into the children.
//! Overriding a handler without calling [`visit_children`] stops recursion
//! below that node.

use super::{NodeCategory, NodeId, NodeKind, QueryModel};

/// A pass over the algebra tree.
///
/// Handlers receive the model mutably so they can rewrite in place through
/// the [`mutate`](super::mutate) API.
pub trait QueryModelVisitor {
    type Error;

    fn meet_query_root(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_statement_pattern(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_singleton_set(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_empty_set(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_var(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_value_constant(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    // -- binary tuple operators ---------------------------------------------

    fn meet_join(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_union(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_left_join(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_difference(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    // -- unary tuple operators ----------------------------------------------

    fn meet_filter(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_projection(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_distinct(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_slice(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_extension(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_service(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    // -- n-ary tuple operators ----------------------------------------------

    fn meet_tuple_function_call(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    // -- value operators ----------------------------------------------------

    fn meet_function_call(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_coalesce(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_compare(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_and(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_or(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_not(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_exists(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    fn meet_modify(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_category(model, id, self)
    }

    // -- category fallbacks -------------------------------------------------

    fn meet_unary_tuple_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_binary_tuple_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_nary_tuple_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_unary_value_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_binary_value_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_nary_value_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_sub_query_value_operator(
        &mut self,
        model: &mut QueryModel,
        id: NodeId,
    ) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    fn meet_update_expr(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        self.meet_node(model, id)
    }

    /// Last-resort handler for anything not matched above.
    fn meet_node(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Self::Error> {
        visit_children(model, id, self)
    }
}

/// Dispatch `id` to the visitor. Freed ids are ignored.
pub fn visit<V: QueryModelVisitor + ?Sized>(
    model: &mut QueryModel,
    id: NodeId,
    visitor: &mut V,
) -> Result<(), V::Error> {
    let Some(kind) = model.kind(id) else {
        return Ok(());
    };
    match kind {
        NodeKind::QueryRoot => visitor.meet_query_root(model, id),
        NodeKind::StatementPattern => visitor.meet_statement_pattern(model, id),
        NodeKind::SingletonSet => visitor.meet_singleton_set(model, id),
        NodeKind::EmptySet => visitor.meet_empty_set(model, id),
        NodeKind::Join => visitor.meet_join(model, id),
        NodeKind::Union => visitor.meet_union(model, id),
        NodeKind::LeftJoin => visitor.meet_left_join(model, id),
        NodeKind::Difference => visitor.meet_difference(model, id),
        NodeKind::Filter => visitor.meet_filter(model, id),
        NodeKind::Projection => visitor.meet_projection(model, id),
        NodeKind::Distinct => visitor.meet_distinct(model, id),
        NodeKind::Slice => visitor.meet_slice(model, id),
        NodeKind::Extension => visitor.meet_extension(model, id),
        NodeKind::TupleFunctionCall => visitor.meet_tuple_function_call(model, id),
        NodeKind::Service => visitor.meet_service(model, id),
        NodeKind::Var => visitor.meet_var(model, id),
        NodeKind::ValueConstant => visitor.meet_value_constant(model, id),
        NodeKind::FunctionCall => visitor.meet_function_call(model, id),
        NodeKind::Compare => visitor.meet_compare(model, id),
        NodeKind::And => visitor.meet_and(model, id),
        NodeKind::Or => visitor.meet_or(model, id),
        NodeKind::Not => visitor.meet_not(model, id),
        NodeKind::Exists => visitor.meet_exists(model, id),
        NodeKind::Coalesce => visitor.meet_coalesce(model, id),
        NodeKind::Modify => visitor.meet_modify(model, id),
    }
}

/// Dispatch `id` to the handler of its structural category. Roots and
/// leaves go straight to [`QueryModelVisitor::meet_node`].
pub fn visit_category<V: QueryModelVisitor + ?Sized>(
    model: &mut QueryModel,
    id: NodeId,
    visitor: &mut V,
) -> Result<(), V::Error> {
    match model.category(id) {
        Some(NodeCategory::UnaryTuple) => visitor.meet_unary_tuple_operator(model, id),
        Some(NodeCategory::BinaryTuple) => visitor.meet_binary_tuple_operator(model, id),
        Some(NodeCategory::NaryTuple) => visitor.meet_nary_tuple_operator(model, id),
        Some(NodeCategory::UnaryValue) => visitor.meet_unary_value_operator(model, id),
        Some(NodeCategory::BinaryValue) => visitor.meet_binary_value_operator(model, id),
        Some(NodeCategory::NaryValue) => visitor.meet_nary_value_operator(model, id),
        Some(NodeCategory::SubQueryValue) => visitor.meet_sub_query_value_operator(model, id),
        Some(NodeCategory::Update) => visitor.meet_update_expr(model, id),
        Some(NodeCategory::Root | NodeCategory::Leaf) | None => visitor.meet_node(model, id),
    }
}

/// Visit the children of `id` in slot order.
///
/// The child list is snapshotted first; a child that an earlier sibling's
/// handler removed or moved elsewhere is skipped.
pub fn visit_children<V: QueryModelVisitor + ?Sized>(
    model: &mut QueryModel,
    id: NodeId,
    visitor: &mut V,
) -> Result<(), V::Error> {
    for child in model.children(id) {
        if model.parent(child) == Some(id) {
            visit(model, child, visitor)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::algebra::Node;
    use crate::graph::Term;

    /// Records the order in which handlers fire.
    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl QueryModelVisitor for Recorder {
        type Error = Infallible;

        fn meet_binary_tuple_operator(
            &mut self,
            model: &mut QueryModel,
            id: NodeId,
        ) -> Result<(), Infallible> {
            self.log.push(format!("binary:{}", model.kind(id).map_or("?", |k| k.name())));
            visit_children(model, id, self)
        }

        fn meet_statement_pattern(
            &mut self,
            _: &mut QueryModel,
            _: NodeId,
        ) -> Result<(), Infallible> {
            self.log.push("pattern".into());
            Ok(())
        }

        fn meet_node(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Infallible> {
            self.log.push(format!("node:{}", model.kind(id).map_or("?", |k| k.name())));
            visit_children(model, id, self)
        }
    }

    fn pattern(m: &mut QueryModel, s: &str) -> NodeId {
        let s = m.var_node(s);
        let p = m.constant(Term::iri("http://ex/p"));
        let o = m.var_node("o");
        m.pattern(s, p, o)
    }

    #[test]
    fn pre_order_with_category_fallback() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let union = m.union(a, b);
        let x = m.var_node("x");
        let call = m.function_call("http://ex/f", vec![x]);
        let filter = m.filter(union, call);
        let root = m.set_root(filter);

        let mut rec = Recorder::default();
        visit(&mut m, root, &mut rec).unwrap();
        assert_eq!(
            rec.log,
            vec![
                "node:QueryRoot",
                "node:Filter",
                "binary:Union",
                "pattern",
                "pattern",
                "node:FunctionCall",
                "node:Var",
            ]
        );
    }

    /// Names the category handler each node reaches.
    #[derive(Default)]
    struct CategoryRecorder {
        log: Vec<(&'static str, &'static str)>,
    }

    impl CategoryRecorder {
        fn record(&mut self, model: &mut QueryModel, id: NodeId, category: &'static str) {
            let kind = model.kind(id).map_or("?", |k| k.name());
            self.log.push((kind, category));
            let _ = visit_children(model, id, self);
        }
    }

    impl QueryModelVisitor for CategoryRecorder {
        type Error = Infallible;

        fn meet_unary_tuple_operator(
            &mut self,
            model: &mut QueryModel,
            id: NodeId,
        ) -> Result<(), Infallible> {
            self.record(model, id, "unary-tuple");
            Ok(())
        }

        fn meet_nary_tuple_operator(
            &mut self,
            model: &mut QueryModel,
            id: NodeId,
        ) -> Result<(), Infallible> {
            self.record(model, id, "nary-tuple");
            Ok(())
        }

        fn meet_unary_value_operator(
            &mut self,
            model: &mut QueryModel,
            id: NodeId,
        ) -> Result<(), Infallible> {
            self.record(model, id, "unary-value");
            Ok(())
        }

        fn meet_node(&mut self, model: &mut QueryModel, id: NodeId) -> Result<(), Infallible> {
            self.record(model, id, "node");
            Ok(())
        }
    }

    #[test]
    fn category_handlers_follow_node_category() {
        // Filter(TupleFunctionCall(?x -> ?y), NOT ?x)
        let mut m = QueryModel::new();
        let x = m.var_node("x");
        let y = m.var_node("y");
        let call = m.add(Node::TupleFunctionCall {
            uri: "http://ex/t".into(),
            args: vec![x],
            result_vars: vec![y],
        });
        let flag = m.var_node("x");
        let not = m.add(Node::Not { arg: flag });
        let filter = m.filter(call, not);

        let mut rec = CategoryRecorder::default();
        visit(&mut m, filter, &mut rec).unwrap();
        assert_eq!(
            rec.log,
            vec![
                ("Filter", "unary-tuple"),
                ("TupleFunctionCall", "nary-tuple"),
                ("Var", "node"),
                ("Var", "node"),
                ("Not", "unary-value"),
                ("Var", "node"),
            ]
        );
    }

    /// Removes the right sibling while visiting the left one.
    struct SiblingRemover {
        victim: NodeId,
        seen: Vec<NodeId>,
    }

    impl QueryModelVisitor for SiblingRemover {
        type Error = crate::error::AlgebraError;

        fn meet_statement_pattern(
            &mut self,
            model: &mut QueryModel,
            id: NodeId,
        ) -> Result<(), Self::Error> {
            self.seen.push(id);
            if model.contains(self.victim) && id != self.victim {
                model.replace_with(self.victim, None)?;
            }
            Ok(())
        }
    }

    #[test]
    fn removed_siblings_are_skipped() {
        let mut m = QueryModel::new();
        let a = pattern(&mut m, "a");
        let b = pattern(&mut m, "b");
        let c = pattern(&mut m, "c");
        let inner = m.join(b, c);
        let outer = m.join(a, inner);
        let root = m.set_root(outer);

        let mut v = SiblingRemover { victim: inner, seen: vec![] };
        visit(&mut m, root, &mut v).unwrap();
        assert_eq!(v.seen, vec![a]);
        assert!(!m.contains(b));
    }
}
