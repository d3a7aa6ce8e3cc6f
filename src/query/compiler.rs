use crate::query::ast::{BoolOp, Branch, Leaf, QueryNode};
use crate::storage::engine::NativeQuery;

/// Translate a query tree into the storage engine's query.
pub fn compile(node: &QueryNode) -> NativeQuery {
    match node {
        QueryNode::Leaf(leaf) => compile_leaf(leaf),
        QueryNode::Branch(branch) => compile_branch(branch),
    }
}

pub fn compile_leaf(leaf: &Leaf) -> NativeQuery {
    let phrase = NativeQuery::phrase(leaf.field.prefix(), &leaf.phrase);
    if leaf.negated {
        NativeQuery::complement(phrase)
    } else {
        phrase
    }
}

/// Children are folded left to right; no children means match nothing.
pub fn compile_branch(branch: &Branch) -> NativeQuery {
    let mut children = branch.children.iter().map(compile);

    let Some(first) = children.next() else {
        return NativeQuery::MatchNothing;
    };

    let folded = children.fold(first, |acc, next| match branch.op {
        BoolOp::Or => acc.or(next),
        BoolOp::And => acc.and(next),
        BoolOp::AndNot => acc.and_not(next),
    });

    if branch.negated {
        NativeQuery::complement(folded)
    } else {
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldSlot;

    #[test]
    fn empty_branch_matches_nothing() {
        assert_eq!(compile_branch(&Branch::new(BoolOp::And)), NativeQuery::MatchNothing);
        assert_eq!(compile_branch(&Branch::new(BoolOp::Or)), NativeQuery::MatchNothing);
    }

    #[test]
    fn one_child_branch_equals_bare_leaf() {
        let leaf = QueryNode::leaf(FieldSlot::Subject, "hello", false);
        let mut wrapped = Branch::new(BoolOp::And);
        wrapped.push(leaf.clone());

        assert_eq!(compile(&wrapped.into()), compile(&leaf));
    }

    #[test]
    fn negated_leaf_is_a_complement() {
        let leaf = QueryNode::leaf(FieldSlot::From, "alice", true);
        assert_eq!(
            compile(&leaf),
            NativeQuery::complement(NativeQuery::phrase("A", "alice"))
        );
    }

    #[test]
    fn children_fold_left_to_right() {
        let mut branch = Branch::new(BoolOp::AndNot);
        branch.push(QueryNode::leaf(FieldSlot::Body, "aaa", false));
        branch.push(QueryNode::leaf(FieldSlot::Body, "bbb", false));
        branch.push(QueryNode::leaf(FieldSlot::Body, "ccc", false));

        let expected = NativeQuery::phrase("XBDY", "aaa")
            .and_not(NativeQuery::phrase("XBDY", "bbb"))
            .and_not(NativeQuery::phrase("XBDY", "ccc"));
        assert_eq!(compile_branch(&branch), expected);
    }

    #[test]
    fn negated_branch_complements_the_fold() {
        let mut branch = Branch::new(BoolOp::And);
        branch.push(QueryNode::leaf(FieldSlot::To, "bob", false));
        branch.push(QueryNode::leaf(FieldSlot::To, "smith", false));
        branch.negated = true;

        let expected = NativeQuery::complement(
            NativeQuery::phrase("XTO", "bob").and(NativeQuery::phrase("XTO", "smith")),
        );
        assert_eq!(compile_branch(&branch), expected);
    }
}
