use serde::{Serialize, Deserialize};
use crate::core::types::FieldSlot;

/// Operator used to fold the children of a branch, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    Or,
    And,
    AndNot,
}

impl BoolOp {
    pub fn token(&self) -> &'static str {
        match self {
            BoolOp::Or => " OR ",
            BoolOp::And => " AND ",
            BoolOp::AndNot => " AND NOT ",
        }
    }
}

/// A single normalized word scoped to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub field: FieldSlot,
    pub phrase: String,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub op: BoolOp,
    pub negated: bool,
    pub children: Vec<QueryNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryNode {
    Leaf(Leaf),
    Branch(Branch),
}

impl Branch {
    pub fn new(op: BoolOp) -> Self {
        Branch {
            op,
            negated: false,
            children: Vec::new(),
        }
    }

    /// Append a child; empty branches and exact duplicates are ignored.
    pub fn push(&mut self, child: QueryNode) -> bool {
        if child.is_empty() || self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    pub fn term_count(&self) -> usize {
        self.children.iter().map(QueryNode::term_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl QueryNode {
    pub fn leaf(field: FieldSlot, phrase: impl Into<String>, negated: bool) -> Self {
        QueryNode::Leaf(Leaf {
            field,
            phrase: phrase.into(),
            negated,
        })
    }

    /// Number of leaves in the subtree.
    pub fn term_count(&self) -> usize {
        match self {
            QueryNode::Leaf(_) => 1,
            QueryNode::Branch(branch) => branch.term_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.term_count() == 0
    }
}

impl From<Branch> for QueryNode {
    fn from(branch: Branch) -> Self {
        QueryNode::Branch(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_skips_duplicates_and_empty_branches() {
        let mut root = Branch::new(BoolOp::Or);
        assert!(root.push(QueryNode::leaf(FieldSlot::Subject, "hello", false)));
        assert!(!root.push(QueryNode::leaf(FieldSlot::Subject, "hello", false)));
        assert!(root.push(QueryNode::leaf(FieldSlot::Subject, "hello", true)));
        assert!(!root.push(Branch::new(BoolOp::And).into()));
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn term_count_is_recursive() {
        let mut inner = Branch::new(BoolOp::And);
        inner.push(QueryNode::leaf(FieldSlot::Body, "abc", false));
        inner.push(QueryNode::leaf(FieldSlot::Body, "def", false));

        let mut root = Branch::new(BoolOp::Or);
        root.push(inner.into());
        root.push(QueryNode::leaf(FieldSlot::To, "bob", false));

        assert_eq!(root.term_count(), 3);
    }
}
