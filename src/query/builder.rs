use std::sync::Arc;
use crate::analysis::normalizer::Normalizer;
use crate::core::types::{FieldSlot, WILDCARD_FIELD};
use crate::query::ast::{BoolOp, Branch, QueryNode};
use crate::query::compiler;
use crate::query::render;
use crate::storage::engine::NativeQuery;

/// Builds a boolean query tree from `(field, value)` criteria.
///
/// Values are split into words exactly like indexed text, but each word
/// becomes one leaf; no partial n-grams are generated here.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    root: Branch,
    normalizer: Arc<Normalizer>,
}

impl QueryBuilder {
    pub fn new(op: BoolOp, normalizer: Arc<Normalizer>) -> Self {
        QueryBuilder {
            root: Branch::new(op),
            normalizer,
        }
    }

    /// Add a criterion. Unknown fields and values too short to have been
    /// indexed leave the tree unchanged.
    pub fn add(&mut self, field_name: &str, raw_value: &str, negate: bool) -> &mut Self {
        if let Some(node) = self.parse(field_name, raw_value, negate) {
            self.root.push(node);
        }
        self
    }

    /// Merge a pre-built subtree as one child of the root.
    pub fn add_subtree(&mut self, subtree: QueryNode) -> &mut Self {
        self.root.push(subtree);
        self
    }

    pub fn root(&self) -> &Branch {
        &self.root
    }

    pub fn term_count(&self) -> usize {
        self.root.term_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn compile(&self) -> NativeQuery {
        compiler::compile_branch(&self.root)
    }

    pub fn render(&self) -> String {
        render::render_branch(&self.root)
    }

    pub fn into_node(self) -> QueryNode {
        QueryNode::Branch(self.root)
    }

    fn parse(&self, field_name: &str, raw_value: &str, negate: bool) -> Option<QueryNode> {
        if field_name == WILDCARD_FIELD {
            let mut any = Branch::new(BoolOp::Or);
            for slot in FieldSlot::searchable() {
                if let Some(node) = self.parse_slot(slot, raw_value, false) {
                    any.push(node);
                }
            }
            return negated(any, negate);
        }

        let slot = FieldSlot::from_header(field_name)?;
        if !slot.is_indexable() {
            return uid_leaf(raw_value, negate);
        }
        self.parse_slot(slot, raw_value, negate)
    }

    fn parse_slot(&self, slot: FieldSlot, raw_value: &str, negate: bool) -> Option<QueryNode> {
        let cleaned = self.normalizer.clean(raw_value);
        if !self.normalizer.is_indexable(&cleaned) {
            return None;
        }

        // Split right to left, then restore reading order for the leaves.
        let mut words: Vec<&str> = self.normalizer.split_words(&cleaned).collect();
        words.reverse();

        let mut all = Branch::new(BoolOp::And);
        for word in words {
            if let Some(term) = self.normalizer.query_term(slot, word) {
                all.push(QueryNode::leaf(slot, term, false));
            }
        }
        negated(all, negate)
    }
}

/// An identifier criterion names the exact `Q<id>` key; no length rules apply.
fn uid_leaf(raw_value: &str, negate: bool) -> Option<QueryNode> {
    let id: u64 = raw_value.trim().parse().ok()?;
    Some(QueryNode::leaf(FieldSlot::Uid, id.to_string(), negate))
}

/// Collapse a one-leaf branch into the leaf and apply negation.
fn negated(mut branch: Branch, negate: bool) -> Option<QueryNode> {
    match branch.children.len() {
        0 => None,
        1 => match branch.children.pop() {
            Some(QueryNode::Leaf(mut leaf)) => {
                leaf.negated ^= negate;
                Some(QueryNode::Leaf(leaf))
            }
            Some(node) => {
                branch.children.push(node);
                branch.negated = negate;
                Some(branch.into())
            }
            None => None,
        },
        _ => {
            branch.negated = negate;
            Some(branch.into())
        }
    }
}
