use crate::query::ast::{Branch, Leaf, QueryNode};

/// Human-readable form of a query tree, for logs and diagnostics.
pub fn render(node: &QueryNode) -> String {
    match node {
        QueryNode::Leaf(leaf) => render_leaf(leaf),
        QueryNode::Branch(branch) => render_branch(branch),
    }
}

pub fn render_leaf(leaf: &Leaf) -> String {
    let text = format!("{}:\"{}\"", leaf.field.name(), leaf.phrase);
    if leaf.negated {
        format!("NOT ( {} )", text)
    } else {
        text
    }
}

/// A branch with one child renders as that child; with several, every
/// child holding more than one term is parenthesized.
pub fn render_branch(branch: &Branch) -> String {
    let joined = match branch.children.as_slice() {
        [] => return String::new(),
        [only] => render(only),
        children => children
            .iter()
            .map(|child| {
                let text = render(child);
                if child.term_count() > 1 {
                    format!("( {} )", text)
                } else {
                    text
                }
            })
            .collect::<Vec<_>>()
            .join(branch.op.token()),
    };

    if branch.negated {
        format!("NOT ( {} )", joined)
    } else {
        joined
    }
}
