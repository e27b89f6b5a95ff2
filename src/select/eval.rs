//! Selector evaluation
//!
//! The document is flattened into a preorder arena once; selectors are then
//! matched right to left against each node, following parent links for the
//! combinators.

use serde_json::Value;

use super::{Combinator, Complex, Compound, Kind, Literal, Pseudo, Selector};

struct Node<'a> {
    value: &'a Value,
    key: Option<&'a str>,
    parent: Option<usize>,
    children: Vec<usize>,
    /// 1-based position among array elements
    position: Option<usize>,
    siblings: usize,
}

struct Tree<'a> {
    nodes: Vec<Node<'a>>,
}

pub(super) fn select<'a>(selector: &Selector, document: &'a Value) -> Vec<&'a Value> {
    let tree = Tree::new(document);
    let mut matches = Vec::new();
    for id in 0..tree.nodes.len() {
        for complex in &selector.groups {
            if tree.matches_step(id, complex, complex.rest.len()) {
                matches.push(tree.nodes[id].value);
            }
        }
    }
    matches
}

impl<'a> Tree<'a> {
    fn new(root: &'a Value) -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.push(root, None, None, None, 0);
        tree
    }

    fn push(
        &mut self,
        value: &'a Value,
        key: Option<&'a str>,
        parent: Option<usize>,
        position: Option<usize>,
        siblings: usize,
    ) {
        let id = self.nodes.len();
        self.nodes.push(Node {
            value,
            key,
            parent,
            children: Vec::new(),
            position,
            siblings,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }

        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    self.push(v, Some(k.as_str()), Some(id), None, map.len());
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    self.push(v, None, Some(id), Some(i + 1), items.len());
                }
            }
            _ => {}
        }
    }

    /// Does node `id` match step `k` of `complex`, with every earlier step
    /// satisfied through the combinators?
    fn matches_step(&self, id: usize, complex: &Complex, k: usize) -> bool {
        let compound = if k == 0 {
            &complex.first
        } else {
            &complex.rest[k - 1].1
        };
        if !self.matches_compound(id, compound) {
            return false;
        }
        if k == 0 {
            return true;
        }

        let parent = self.nodes[id].parent;
        match complex.rest[k - 1].0 {
            Combinator::Child => parent.is_some_and(|p| self.matches_step(p, complex, k - 1)),
            Combinator::Descendant => {
                let mut ancestor = parent;
                while let Some(p) = ancestor {
                    if self.matches_step(p, complex, k - 1) {
                        return true;
                    }
                    ancestor = self.nodes[p].parent;
                }
                false
            }
            Combinator::Sibling => parent.is_some_and(|p| {
                self.nodes[p]
                    .children
                    .iter()
                    .any(|&s| s != id && self.matches_step(s, complex, k - 1))
            }),
        }
    }

    fn matches_compound(&self, id: usize, compound: &Compound) -> bool {
        let node = &self.nodes[id];
        if let Some(kind) = compound.kind {
            if !kind_matches(kind, node.value) {
                return false;
            }
        }
        if let Some(key) = &compound.key {
            if node.key != Some(key.as_str()) {
                return false;
            }
        }
        compound.pseudos.iter().all(|p| self.matches_pseudo(node, p))
    }

    fn matches_pseudo(&self, node: &Node<'a>, pseudo: &Pseudo) -> bool {
        match pseudo {
            Pseudo::Root => node.parent.is_none(),
            // Evaluated with the node as the root; `:root` inside refers to it
            Pseudo::Has(inner) => !select(inner, node.value).is_empty(),
            Pseudo::Val(Literal::String(s)) => node.value.as_str() == Some(s.as_str()),
            Pseudo::Val(Literal::Number(n)) => node
                .value
                .as_number()
                .and_then(|v| v.as_f64())
                .is_some_and(|v| v == *n),
            Pseudo::Contains(needle) => node
                .value
                .as_str()
                .is_some_and(|s| s.contains(needle.as_str())),
            Pseudo::FirstChild => node.position == Some(1),
            Pseudo::LastChild => node.position == Some(node.siblings),
            Pseudo::OnlyChild => node.position.is_some() && node.siblings == 1,
            Pseudo::Empty => match node.value {
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
            Pseudo::NthChild(nth) => node.position.is_some_and(|p| nth.matches(p)),
            Pseudo::NthLastChild(nth) => node
                .position
                .is_some_and(|p| nth.matches(node.siblings - p + 1)),
        }
    }
}

fn kind_matches(kind: Kind, value: &Value) -> bool {
    match kind {
        Kind::Object => value.is_object(),
        Kind::Array => value.is_array(),
        Kind::String => value.is_string(),
        Kind::Number => value.is_number(),
        Kind::Boolean => value.is_boolean(),
        Kind::Null => value.is_null(),
    }
}
