//! Decision tree structures for the booster
//!
//! Trees are stored as flat node vectors; node 0 is the root.

use serde::{Deserialize, Serialize};

/// How an internal node routes a feature value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitRule {
    /// Go left when `value <= threshold`; missing (`NaN`) goes right
    Numeric { threshold: f64 },

    /// Go left when the category code is in `left` (sorted ascending);
    /// missing and unseen categories go right
    Categorical { left: Vec<u32> },
}

impl SplitRule {
    pub fn goes_left(&self, value: f64) -> bool {
        match self {
            SplitRule::Numeric { threshold } => value <= *threshold,
            SplitRule::Categorical { left } => {
                if value.is_nan() || value < 0.0 {
                    return false;
                }
                left.binary_search(&(value as u32)).is_ok()
            }
        }
    }
}

/// A decision tree node (internal or leaf)
///
/// For internal nodes `rule` is set and `left`/`right` index child nodes.
/// For leaf nodes `leaf` holds the already-shrunk output value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Feature index to split on (unused for leaves)
    pub feature_idx: usize,

    pub rule: Option<SplitRule>,

    pub left: usize,

    pub right: usize,

    /// Loss reduction achieved by this split
    pub gain: f64,

    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(feature_idx: usize, rule: SplitRule, gain: f64) -> Self {
        Self {
            feature_idx,
            rule: Some(rule),
            left: 0,
            right: 0,
            gain,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(value: f64) -> Self {
        Self {
            feature_idx: 0,
            rule: None,
            left: 0,
            right: 0,
            gain: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.rule.is_none()
    }
}

/// A single regression tree fitted to gradients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on one row of features
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            let Some(rule) = &node.rule else {
                return node.leaf.unwrap_or(0.0);
            };

            let value = features.get(node.feature_idx).copied().unwrap_or(f64::NAN);
            idx = if rule.goes_left(value) {
                node.left
            } else {
                node.right
            };
        }
    }

    /// Number of internal nodes
    pub fn split_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_leaf()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(rule: SplitRule) -> Tree {
        let mut root = Node::internal(0, rule, 1.0);
        root.left = 1;
        root.right = 2;
        Tree::new(vec![root, Node::leaf(-1.0), Node::leaf(1.0)])
    }

    #[test]
    fn test_numeric_split() {
        let tree = stump(SplitRule::Numeric { threshold: 5.0 });

        assert_eq!(tree.evaluate(&[4.0]), -1.0);
        assert_eq!(tree.evaluate(&[5.0]), -1.0);
        assert_eq!(tree.evaluate(&[5.5]), 1.0);
        assert_eq!(tree.evaluate(&[f64::NAN]), 1.0);
    }

    #[test]
    fn test_categorical_split() {
        let tree = stump(SplitRule::Categorical { left: vec![1, 3] });

        assert_eq!(tree.evaluate(&[1.0]), -1.0);
        assert_eq!(tree.evaluate(&[3.0]), -1.0);
        assert_eq!(tree.evaluate(&[2.0]), 1.0);
        // unseen category
        assert_eq!(tree.evaluate(&[99.0]), 1.0);
        assert_eq!(tree.evaluate(&[f64::NAN]), 1.0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let tree = Tree::new(vec![Node::leaf(0.25)]);
        assert_eq!(tree.evaluate(&[]), 0.25);
        assert_eq!(tree.split_count(), 0);
    }

    #[test]
    fn test_serde_roundtrip_keeps_rule() {
        let tree = stump(SplitRule::Categorical { left: vec![0, 2] });
        let json = serde_json::to_string(&tree).unwrap();
        let restored: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, restored);
    }
}
