//! Symmetric ("oblivious") decision trees as exported by CatBoost.
//!
//! Every level of a tree uses the same split, so a tree of depth `d` is just
//! `d` (feature, border) pairs plus `2^d` leaf values. Bit `i` of the leaf
//! index is set when `x[feature_i] > border_i`.

use serde::{Deserialize, Serialize};

use super::{check_width, checked_probability, sigmoid};
use crate::ports::{Classifier, ModelError};

/// Deepest tree accepted from an export (CatBoost caps depth at 16).
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeSplit {
    pub feature: usize,
    pub border: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<TreeSplit>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, features: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |idx, (depth, split)| {
                if features[split.feature] > split.border {
                    idx | (1 << depth)
                } else {
                    idx
                }
            })
    }

    fn evaluate(&self, features: &[f64]) -> f64 {
        self.leaf_values[self.leaf_index(features)]
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Additive ensemble: `raw = scale * sum(tree leaves) + bias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObliviousTreeEnsemble {
    pub feature_names: Vec<String>,
    pub trees: Vec<ObliviousTree>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl ObliviousTreeEnsemble {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        let n = self.feature_names.len();
        if !self.bias.is_finite() || !self.scale.is_finite() {
            return Err(ModelError::Invalid("non-finite bias or scale".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            let depth = tree.splits.len();
            if depth > MAX_DEPTH {
                return Err(ModelError::Invalid(format!(
                    "tree {t} has depth {depth}, max {MAX_DEPTH}"
                )));
            }
            if tree.leaf_values.len() != 1 << depth {
                return Err(ModelError::Invalid(format!(
                    "tree {t} has {} leaves, depth {depth} needs {}",
                    tree.leaf_values.len(),
                    1usize << depth
                )));
            }
            if let Some(split) = tree.splits.iter().find(|s| s.feature >= n) {
                return Err(ModelError::Invalid(format!(
                    "tree {t} splits on feature {} of {n}",
                    split.feature
                )));
            }
            if tree.leaf_values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::Invalid(format!("tree {t} has non-finite leaf")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        self.scale * sum + self.bias
    }
}

impl Classifier for ObliviousTreeEnsemble {
    fn kind(&self) -> &'static str {
        "oblivious_trees"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_width(self.feature_names.len(), features)?;
        let raw = self.raw_score(features);
        tracing::trace!(raw, trees = self.trees.len(), "ensemble raw score");
        checked_probability(sigmoid(raw))
    }
}
