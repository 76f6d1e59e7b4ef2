//! Native tree-ensemble classifier loaded from JSON.
//!
//! Two aggregation schemes cover the ensembles exported by the training
//! notebooks:
//!
//! - `average`: random-forest style. Leaves hold class counts or fractions;
//!   each tree's leaf is normalized and the trees are averaged.
//! - `softmax`: gradient-boosting style. Leaves hold per-class margins that
//!   are summed over trees on top of `base_score`, then passed through a
//!   softmax.
//!
//! Splits send a sample left when `x[feature] <= threshold`.

use crate::error::{PipelineError, PipelineResult};
use crate::models::calibration::softmax;
use crate::models::classifier::Classifier;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root to a leaf. Children always follow their parent in
    /// `nodes` (checked on load), so the walk terminates.
    fn leaf(&self, features: &[f32]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if f64::from(features[*feature]) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeAggregation {
    Average,
    Softmax,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    n_features: usize,
    n_classes: usize,
    aggregation: TreeAggregation,
    #[serde(default)]
    base_score: Vec<f64>,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Parse and validate a JSON tree ensemble.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let ensemble: TreeEnsemble = serde_json::from_str(json)
            .map_err(|e| PipelineError::config(format!("malformed tree ensemble: {}", e)))?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
            .map_err(|e| PipelineError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn aggregation(&self) -> TreeAggregation {
        self.aggregation
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.n_classes < 2 {
            return Err(PipelineError::config("tree ensemble needs at least 2 classes"));
        }
        if self.trees.is_empty() {
            return Err(PipelineError::config("tree ensemble has no trees"));
        }
        if !self.base_score.is_empty() && self.base_score.len() != self.n_classes {
            return Err(PipelineError::config(format!(
                "base_score has {} entries for {} classes",
                self.base_score.len(),
                self.n_classes
            )));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(PipelineError::config(format!("tree {} has no nodes", t)));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return Err(PipelineError::config(format!(
                                "tree {} node {} splits on feature {} of {}",
                                t, i, feature, self.n_features
                            )));
                        }
                        if !threshold.is_finite() {
                            return Err(PipelineError::config(format!(
                                "tree {} node {} has a non-finite threshold",
                                t, i
                            )));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(PipelineError::config(format!(
                                    "tree {} node {} has invalid child {}",
                                    t, i, child
                                )));
                            }
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.len() != self.n_classes || value.iter().any(|v| !v.is_finite()) {
                            return Err(PipelineError::config(format!(
                                "tree {} leaf {} must hold {} finite values",
                                t, i, self.n_classes
                            )));
                        }
                        if self.aggregation == TreeAggregation::Average
                            && (value.iter().any(|v| *v < 0.0) || value.iter().sum::<f64>() <= 0.0)
                        {
                            return Err(PipelineError::config(format!(
                                "tree {} leaf {} is not a class distribution",
                                t, i
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl Classifier for TreeEnsemble {
    fn backend(&self) -> &'static str {
        "trees"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn n_classes(&self) -> Option<usize> {
        Some(self.n_classes)
    }

    fn predict_proba(&self, features: &[f32]) -> PipelineResult<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(PipelineError::scoring(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        match self.aggregation {
            TreeAggregation::Average => {
                let mut proba = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    let leaf = tree.leaf(features);
                    let total: f64 = leaf.iter().sum();
                    for (p, v) in proba.iter_mut().zip(leaf) {
                        *p += v / total;
                    }
                }
                let n = self.trees.len() as f64;
                proba.iter_mut().for_each(|p| *p /= n);
                Ok(proba)
            }
            TreeAggregation::Softmax => {
                let mut margins = if self.base_score.is_empty() {
                    vec![0.0; self.n_classes]
                } else {
                    self.base_score.clone()
                };
                for tree in &self.trees {
                    for (m, v) in margins.iter_mut().zip(tree.leaf(features)) {
                        *m += v;
                    }
                }
                Ok(softmax(&margins))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREST: &str = r#"{
        "n_features": 2, "n_classes": 2, "aggregation": "average",
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                {"value": [8.0, 2.0]},
                {"value": [1.0, 3.0]}
            ]},
            {"nodes": [
                {"feature": 1, "threshold": -1.0, "left": 1, "right": 2},
                {"value": [0.0, 1.0]},
                {"value": [1.0, 0.0]}
            ]}
        ]
    }"#;

    const BOOSTED: &str = r#"{
        "n_features": 1, "n_classes": 3, "aggregation": "softmax",
        "base_score": [0.5, 0.5, 0.5],
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 0.0, "left": 1, "right": 2},
                {"value": [2.0, 0.0, 0.0]},
                {"value": [0.0, 0.0, 2.0]}
            ]},
            {"nodes": [{"value": [0.0, 1.0, 0.0]}]}
        ]
    }"#;

    #[test]
    fn test_average_aggregation() {
        let forest = TreeEnsemble::from_json(FOREST).unwrap();

        // Tree 1 -> [0.8, 0.2], tree 2 -> [1.0, 0.0]
        let proba = forest.predict_proba(&[0.2, 3.0]).unwrap();
        assert!((proba[0] - 0.9).abs() < 1e-12);
        assert!((proba[1] - 0.1).abs() < 1e-12);

        // Threshold is inclusive on the left
        let proba = forest.predict_proba(&[0.5, -1.0]).unwrap();
        assert!((proba[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_aggregation() {
        let boosted = TreeEnsemble::from_json(BOOSTED).unwrap();

        let proba = boosted.predict_proba(&[-1.0]).unwrap();
        let expected = softmax(&[2.5, 1.5, 0.5]);
        for (p, e) in proba.iter().zip(&expected) {
            assert!((p - e).abs() < 1e-12);
        }
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_width_is_scoring_error() {
        let forest = TreeEnsemble::from_json(FOREST).unwrap();
        let err = forest.predict_proba(&[1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Scoring(_)));
    }

    #[test]
    fn test_cyclic_tree_rejected() {
        let json = r#"{
            "n_features": 1, "n_classes": 2, "aggregation": "average",
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.0, "left": 0, "right": 1},
                {"value": [1.0, 1.0]}
            ]}]
        }"#;
        assert!(TreeEnsemble::from_json(json).is_err());
    }

    #[test]
    fn test_leaf_width_rejected() {
        let json = r#"{
            "n_features": 1, "n_classes": 3, "aggregation": "softmax",
            "trees": [{"nodes": [{"value": [1.0, 1.0]}]}]
        }"#;
        let err = TreeEnsemble::from_json(json).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
