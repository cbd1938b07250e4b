//! Pre-trained regression artifacts.
//!
//! The forecaster treats the model as an opaque `predict(features)` function.
//! Models are trained offline and shipped as JSON; two kinds are supported:
//!
//! - `linear`: `y = intercept + Σ coefficient_j * x_j`
//! - `tree_ensemble`: gradient-boosted regression trees, `y = base_score +
//!   Σ tree(x)`; a split sends `x[feature] <= threshold` to the left child
//!
//! Every artifact lists the feature names it was trained on. They must match
//! [`FEATURE_COLUMNS`] exactly, in order, or loading fails.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::TrendError;
use crate::features::FEATURE_COLUMNS;

/// Anything that maps a `rows x features` matrix to one prediction per row.
pub trait Regressor {
    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

/// A tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl ModelArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(_) => "linear",
            ModelArtifact::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::Linear(m) => &m.feature_names,
            ModelArtifact::TreeEnsemble(m) => &m.feature_names,
        }
    }

    /// Check the artifact against the feature contract and its own structure.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names() != FEATURE_COLUMNS {
            return Err(format!(
                "feature names {:?} do not match the expected {:?}",
                self.feature_names(),
                FEATURE_COLUMNS
            ));
        }

        match self {
            ModelArtifact::Linear(m) => {
                if m.coefficients.len() != FEATURE_COLUMNS.len() {
                    return Err(format!(
                        "expected {} coefficients, found {}",
                        FEATURE_COLUMNS.len(),
                        m.coefficients.len()
                    ));
                }
                if !m.intercept.is_finite() || m.coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("non-finite linear parameters".to_string());
                }
            }
            ModelArtifact::TreeEnsemble(m) => {
                if !m.base_score.is_finite() {
                    return Err("non-finite base_score".to_string());
                }
                for (t, tree) in m.trees.iter().enumerate() {
                    tree.validate().map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }
        Ok(())
    }
}

impl RegressionTree {
    /// Children must point forward in the node list, which rules out cycles.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COLUMNS.len() {
                        return Err(format!("node {idx}: feature index {feature} out of range"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx}: NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx}: invalid child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx}: non-finite leaf value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

fn check_width(features: &DMatrix<f64>) -> Result<(), TrendError> {
    if features.ncols() != FEATURE_COLUMNS.len() {
        return Err(TrendError::Prediction(format!(
            "expected {} feature columns, got {}",
            FEATURE_COLUMNS.len(),
            features.ncols()
        )));
    }
    Ok(())
}

impl Regressor for LinearModel {
    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError> {
        check_width(features)?;
        let beta = DVector::from_column_slice(&self.coefficients);
        let y = features * beta;
        Ok(y.iter().map(|v| v + self.intercept).collect())
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError> {
        check_width(features)?;
        let out = features
            .row_iter()
            .map(|row| {
                let x: Vec<f64> = row.iter().copied().collect();
                self.base_score + self.trees.iter().map(|t| t.evaluate(&x)).sum::<f64>()
            })
            .collect();
        Ok(out)
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError> {
        match self {
            ModelArtifact::Linear(m) => m.predict(features),
            ModelArtifact::TreeEnsemble(m) => m.predict(features),
        }
    }
}

/// Load and validate a model artifact.
pub fn load_model(path: &Path) -> Result<ModelArtifact, TrendError> {
    let load_err = |reason: String| TrendError::ModelLoad {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
    let model: ModelArtifact =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| load_err(format!("invalid model JSON: {e}")))?;
    model.validate().map_err(load_err)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn names() -> Vec<String> {
        FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
    }

    fn write_model(value: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    #[test]
    fn linear_model_predicts_dot_product_plus_intercept() {
        let model = LinearModel {
            feature_names: names(),
            intercept: 1.0,
            coefficients: vec![0.5, 0.0, 0.0, 0.1, 10.0],
        };
        let x = DMatrix::from_row_slice(2, 5, &[2.0, 3.0, 1.0, 10.0, 0.0, 6.0, 3.0, 1.0, 20.0, 1.0]);
        let y = model.predict(&x).unwrap();
        assert!((y[0] - 3.0).abs() < 1e-12);
        assert!((y[1] - 16.0).abs() < 1e-12);
    }

    #[test]
    fn tree_ensemble_sums_leaves_over_base_score() {
        // Weekend split on column 4, then a day-of-month split on column 3.
        let ensemble = TreeEnsemble {
            feature_names: names(),
            base_score: 10.0,
            trees: vec![
                RegressionTree {
                    nodes: vec![
                        TreeNode::Split { feature: 4, threshold: 0.5, left: 1, right: 2 },
                        TreeNode::Leaf { value: 1.0 },
                        TreeNode::Leaf { value: 5.0 },
                    ],
                },
                RegressionTree {
                    nodes: vec![
                        TreeNode::Split { feature: 3, threshold: 15.0, left: 1, right: 2 },
                        TreeNode::Leaf { value: -2.0 },
                        TreeNode::Leaf { value: 2.0 },
                    ],
                },
            ],
        };
        let x = DMatrix::from_row_slice(2, 5, &[0.0, 1.0, 1.0, 15.0, 0.0, 6.0, 1.0, 1.0, 16.0, 1.0]);
        assert_eq!(ensemble.predict(&x).unwrap(), vec![9.0, 17.0]);
    }

    #[test]
    fn wrong_feature_width_is_a_prediction_error() {
        let model = LinearModel {
            feature_names: names(),
            intercept: 0.0,
            coefficients: vec![1.0; 5],
        };
        let x = DMatrix::zeros(1, 3);
        assert!(matches!(model.predict(&x), Err(TrendError::Prediction(_))));
    }

    #[test]
    fn loads_tagged_json_artifacts() {
        let file = write_model(json!({
            "kind": "tree_ensemble",
            "feature_names": FEATURE_COLUMNS,
            "base_score": 0.5,
            "trees": [{ "nodes": [
                { "split": { "feature": 0, "threshold": 4.5, "left": 1, "right": 2 } },
                { "leaf": { "value": 1.0 } },
                { "leaf": { "value": 3.0 } }
            ]}]
        }));
        let model = load_model(file.path()).unwrap();
        assert_eq!(model.kind(), "tree_ensemble");

        let x = DMatrix::from_row_slice(1, 5, &[5.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(model.predict(&x).unwrap(), vec![3.5]);
    }

    #[test]
    fn rejects_feature_contract_mismatch() {
        let file = write_model(json!({
            "kind": "linear",
            "feature_names": ["month", "dayofweek", "week", "day", "is_weekend"],
            "intercept": 0.0,
            "coefficients": [1, 1, 1, 1, 1]
        }));
        let err = load_model(file.path()).unwrap_err();
        assert!(matches!(err, TrendError::ModelLoad { ref reason, .. } if reason.contains("feature names")));
    }

    #[test]
    fn rejects_backward_tree_edges() {
        let file = write_model(json!({
            "kind": "tree_ensemble",
            "feature_names": FEATURE_COLUMNS,
            "trees": [{ "nodes": [
                { "split": { "feature": 0, "threshold": 1.0, "left": 0, "right": 1 } },
                { "leaf": { "value": 1.0 } }
            ]}]
        }));
        assert!(matches!(load_model(file.path()), Err(TrendError::ModelLoad { .. })));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = load_model(Path::new("/no/such/model.json")).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
