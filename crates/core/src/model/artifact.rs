//! On-disk model artifact.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "model_type": "gradient_boosted_regressor",
//!   "format_version": 1,
//!   "feature_names": ["price", "price_diff", ...],
//!   "params": { "n_estimators": 300, "max_depth": 6, "learning_rate": 0.05, ... },
//!   "init_value": 10234.5,
//!   "trees": [
//!     { "n_nodes": 3, "nodes": [
//!       { "feature": 0, "threshold": 94.2, "left": 1, "right": 2, "value": null },
//!       { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": 12.5 },
//!       { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": -8.1 }
//!     ] }
//!   ],
//!   "feature_importances": [0.41, ...],
//!   "trained_at": "2024-12-31T06:00:00Z",
//!   "n_training_rows": 730
//! }
//! ```
//!
//! Floats are written in shortest round-trip form and parsed exactly, so a reloaded model
//! reproduces predictions bit-for-bit.

use super::gbt::{BoostingParams, GradientBoostedModel};
use super::tree::{RegressionNode, RegressionTree};
use crate::error::PricingError;
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const MODEL_TYPE: &str = "gradient_boosted_regressor";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeJson {
    n_nodes: usize,
    nodes: Vec<RegressionNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelArtifact {
    model_type: String,
    format_version: u32,
    feature_names: Vec<String>,
    params: BoostingParams,
    init_value: f64,
    trees: Vec<TreeJson>,
    feature_importances: Vec<f64>,
    trained_at: DateTime<Utc>,
    n_training_rows: usize,
}

pub fn to_json_string(model: &GradientBoostedModel) -> anyhow::Result<String> {
    let Some(trained_at) = model.trained_at else {
        return Err(PricingError::ModelNotTrained.into());
    };

    let artifact = ModelArtifact {
        model_type: MODEL_TYPE.to_string(),
        format_version: FORMAT_VERSION,
        feature_names: model.feature_names.clone(),
        params: model.params.clone(),
        init_value: model.init_value,
        trees: model
            .trees
            .iter()
            .map(|t| TreeJson {
                n_nodes: t.nodes.len(),
                nodes: t.nodes.clone(),
            })
            .collect(),
        feature_importances: model.feature_importances.clone(),
        trained_at,
        n_training_rows: model.n_training_rows,
    };

    serde_json::to_string(&artifact).context("failed to serialize model artifact")
}

pub fn from_json_str(json: &str) -> anyhow::Result<GradientBoostedModel> {
    let artifact: ModelArtifact =
        serde_json::from_str(json).context("model artifact is not valid JSON")?;

    ensure!(
        artifact.model_type == MODEL_TYPE,
        "expected model_type '{MODEL_TYPE}', got '{}'",
        artifact.model_type
    );
    ensure!(
        artifact.format_version == FORMAT_VERSION,
        "unsupported artifact format_version {} (expected {FORMAT_VERSION})",
        artifact.format_version
    );
    ensure!(
        !artifact.feature_names.is_empty(),
        "artifact has no feature names"
    );

    let mut seen = BTreeSet::new();
    for name in &artifact.feature_names {
        ensure!(seen.insert(name.as_str()), "duplicate feature name '{name}'");
    }

    artifact.params.validate()?;
    ensure!(
        artifact.init_value.is_finite(),
        "init_value must be finite (got {})",
        artifact.init_value
    );
    ensure!(
        artifact.trees.len() == artifact.params.n_estimators,
        "n_estimators ({}) doesn't match tree count ({})",
        artifact.params.n_estimators,
        artifact.trees.len()
    );
    ensure!(
        artifact.feature_importances.len() == artifact.feature_names.len(),
        "{} feature importances for {} features",
        artifact.feature_importances.len(),
        artifact.feature_names.len()
    );

    let n_features = artifact.feature_names.len();
    let mut trees = Vec::with_capacity(artifact.trees.len());
    for (i, tree) in artifact.trees.into_iter().enumerate() {
        ensure!(
            tree.n_nodes == tree.nodes.len(),
            "tree {i} declares {} nodes but has {}",
            tree.n_nodes,
            tree.nodes.len()
        );
        let tree = RegressionTree { nodes: tree.nodes };
        if let Err(e) = tree.validate(n_features) {
            bail!("tree {i}: {e}");
        }
        trees.push(tree);
    }

    Ok(GradientBoostedModel {
        params: artifact.params,
        feature_names: artifact.feature_names,
        init_value: artifact.init_value,
        trees,
        feature_importances: artifact.feature_importances,
        trained_at: Some(artifact.trained_at),
        n_training_rows: artifact.n_training_rows,
    })
}

pub fn save(model: &GradientBoostedModel, path: &Path) -> anyhow::Result<()> {
    let json = to_json_string(model)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write model artifact {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        trees = model.n_estimators(),
        features = model.feature_names.len(),
        "model artifact saved"
    );
    Ok(())
}

pub fn load(path: &Path) -> anyhow::Result<GradientBoostedModel> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model artifact {}", path.display()))?;
    from_json_str(&json).with_context(|| format!("invalid model artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::model::{DemandModel, FeatureMatrix};

    fn trained() -> GradientBoostedModel {
        let names = vec!["price".to_string(), "vol_lag1".to_string()];
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..60 {
            let price = 90.0 + (i % 13) as f64 * 0.37;
            let lag = 900.0 + (i * 7 % 50) as f64;
            rows.push(vec![price, lag]);
            targets.push(lag * 1.1 - 8.0 * price + (i % 5) as f64 * 0.123);
        }
        let matrix = FeatureMatrix::new(names, rows, targets).unwrap();
        GradientBoostedModel::train(
            &matrix,
            BoostingParams {
                n_estimators: 25,
                max_depth: 3,
                learning_rate: 0.1,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn batch() -> Vec<FeatureVector> {
        (0..30)
            .map(|i| {
                [
                    ("price".to_string(), 89.5 + i as f64 * 0.21),
                    ("vol_lag1".to_string(), 890.0 + i as f64 * 2.3),
                ]
                .into_iter()
                .collect()
            })
            .collect()
    }

    #[test]
    fn round_trip_preserves_predictions_bit_for_bit() {
        let model = trained();
        let json = to_json_string(&model).unwrap();
        let loaded = from_json_str(&json).unwrap();

        assert_eq!(loaded, model);
        let a = model.predict(&batch()).unwrap();
        let b = loaded.predict(&batch()).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("demand_model.json");
        let model = trained();

        save(&model, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert!(loaded.is_trained());
        assert_eq!(loaded.feature_names(), model.feature_names());
        assert_eq!(
            loaded.predict(&batch()).unwrap(),
            model.predict(&batch()).unwrap()
        );
    }

    #[test]
    fn untrained_model_cannot_be_saved() {
        let model = GradientBoostedModel::new(BoostingParams::default());
        let err = to_json_string(&model).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PricingError>(),
            Some(&PricingError::ModelNotTrained)
        );
    }

    #[test]
    fn rejects_wrong_model_type() {
        let json = to_json_string(&trained()).unwrap();
        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        v["model_type"] = serde_json::json!("random_forest");
        let err = from_json_str(&v.to_string()).unwrap_err();
        assert!(err.to_string().contains("gradient_boosted_regressor"));
    }

    #[test]
    fn rejects_corrupt_tree() {
        let json = to_json_string(&trained()).unwrap();
        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        v["trees"][0]["nodes"][0]["left"] = serde_json::json!(9999);
        assert!(from_json_str(&v.to_string()).is_err());

        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        v["trees"].as_array_mut().unwrap().pop();
        let err = from_json_str(&v.to_string()).unwrap_err();
        assert!(err.to_string().contains("n_estimators"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/model.json"));
    }
}
