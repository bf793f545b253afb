//! Gradient-boosted regression trees (squared error).
//!
//! # Prediction
//!
//! `init_value + learning_rate * sum(tree.predict(row))`, where `init_value` is the mean
//! training target. Each stage's tree is fitted to the residuals of the stages before it.

use super::tree::{fit_tree, RegressionTree, TreeParams};
use super::{predict_volumes, DemandModel, FeatureMatrix};
use crate::error::{PricingError, PricingResult};
use crate::features::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            learning_rate: 0.05,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> PricingResult<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(PricingError::InvalidInput(format!(
                "learning_rate must be in (0, 1] (got {})",
                self.learning_rate
            )));
        }
        if self.min_samples_split < 2 {
            return Err(PricingError::InvalidInput(format!(
                "min_samples_split must be >= 2 (got {})",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf < 1 {
            return Err(PricingError::InvalidInput(
                "min_samples_leaf must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedModel {
    pub(crate) params: BoostingParams,
    pub(crate) feature_names: Vec<String>,
    pub(crate) init_value: f64,
    pub(crate) trees: Vec<RegressionTree>,
    /// Normalized total squared-error reduction per feature.
    pub(crate) feature_importances: Vec<f64>,
    pub(crate) trained_at: Option<DateTime<Utc>>,
    pub(crate) n_training_rows: usize,
}

impl GradientBoostedModel {
    /// An untrained model. Predicting with it fails with `ModelNotTrained`.
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            feature_names: Vec::new(),
            init_value: 0.0,
            trees: Vec::new(),
            feature_importances: Vec::new(),
            trained_at: None,
            n_training_rows: 0,
        }
    }

    pub fn train(matrix: &FeatureMatrix, params: BoostingParams) -> PricingResult<Self> {
        let mut model = Self::new(params);
        model.fit(matrix)?;
        Ok(model)
    }

    pub fn fit(&mut self, matrix: &FeatureMatrix) -> PricingResult<()> {
        self.params.validate()?;
        if matrix.is_empty() {
            return Err(PricingError::InvalidInput(
                "cannot train on an empty feature matrix".to_string(),
            ));
        }

        let n = matrix.len();
        let lr = self.params.learning_rate;
        let tree_params = self.params.tree_params();
        let init_value = matrix.targets.iter().sum::<f64>() / n as f64;

        let mut predictions = vec![init_value; n];
        let mut importances = vec![0.0; matrix.feature_names.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = matrix
                .targets
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();

            let tree = fit_tree(&matrix.rows, &residuals, tree_params, &mut importances);
            for (pred, row) in predictions.iter_mut().zip(&matrix.rows) {
                *pred += lr * tree.predict(row);
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::debug!(
            rows = n,
            features = matrix.feature_names.len(),
            trees = trees.len(),
            init_value,
            "gradient boosted model fitted"
        );

        self.feature_names = matrix.feature_names.clone();
        self.init_value = init_value;
        self.trees = trees;
        self.feature_importances = importances;
        self.trained_at = Some(Utc::now());
        self.n_training_rows = n;
        Ok(())
    }

    /// Clamped volume per feature vector, in input order.
    pub fn predict(&self, batch: &[FeatureVector]) -> PricingResult<Vec<f64>> {
        predict_volumes(self, batch)
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    pub fn n_training_rows(&self) -> usize {
        self.n_training_rows
    }

    /// `(feature, importance)` sorted by importance, highest first.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.feature_importances.iter().copied())
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

impl DemandModel for GradientBoostedModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let boost: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        self.init_value + self.params.learning_rate * boost
    }

    fn is_trained(&self) -> bool {
        self.trained_at.is_some()
    }
}
