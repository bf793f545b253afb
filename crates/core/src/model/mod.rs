//! Demand model: volume = f(price, market context).
//!
//! The optimizer only sees the [`DemandModel`] trait. [`GradientBoostedModel`] is the
//! production implementation; tests substitute closed-form stubs.
//!
//! # Schema policy
//!
//! The schema is [`FEATURE_NAMES`], fixed by the feature builder. A model feature outside it
//! is a structural mismatch and fails with [`PricingError::FeatureMismatch`], whatever the
//! batch holds. A schema feature that is absent or non-finite in a row is filled with zero,
//! so each row aligns the same way alone or in any batch. Training builds its matrix with
//! the same alignment.

pub mod artifact;
mod gbt;
pub mod metrics;
mod tree;
pub mod validation;

pub use gbt::{BoostingParams, GradientBoostedModel};
pub use tree::{RegressionNode, RegressionTree};

use crate::error::{PricingError, PricingResult};
use crate::features::{FeatureVector, TrainingRow, FEATURE_NAMES};
use rayon::prelude::*;

pub trait DemandModel: Send + Sync {
    /// Features in the order `predict_row` expects them.
    fn feature_names(&self) -> &[String];

    /// Raw model output for one aligned row. May be negative or NaN.
    fn predict_row(&self, row: &[f64]) -> f64;

    fn is_trained(&self) -> bool {
        true
    }
}

/// Non-negative predicted volume per row, in input order.
pub fn predict_volumes(
    model: &dyn DemandModel,
    batch: &[FeatureVector],
) -> PricingResult<Vec<f64>> {
    if !model.is_trained() {
        return Err(PricingError::ModelNotTrained);
    }

    let rows = align_batch(model.feature_names(), batch)?;
    Ok(rows
        .par_iter()
        .map(|row| clamp_volume(model.predict_row(row)))
        .collect())
}

/// Orders each row by `feature_names`, zero-filling absent or non-finite values.
pub fn align_batch(
    feature_names: &[String],
    batch: &[FeatureVector],
) -> PricingResult<Vec<Vec<f64>>> {
    let missing: Vec<String> = feature_names
        .iter()
        .filter(|name| !FEATURE_NAMES.contains(&name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PricingError::FeatureMismatch { missing });
    }

    Ok(batch
        .iter()
        .map(|row| {
            feature_names
                .iter()
                .map(|name| match row.get(name) {
                    Some(v) if v.is_finite() => v,
                    _ => 0.0,
                })
                .collect()
        })
        .collect())
}

fn clamp_volume(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.max(0.0)
    }
}

/// Dense design matrix plus volume targets.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> PricingResult<Self> {
        if rows.len() != targets.len() {
            return Err(PricingError::InvalidInput(format!(
                "{} feature rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != feature_names.len())
        {
            return Err(PricingError::InvalidInput(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                feature_names.len()
            )));
        }
        if let Some(t) = targets.iter().find(|t| !t.is_finite()) {
            return Err(PricingError::InvalidInput(format!(
                "targets must be finite (got {t})"
            )));
        }

        Ok(Self {
            feature_names,
            rows,
            targets,
        })
    }

    pub fn from_training_rows(
        rows: &[TrainingRow],
        feature_names: &[String],
    ) -> PricingResult<Self> {
        let features: Vec<FeatureVector> = rows.iter().map(|r| r.features.clone()).collect();
        let aligned = align_batch(feature_names, &features)?;
        let targets = rows.iter().map(|r| r.volume).collect();
        Self::new(feature_names.to_vec(), aligned, targets)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PriceSlope {
        names: Vec<String>,
    }

    impl DemandModel for PriceSlope {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict_row(&self, row: &[f64]) -> f64 {
            // volume = 100 - price + 10 * vol_lag7
            100.0 - row[0] + 10.0 * row[1]
        }
    }

    struct Untrained;

    impl DemandModel for Untrained {
        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn predict_row(&self, _row: &[f64]) -> f64 {
            unreachable!("untrained model must not be evaluated")
        }

        fn is_trained(&self) -> bool {
            false
        }
    }

    fn model() -> PriceSlope {
        PriceSlope {
            names: vec!["price".to_string(), "vol_lag7".to_string()],
        }
    }

    fn vector(pairs: &[(&str, f64)]) -> FeatureVector {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn preserves_order_and_clamps() {
        let batch = vec![
            vector(&[("price", 10.0), ("vol_lag7", 0.0)]),
            vector(&[("price", 150.0), ("vol_lag7", 0.0)]),
            vector(&[("price", 50.0), ("vol_lag7", 1.0)]),
        ];
        let out = predict_volumes(&model(), &batch).unwrap();
        assert_eq!(out, vec![90.0, 0.0, 60.0]);
    }

    #[test]
    fn zero_fills_values_missing_from_a_row() {
        // vol_lag7 is absent from the first row and NaN in the third: both silently become
        // zero. This is the documented skew risk.
        let batch = vec![
            vector(&[("price", 10.0)]),
            vector(&[("price", 10.0), ("vol_lag7", 2.0)]),
            vector(&[("price", 10.0), ("vol_lag7", f64::NAN)]),
        ];
        let out = predict_volumes(&model(), &batch).unwrap();
        assert_eq!(out, vec![90.0, 110.0, 90.0]);
    }

    #[test]
    fn row_result_does_not_depend_on_its_batch() {
        let sparse = vector(&[("price", 10.0)]);
        let full = vector(&[("price", 10.0), ("vol_lag7", 2.0)]);

        let alone = predict_volumes(&model(), &[sparse.clone()]).unwrap();
        let together = predict_volumes(&model(), &[sparse, full]).unwrap();
        assert_eq!(alone, vec![90.0]);
        assert_eq!(alone[..], together[..1]);
    }

    #[test]
    fn rejects_feature_unknown_to_the_builder() {
        let model = PriceSlope {
            names: vec!["price".to_string(), "shelf_position".to_string()],
        };
        let batch = vec![vector(&[("price", 10.0), ("shelf_position", 1.0)])];
        let err = predict_volumes(&model, &batch).unwrap_err();
        assert_eq!(
            err,
            PricingError::FeatureMismatch {
                missing: vec!["shelf_position".to_string()]
            }
        );
    }

    #[test]
    fn extra_features_are_ignored() {
        let batch = vec![vector(&[("price", 10.0), ("vol_lag7", 0.0), ("noise", 1e9)])];
        assert_eq!(predict_volumes(&model(), &batch).unwrap(), vec![90.0]);
    }

    #[test]
    fn untrained_model_is_rejected() {
        let batch = vec![vector(&[("price", 10.0)])];
        assert_eq!(
            predict_volumes(&Untrained, &batch).unwrap_err(),
            PricingError::ModelNotTrained
        );
    }

    #[test]
    fn matrix_rejects_ragged_rows() {
        let res = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
            vec![1.0, 2.0],
        );
        assert!(matches!(res, Err(PricingError::InvalidInput(_))));
    }
}
