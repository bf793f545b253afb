//! Time-ordered evaluation. Rows are never shuffled: every evaluation set lies strictly after
//! the rows the model was fitted on.

use super::gbt::{BoostingParams, GradientBoostedModel};
use super::metrics::{evaluate, EvaluationMetrics};
use super::{predict_volumes, DemandModel, FeatureMatrix};
use crate::error::{PricingError, PricingResult};
use crate::features::TrainingRow;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Contiguous train / validation / test partitions of a date-ordered row set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChronologicalSplit {
    pub train: Range<usize>,
    pub validation: Range<usize>,
    pub test: Range<usize>,
}

/// Boundaries are `floor(n * train_ratio)` and `floor(n * (train_ratio + val_ratio))`.
pub fn chronological_split(
    n_rows: usize,
    train_ratio: f64,
    val_ratio: f64,
) -> PricingResult<ChronologicalSplit> {
    let valid = |r: f64| r.is_finite() && (0.0..=1.0).contains(&r);
    if !valid(train_ratio) || !valid(val_ratio) || train_ratio + val_ratio > 1.0 {
        return Err(PricingError::InvalidInput(format!(
            "split ratios must be in [0, 1] and sum to at most 1 (got {train_ratio}, {val_ratio})"
        )));
    }

    let train_end = (n_rows as f64 * train_ratio).floor() as usize;
    let val_end = ((n_rows as f64 * (train_ratio + val_ratio)).floor() as usize).min(n_rows);

    Ok(ChronologicalSplit {
        train: 0..train_end,
        validation: train_end..val_end,
        test: val_end..n_rows,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window folds. Each test block has `n_rows / (n_splits + 1)` rows and the last one
/// ends at `n_rows`; each training window is everything before its test block.
pub fn time_series_folds(n_rows: usize, n_splits: usize) -> PricingResult<Vec<Fold>> {
    if n_splits < 2 {
        return Err(PricingError::InvalidInput(format!(
            "cross-validation needs at least 2 folds (got {n_splits})"
        )));
    }
    if n_rows < n_splits + 1 {
        return Err(PricingError::InvalidInput(format!(
            "{n_rows} rows are too few for {n_splits} folds"
        )));
    }

    let test_size = n_rows / (n_splits + 1);
    let first_test = n_rows - n_splits * test_size;

    Ok((0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            Fold {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub train_rows: usize,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldMetrics>,
    pub rmse: MetricSummary,
    pub mae: MetricSummary,
    pub r2: MetricSummary,
    /// Over folds that produced a MAPE.
    pub mape: Option<MetricSummary>,
}

/// Metrics of `model` on `rows`, predicting through the same alignment as serving.
pub fn evaluate_model(
    model: &dyn DemandModel,
    rows: &[TrainingRow],
) -> PricingResult<EvaluationMetrics> {
    let features: Vec<_> = rows.iter().map(|r| r.features.clone()).collect();
    let predicted = predict_volumes(model, &features)?;
    let observed: Vec<f64> = rows.iter().map(|r| r.volume).collect();
    evaluate(&observed, &predicted)
}

pub fn cross_validate(
    rows: &[TrainingRow],
    feature_names: &[String],
    params: &BoostingParams,
    n_splits: usize,
) -> PricingResult<CrossValidationReport> {
    let folds = time_series_folds(rows.len(), n_splits)?;

    let mut results = Vec::with_capacity(folds.len());
    for (i, fold) in folds.into_iter().enumerate() {
        let matrix = FeatureMatrix::from_training_rows(&rows[fold.train.clone()], feature_names)?;
        let model = GradientBoostedModel::train(&matrix, params.clone())?;
        let metrics = evaluate_model(&model, &rows[fold.test])?;

        tracing::debug!(
            fold = i + 1,
            train_rows = fold.train.len(),
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "cross-validation fold evaluated"
        );
        results.push(FoldMetrics {
            fold: i + 1,
            train_rows: fold.train.len(),
            metrics,
        });
    }

    let summarize = |f: fn(&EvaluationMetrics) -> f64| {
        summary(&results.iter().map(|r| f(&r.metrics)).collect::<Vec<_>>())
    };
    let rmse = summarize(|m| m.rmse);
    let mae = summarize(|m| m.mae);
    let r2 = summarize(|m| m.r2);
    let mapes: Vec<f64> = results.iter().filter_map(|r| r.metrics.mape).collect();
    let mape = (!mapes.is_empty()).then(|| summary(&mapes));

    Ok(CrossValidationReport {
        folds: results,
        rmse,
        mae,
        r2,
        mape,
    })
}

/// Mean and population standard deviation.
fn summary(values: &[f64]) -> MetricSummary {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    MetricSummary {
        mean,
        std: var.sqrt(),
    }
}
