//! Offline training: history → features → held-out evaluation → final fit.

use crate::domain::history::HistoricalRecord;
use crate::error::{PricingError, PricingResult};
use crate::features::{build_training_rows, TrainingRow, FEATURE_NAMES};
use crate::model::metrics::EvaluationMetrics;
use crate::model::validation::{
    chronological_split, cross_validate, evaluate_model, CrossValidationReport,
};
use crate::model::{BoostingParams, FeatureMatrix, GradientBoostedModel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    pub params: BoostingParams,
    pub train_ratio: f64,
    pub val_ratio: f64,
    /// Folds for time-ordered cross-validation. 0 disables it.
    pub cv_folds: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            params: BoostingParams::default(),
            train_ratio: 0.7,
            val_ratio: 0.15,
            cv_folds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
    pub train: EvaluationMetrics,
    pub validation: Option<EvaluationMetrics>,
    pub test: Option<EvaluationMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub n_rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub feature_names: Vec<String>,
    pub params: BoostingParams,
    /// `None` when the history is too short for a non-empty training split.
    pub split: Option<SplitMetrics>,
    pub cross_validation: Option<CrossValidationReport>,
    /// Fit of the final model on every row.
    pub in_sample: EvaluationMetrics,
    pub feature_importances: Vec<FeatureImportance>,
}

pub fn train_from_history(
    history: &[HistoricalRecord],
    options: &TrainingOptions,
) -> PricingResult<(GradientBoostedModel, TrainingReport)> {
    let rows = build_training_rows(history)?;
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Err(PricingError::InvalidInput(
            "cannot train on an empty history".to_string(),
        ));
    };
    let (first_date, last_date) = (first.date, last.date);
    let feature_names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();

    tracing::info!(
        rows = rows.len(),
        %first_date,
        %last_date,
        n_estimators = options.params.n_estimators,
        "training demand model"
    );

    let split = split_evaluation(&rows, &feature_names, options)?;

    let cross_validation = if options.cv_folds == 0 {
        None
    } else if rows.len() < options.cv_folds + 1 {
        tracing::warn!(
            rows = rows.len(),
            folds = options.cv_folds,
            "too few rows for cross-validation, skipping"
        );
        None
    } else {
        Some(cross_validate(
            &rows,
            &feature_names,
            &options.params,
            options.cv_folds,
        )?)
    };

    let matrix = FeatureMatrix::from_training_rows(&rows, &feature_names)?;
    let model = GradientBoostedModel::train(&matrix, options.params.clone())?;
    let in_sample = evaluate_model(&model, &rows)?;

    let trained_at = model.trained_at().unwrap_or_else(Utc::now);
    let report = TrainingReport {
        trained_at,
        n_rows: rows.len(),
        first_date,
        last_date,
        feature_importances: model
            .feature_importances()
            .into_iter()
            .map(|(feature, importance)| FeatureImportance {
                feature,
                importance,
            })
            .collect(),
        feature_names,
        params: options.params.clone(),
        split,
        cross_validation,
        in_sample,
    };

    if let Some(test) = report.split.as_ref().and_then(|s| s.test.as_ref()) {
        tracing::info!(
            rmse = test.rmse,
            mae = test.mae,
            r2 = test.r2,
            mape = ?test.mape,
            "held-out test metrics"
        );
    }
    tracing::info!(
        rmse = report.in_sample.rmse,
        r2 = report.in_sample.r2,
        "demand model trained"
    );

    Ok((model, report))
}

/// Fits on the training partition and scores every partition with that model.
fn split_evaluation(
    rows: &[TrainingRow],
    feature_names: &[String],
    options: &TrainingOptions,
) -> PricingResult<Option<SplitMetrics>> {
    let split = chronological_split(rows.len(), options.train_ratio, options.val_ratio)?;
    if split.train.is_empty() {
        tracing::warn!(rows = rows.len(), "history too short for a training split");
        return Ok(None);
    }

    let matrix = FeatureMatrix::from_training_rows(&rows[split.train.clone()], feature_names)?;
    let model = GradientBoostedModel::train(&matrix, options.params.clone())?;

    let score = |range: std::ops::Range<usize>| -> PricingResult<Option<EvaluationMetrics>> {
        if range.is_empty() {
            return Ok(None);
        }
        evaluate_model(&model, &rows[range]).map(Some)
    };

    let train = evaluate_model(&model, &rows[split.train.clone()])?;
    let validation = score(split.validation.clone())?;
    let test = score(split.test.clone())?;

    Ok(Some(SplitMetrics {
        train_rows: split.train.len(),
        validation_rows: split.validation.len(),
        test_rows: split.test.len(),
        train,
        validation,
        test,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DemandModel;

    fn history(n: usize) -> Vec<HistoricalRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let price = 92.0 + (i % 7) as f64;
                HistoricalRecord {
                    date: start + chrono::Duration::days(i as i64),
                    price,
                    cost: 85.0,
                    competitor_price_1: Some(95.0),
                    competitor_price_2: Some(96.0),
                    competitor_price_3: None,
                    volume: 20_000.0 - 100.0 * price,
                }
            })
            .collect()
    }

    fn quick() -> TrainingOptions {
        TrainingOptions {
            params: BoostingParams {
                n_estimators: 30,
                max_depth: 3,
                learning_rate: 0.2,
                ..Default::default()
            },
            cv_folds: 3,
            ..Default::default()
        }
    }

    #[test]
    fn trains_and_reports_every_stage() {
        let (model, report) = train_from_history(&history(80), &quick()).unwrap();

        assert!(model.is_trained());
        assert_eq!(model.feature_names().len(), FEATURE_NAMES.len());
        assert_eq!(report.n_rows, 80);
        assert_eq!(report.first_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let split = report.split.as_ref().unwrap();
        assert_eq!(split.train_rows, 56);
        assert_eq!(split.validation_rows, 12);
        assert_eq!(split.test_rows, 12);
        assert!(split.test.is_some());

        let cv = report.cross_validation.as_ref().unwrap();
        assert_eq!(cv.folds.len(), 3);
        assert!(report.in_sample.r2 > 0.99, "r2 {}", report.in_sample.r2);
        assert_eq!(report.feature_importances.len(), FEATURE_NAMES.len());
    }

    #[test]
    fn short_history_skips_cross_validation() {
        let (_, report) = train_from_history(&history(3), &quick()).unwrap();
        assert!(report.cross_validation.is_none());
        assert_eq!(report.split.unwrap().test_rows, 1);
    }

    #[test]
    fn propagates_history_errors() {
        let mut rows = history(10);
        rows[4].cost = 0.0;
        assert!(matches!(
            train_from_history(&rows, &quick()),
            Err(PricingError::DivisionDomain { .. })
        ));

        assert!(matches!(
            train_from_history(&[], &quick()),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn report_serializes() {
        let (_, report) = train_from_history(&history(30), &quick()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["n_rows"], 30);
        assert!(json["in_sample"]["rmse"].is_number());
        assert_eq!(json["feature_names"][0], "price");
    }
}
