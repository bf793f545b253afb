use super::FeatureVector;
use crate::domain::history::{rows_before, HistoricalRecord};
use crate::domain::market::{summarize_competitors, CompetitorSummary, MarketSnapshot};
use crate::error::{PricingError, PricingResult};
use chrono::{Datelike, NaiveDate};

const PRICE_MA_WINDOW: usize = 7;
const VOL_MA_SHORT_WINDOW: usize = 7;
const VOL_MA_LONG_WINDOW: usize = 30;
const VOL_LAG_SHORT: usize = 1;
const VOL_LAG_LONG: usize = 7;

/// Features of one date that do not depend on the price charged that day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextFeatures {
    pub date: NaiveDate,
    pub cost: f64,
    pub competitors: Option<CompetitorSummary>,
    pub price_ma7: f64,
    pub price_lag1: f64,
    pub vol_ma7: f64,
    pub vol_ma30: f64,
    pub vol_lag1: f64,
    pub vol_lag7: f64,
    pub dayofweek: u32,
    pub is_weekend: bool,
    pub month: u32,
}

impl ContextFeatures {
    /// Full feature vector with `price` pinned. Only `price`, `price_diff`, `margin` and
    /// `margin_pct` depend on it.
    pub fn with_price(&self, price: f64) -> FeatureVector {
        let mut v = FeatureVector::new();

        let (comp_mean, comp_min, comp_max) = match self.competitors {
            Some(c) => (c.mean, c.min, c.max),
            None => (f64::NAN, f64::NAN, f64::NAN),
        };
        let margin = price - self.cost;

        v.insert("price", price);
        v.insert("price_diff", price - comp_mean);
        v.insert("comp_mean", comp_mean);
        v.insert("comp_min", comp_min);
        v.insert("comp_max", comp_max);
        v.insert("price_ma7", self.price_ma7);
        v.insert("price_lag1", self.price_lag1);
        v.insert("vol_ma7", self.vol_ma7);
        v.insert("vol_ma30", self.vol_ma30);
        v.insert("vol_lag1", self.vol_lag1);
        v.insert("vol_lag7", self.vol_lag7);
        v.insert("dayofweek", self.dayofweek as f64);
        v.insert("is_weekend", if self.is_weekend { 1.0 } else { 0.0 });
        v.insert("month", self.month as f64);
        v.insert("margin", margin);
        v.insert("margin_pct", margin / self.cost * 100.0);
        v
    }

    pub fn candidate_batch(&self, prices: &[f64]) -> Vec<FeatureVector> {
        prices.iter().map(|p| self.with_price(*p)).collect()
    }
}

/// Context features for `date` from the rows strictly before it.
///
/// Windows shrink at the start of history. With no prior rows, price-based context falls back
/// to `reference_price` and volume-based context to zero. A lag deeper than the available
/// history uses the oldest available row.
pub fn context_features(
    date: NaiveDate,
    cost: f64,
    competitor_prices: [Option<f64>; 3],
    prior: &[HistoricalRecord],
    reference_price: f64,
) -> ContextFeatures {
    let price = |r: &HistoricalRecord| r.price;
    let volume = |r: &HistoricalRecord| r.volume;
    let dayofweek = date.weekday().num_days_from_monday();

    ContextFeatures {
        date,
        cost,
        competitors: summarize_competitors(competitor_prices),
        price_ma7: trailing_mean(prior, PRICE_MA_WINDOW, price).unwrap_or(reference_price),
        price_lag1: lag(prior, 1, price).unwrap_or(reference_price),
        vol_ma7: trailing_mean(prior, VOL_MA_SHORT_WINDOW, volume).unwrap_or(0.0),
        vol_ma30: trailing_mean(prior, VOL_MA_LONG_WINDOW, volume).unwrap_or(0.0),
        vol_lag1: lag(prior, VOL_LAG_SHORT, volume).unwrap_or(0.0),
        vol_lag7: lag(prior, VOL_LAG_LONG, volume).unwrap_or(0.0),
        dayofweek,
        is_weekend: dayofweek >= 5,
        month: date.month(),
    }
}

/// Context for today's snapshot.
///
/// Only history dated before the snapshot is used. A supplied `last_price` is taken as
/// yesterday's price for `price_lag1`. `reference_price` (the grid center) stands in for
/// price context when there is no history at all, which keeps every context feature constant
/// across the candidate grid.
pub fn inference_context(
    snapshot: &MarketSnapshot,
    history: &[HistoricalRecord],
    reference_price: f64,
) -> ContextFeatures {
    let prior = rows_before(history, snapshot.date);
    let mut ctx = context_features(
        snapshot.date,
        snapshot.cost,
        snapshot.competitor_prices(),
        prior,
        reference_price,
    );
    if let Some(last_price) = snapshot.last_price {
        ctx.price_lag1 = last_price;
    }
    ctx
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub volume: f64,
}

/// One training row per history row. History must be strictly ascending by date.
pub fn build_training_rows(history: &[HistoricalRecord]) -> PricingResult<Vec<TrainingRow>> {
    check_ordering(history)?;

    let mut rows = Vec::with_capacity(history.len());
    for (i, record) in history.iter().enumerate() {
        if !record.cost.is_finite() || record.cost <= 0.0 {
            return Err(PricingError::DivisionDomain {
                date: record.date,
                cost: record.cost,
            });
        }
        if !record.price.is_finite() || !record.volume.is_finite() {
            return Err(PricingError::DataIntegrity(format!(
                "non-finite price or volume on {}",
                record.date
            )));
        }

        let ctx = context_features(
            record.date,
            record.cost,
            record.competitor_prices(),
            &history[..i],
            record.price,
        );
        rows.push(TrainingRow {
            date: record.date,
            features: ctx.with_price(record.price),
            volume: record.volume,
        });
    }

    Ok(rows)
}

/// History must be strictly ascending by date.
pub fn check_ordering(history: &[HistoricalRecord]) -> PricingResult<()> {
    for pair in history.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.date == prev.date {
            return Err(PricingError::DataIntegrity(format!(
                "duplicate history date {}",
                next.date
            )));
        }
        if next.date < prev.date {
            return Err(PricingError::DataIntegrity(format!(
                "history out of order: {} follows {}",
                next.date, prev.date
            )));
        }
    }
    Ok(())
}

fn trailing_mean(
    rows: &[HistoricalRecord],
    window: usize,
    value: impl Fn(&HistoricalRecord) -> f64,
) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let tail = &rows[rows.len().saturating_sub(window)..];
    let sum: f64 = tail.iter().map(value).sum();
    Some(sum / tail.len() as f64)
}

fn lag(
    rows: &[HistoricalRecord],
    k: usize,
    value: impl Fn(&HistoricalRecord) -> f64,
) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    Some(value(&rows[rows.len().saturating_sub(k)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_NAMES, PRICE_DEPENDENT_FEATURES};
    use chrono::Duration;

    fn day(n: i64) -> NaiveDate {
        // 2024-01-01 is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn history(n: usize) -> Vec<HistoricalRecord> {
        (0..n)
            .map(|i| HistoricalRecord {
                date: day(i as i64),
                price: 90.0 + i as f64,
                cost: 80.0,
                competitor_price_1: Some(92.0),
                competitor_price_2: Some(94.0),
                competitor_price_3: Some(96.0),
                volume: 1000.0 + 10.0 * i as f64,
            })
            .collect()
    }

    #[test]
    fn emits_every_canonical_feature() {
        let rows = build_training_rows(&history(3)).unwrap();
        for row in &rows {
            for name in FEATURE_NAMES {
                assert!(row.features.get(name).is_some(), "missing {name}");
            }
            assert_eq!(row.features.len(), FEATURE_NAMES.len());
        }
    }

    #[test]
    fn first_row_uses_neutral_defaults() {
        let rows = build_training_rows(&history(3)).unwrap();
        let f = &rows[0].features;
        assert_eq!(f.get("price_lag1"), Some(90.0));
        assert_eq!(f.get("price_ma7"), Some(90.0));
        assert_eq!(f.get("vol_lag1"), Some(0.0));
        assert_eq!(f.get("vol_lag7"), Some(0.0));
        assert_eq!(f.get("vol_ma7"), Some(0.0));
        assert_eq!(f.get("vol_ma30"), Some(0.0));
    }

    #[test]
    fn windows_shrink_and_exclude_current_row() {
        let rows = build_training_rows(&history(10)).unwrap();

        // Row 3 sees rows 0..3: prices 90, 91, 92 and volumes 1000, 1010, 1020.
        let f = &rows[3].features;
        assert_eq!(f.get("price_ma7"), Some(91.0));
        assert_eq!(f.get("price_lag1"), Some(92.0));
        assert_eq!(f.get("vol_ma7"), Some(1010.0));
        assert_eq!(f.get("vol_lag1"), Some(1020.0));
        // Only three prior rows: lag 7 falls back to the oldest one.
        assert_eq!(f.get("vol_lag7"), Some(1000.0));

        // Row 9 sees rows 0..9; the 7-row window is rows 2..9.
        let f = &rows[9].features;
        assert_eq!(f.get("price_ma7"), Some(95.0));
        assert_eq!(f.get("vol_ma7"), Some(1050.0));
        assert_eq!(f.get("vol_ma30"), Some(1040.0));
        assert_eq!(f.get("vol_lag7"), Some(1020.0));
    }

    #[test]
    fn price_and_calendar_features() {
        let rows = build_training_rows(&history(7)).unwrap();

        let f = &rows[0].features;
        assert_eq!(f.get("comp_mean"), Some(94.0));
        assert_eq!(f.get("comp_min"), Some(92.0));
        assert_eq!(f.get("comp_max"), Some(96.0));
        assert_eq!(f.get("price_diff"), Some(-4.0));
        assert_eq!(f.get("margin"), Some(10.0));
        assert_eq!(f.get("margin_pct"), Some(12.5));
        assert_eq!(f.get("dayofweek"), Some(0.0));
        assert_eq!(f.get("is_weekend"), Some(0.0));
        assert_eq!(f.get("month"), Some(1.0));

        // 2024-01-06 is a Saturday.
        let f = &rows[5].features;
        assert_eq!(f.get("dayofweek"), Some(5.0));
        assert_eq!(f.get("is_weekend"), Some(1.0));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let mut h = history(4);
        h[2].date = h[1].date;
        let err = build_training_rows(&h).unwrap_err();
        assert!(matches!(err, PricingError::DataIntegrity(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_out_of_order_dates() {
        let mut h = history(4);
        h.swap(1, 2);
        let err = build_training_rows(&h).unwrap_err();
        assert!(matches!(err, PricingError::DataIntegrity(ref m) if m.contains("out of order")));
    }

    #[test]
    fn rejects_non_positive_cost() {
        let mut h = history(4);
        h[2].cost = 0.0;
        let err = build_training_rows(&h).unwrap_err();
        assert_eq!(
            err,
            PricingError::DivisionDomain {
                date: day(2),
                cost: 0.0
            }
        );
    }

    #[test]
    fn missing_competitors_become_nan() {
        let mut h = history(2);
        h[1].competitor_price_1 = None;
        h[1].competitor_price_2 = Some(0.0);
        h[1].competitor_price_3 = None;
        let rows = build_training_rows(&h).unwrap();
        assert!(rows[1].features.get("comp_mean").unwrap().is_nan());
        assert!(rows[1].features.get("price_diff").unwrap().is_nan());
    }

    #[test]
    fn training_and_inference_agree_on_context() {
        let h = history(12);
        let rows = build_training_rows(&h).unwrap();
        let target = &h[11];

        let snapshot = MarketSnapshot {
            date: target.date,
            cost: target.cost,
            competitor_price_1: target.competitor_price_1,
            competitor_price_2: target.competitor_price_2,
            competitor_price_3: target.competitor_price_3,
            last_price: None,
        };
        // Inference sees the full history, including the target day, but must cut it off.
        let ctx = inference_context(&snapshot, &h, 999.0);
        let served = ctx.with_price(target.price);

        assert_eq!(served, rows[11].features);
    }

    #[test]
    fn candidate_batch_varies_only_price_dependent_features() {
        let h = history(10);
        let snapshot = MarketSnapshot {
            date: day(10),
            cost: 80.0,
            competitor_price_1: Some(95.0),
            competitor_price_2: None,
            competitor_price_3: None,
            last_price: Some(99.0),
        };
        let ctx = inference_context(&snapshot, &h, 99.0);
        let batch = ctx.candidate_batch(&[95.0, 99.0, 103.0]);

        assert_eq!(batch[0].get("price_lag1"), Some(99.0));
        for name in FEATURE_NAMES {
            let first = batch[0].get(name).unwrap();
            let varies = batch.iter().any(|v| v.get(name).unwrap() != first);
            assert_eq!(varies, PRICE_DEPENDENT_FEATURES.contains(&name), "{name}");
        }
    }

    #[test]
    fn empty_history_uses_reference_price() {
        let snapshot = MarketSnapshot {
            date: day(0),
            cost: 80.0,
            competitor_price_1: Some(95.0),
            competitor_price_2: None,
            competitor_price_3: None,
            last_price: None,
        };
        let ctx = inference_context(&snapshot, &[], 88.0);
        assert_eq!(ctx.price_ma7, 88.0);
        assert_eq!(ctx.price_lag1, 88.0);
        assert_eq!(ctx.vol_lag7, 0.0);
    }

    #[test]
    fn deterministic() {
        let h = history(40);
        assert_eq!(
            build_training_rows(&h).unwrap(),
            build_training_rows(&h).unwrap()
        );
    }
}
