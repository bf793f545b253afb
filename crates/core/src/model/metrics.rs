use crate::error::{PricingError, PricingResult};
use serde::{Deserialize, Serialize};

/// Regression quality of volume predictions against observed volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub n_rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Mean absolute percentage error over rows with non-zero observed volume, in percent.
    /// `None` when every observed volume is zero.
    pub mape: Option<f64>,
    pub mean_volume: f64,
    pub std_volume: f64,
}

pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> PricingResult<EvaluationMetrics> {
    if y_true.len() != y_pred.len() {
        return Err(PricingError::InvalidInput(format!(
            "{} observations but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(PricingError::InvalidInput(
            "cannot evaluate an empty set".to_string(),
        ));
    }

    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;

    let mut sq_err = 0.0;
    let mut abs_err = 0.0;
    let mut sq_tot = 0.0;
    let mut pct_err = 0.0;
    let mut pct_rows = 0usize;
    for (&y, &p) in y_true.iter().zip(y_pred) {
        let e = y - p;
        sq_err += e * e;
        abs_err += e.abs();
        sq_tot += (y - mean) * (y - mean);
        if y != 0.0 {
            pct_err += (e / y).abs();
            pct_rows += 1;
        }
    }

    // Constant observations: R² is only meaningful as "perfect or not".
    let r2 = if sq_tot == 0.0 {
        if sq_err == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - sq_err / sq_tot
    };

    Ok(EvaluationMetrics {
        n_rows: y_true.len(),
        rmse: (sq_err / n).sqrt(),
        mae: abs_err / n,
        r2,
        mape: (pct_rows > 0).then(|| pct_err / pct_rows as f64 * 100.0),
        mean_volume: mean,
        std_volume: (sq_tot / n).sqrt(),
    })
}
