use crate::error::{PricingError, PricingResult};

/// Centre of the candidate grid: the last price when known, otherwise a default markup on cost.
pub fn grid_center(
    last_price: Option<f64>,
    cost: f64,
    default_margin_factor: f64,
) -> PricingResult<f64> {
    if let Some(p) = last_price.filter(|p| p.is_finite() && *p > 0.0) {
        return Ok(p);
    }
    if cost.is_finite() && cost > 0.0 {
        return Ok(cost * default_margin_factor);
    }
    Err(PricingError::InvalidInput(format!(
        "cannot center the price grid: no last price and cost is {cost}"
    )))
}

/// `n` evenly spaced prices over `center * (1 ± exploration_pct)`.
///
/// The first and last points are the exact bounds and, for odd `n`, the middle point is exactly
/// `center`.
pub fn candidate_grid(center: f64, exploration_pct: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![center; n];
    }

    let lo = center * (1.0 - exploration_pct);
    let hi = center * (1.0 + exploration_pct);
    let step = (hi - lo) / (n - 1) as f64;

    let mut prices: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
    prices[n - 1] = hi;
    if n % 2 == 1 {
        prices[n / 2] = center;
    }
    prices
}
