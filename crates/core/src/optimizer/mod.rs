//! Constrained price search.
//!
//! A fixed grid of candidate prices around the last price is scored by the demand model and
//! filtered through the guardrails. The exploration width is independent of the guardrails,
//! so a tight `max_change_pct` can leave part (or all) of the grid infeasible.

mod assembler;
mod grid;
mod guardrails;
mod select;

pub use assembler::assemble;
pub use grid::{candidate_grid, grid_center};
pub use guardrails::evaluate_guardrails;
pub use select::{select_candidate, Selection};

use crate::domain::history::{rows_before, HistoricalRecord};
use crate::domain::market::{GuardrailConfig, MarketSnapshot};
use crate::domain::recommendation::{Candidate, Recommendation};
use crate::error::{PricingError, PricingResult};
use crate::features::{check_ordering, inference_context};
use crate::model::{predict_volumes, DemandModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Number of candidate prices. Must be odd so the grid has a centre point.
    pub grid_size: usize,
    /// Half-span of the grid as a fraction of its centre.
    pub exploration_pct: f64,
    /// Markup on cost used as the grid centre when no last price is known.
    pub default_margin_factor: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            grid_size: 41,
            exploration_pct: 0.03,
            default_margin_factor: 1.10,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> PricingResult<()> {
        if self.grid_size == 0 || self.grid_size % 2 == 0 {
            return Err(PricingError::InvalidInput(format!(
                "grid_size must be a positive odd number (got {})",
                self.grid_size
            )));
        }
        if !(self.exploration_pct > 0.0 && self.exploration_pct < 1.0) {
            return Err(PricingError::InvalidInput(format!(
                "exploration_pct must be in (0, 1) (got {})",
                self.exploration_pct
            )));
        }
        if !(self.default_margin_factor.is_finite() && self.default_margin_factor > 0.0) {
            return Err(PricingError::InvalidInput(format!(
                "default_margin_factor must be positive (got {})",
                self.default_margin_factor
            )));
        }
        Ok(())
    }
}

/// A recommendation together with every candidate that was scored for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub recommendation: Recommendation,
    pub center: f64,
    pub last_price: Option<f64>,
    pub candidates: Vec<Candidate>,
}

/// Today's recommended price.
///
/// `history` supplies the trailing context (only rows dated before the snapshot are used) and,
/// when the snapshot has no `last_price`, the most recent historical price.
pub fn recommend(
    model: &dyn DemandModel,
    history: &[HistoricalRecord],
    snapshot: &MarketSnapshot,
    guardrails: &GuardrailConfig,
    config: &OptimizerConfig,
) -> PricingResult<Recommendation> {
    recommend_with_candidates(model, history, snapshot, guardrails, config)
        .map(|run| run.recommendation)
}

pub fn recommend_with_candidates(
    model: &dyn DemandModel,
    history: &[HistoricalRecord],
    snapshot: &MarketSnapshot,
    guardrails: &GuardrailConfig,
    config: &OptimizerConfig,
) -> PricingResult<OptimizationRun> {
    config.validate()?;
    snapshot.validate()?;
    guardrails.validate()?;
    check_ordering(history)?;

    let last_price = resolve_last_price(snapshot, history);
    let center = grid_center(last_price, snapshot.cost, config.default_margin_factor)?;
    let prices = candidate_grid(center, config.exploration_pct, config.grid_size);

    let context = inference_context(snapshot, history, center);
    let volumes = predict_volumes(model, &context.candidate_batch(&prices))?;
    let competitor_max = context.competitors.map(|c| c.max);
    let cost = snapshot.cost;

    let candidates: Vec<Candidate> = prices
        .par_iter()
        .zip(volumes.par_iter())
        .map(|(&price, &volume)| Candidate {
            price,
            predicted_volume: volume,
            predicted_profit: (price - cost) * volume,
            feasibility: evaluate_guardrails(price, cost, last_price, competitor_max, guardrails),
        })
        .collect();

    let anchor = last_price.unwrap_or(center);
    let selection = select_candidate(&candidates, anchor).ok_or_else(|| {
        PricingError::InvalidInput("candidate grid is empty".to_string())
    })?;
    let recommendation = assemble(snapshot.date, &candidates, selection);

    let feasible = candidates.iter().filter(|c| c.is_feasible()).count();
    if recommendation.guardrail_applied {
        tracing::warn!(
            date = %snapshot.date,
            center,
            price = recommendation.recommended_price,
            violation = ?recommendation.violation_reason,
            "no candidate satisfies every guardrail, returning unconstrained best"
        );
    } else {
        tracing::info!(
            date = %snapshot.date,
            center,
            feasible,
            price = recommendation.recommended_price,
            expected_profit = recommendation.expected_profit,
            "price recommended"
        );
    }

    Ok(OptimizationRun {
        recommendation,
        center,
        last_price,
        candidates,
    })
}

/// The snapshot's last price, else the latest historical price before the snapshot date.
pub fn resolve_last_price(snapshot: &MarketSnapshot, history: &[HistoricalRecord]) -> Option<f64> {
    snapshot.last_price.or_else(|| {
        rows_before(history, snapshot.date)
            .last()
            .map(|r| r.price)
            .filter(|p| p.is_finite() && *p > 0.0)
    })
}
