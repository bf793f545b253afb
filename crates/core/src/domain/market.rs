use crate::error::{PricingError, PricingResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Today's market as supplied by the caller. Not part of history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub cost: f64,
    pub competitor_price_1: Option<f64>,
    pub competitor_price_2: Option<f64>,
    pub competitor_price_3: Option<f64>,
    pub last_price: Option<f64>,
}

impl MarketSnapshot {
    pub fn competitor_prices(&self) -> [Option<f64>; 3] {
        [
            self.competitor_price_1,
            self.competitor_price_2,
            self.competitor_price_3,
        ]
    }

    /// Boundary check run before the snapshot reaches the feature builder.
    pub fn validate(&self) -> PricingResult<()> {
        if !self.cost.is_finite() || self.cost <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "cost must be a positive number (got {})",
                self.cost
            )));
        }

        if let Some(last_price) = self.last_price {
            if !last_price.is_finite() || last_price <= 0.0 {
                return Err(PricingError::InvalidInput(format!(
                    "last_price must be a positive number (got {last_price})"
                )));
            }
        }

        for (idx, price) in self.competitor_prices().iter().enumerate() {
            if let Some(p) = price {
                if !p.is_finite() || *p < 0.0 {
                    return Err(PricingError::InvalidInput(format!(
                        "competitor_price_{} must be a non-negative number (got {p})",
                        idx + 1
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Business constraints on the recommended price. Unset fields are not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub max_change_pct: Option<f64>,
    pub min_margin: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub max_vs_comp_pct: Option<f64>,
}

impl GuardrailConfig {
    /// The guardrails the serving and batch collaborators apply when none are supplied.
    pub fn standard() -> Self {
        Self {
            max_change_pct: Some(0.03),
            min_margin: Some(1.0),
            min_price: Some(20.0),
            max_price: Some(1000.0),
            max_vs_comp_pct: Some(0.10),
        }
    }

    pub fn validate(&self) -> PricingResult<()> {
        let fields = [
            ("max_change_pct", self.max_change_pct),
            ("min_margin", self.min_margin),
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("max_vs_comp_pct", self.max_vs_comp_pct),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(PricingError::InvalidInput(format!(
                        "guardrail {name} must be finite (got {v})"
                    )));
                }
            }
        }

        if let Some(pct) = self.max_change_pct {
            if pct < 0.0 {
                return Err(PricingError::InvalidInput(format!(
                    "guardrail max_change_pct must be >= 0 (got {pct})"
                )));
            }
        }

        if let (Some(lo), Some(hi)) = (self.min_price, self.max_price) {
            if lo > hi {
                return Err(PricingError::InvalidInput(format!(
                    "guardrail min_price ({lo}) exceeds max_price ({hi})"
                )));
            }
        }

        Ok(())
    }
}

/// Aggregates over the competitor prices that are actually quoted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetitorSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Missing and zero quotes are ignored. Returns `None` when nothing usable is left.
pub fn summarize_competitors(prices: [Option<f64>; 3]) -> Option<CompetitorSummary> {
    let quoted: Vec<f64> = prices
        .into_iter()
        .flatten()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();

    if quoted.is_empty() {
        return None;
    }

    let sum: f64 = quoted.iter().sum();
    let min = quoted.iter().copied().fold(f64::INFINITY, f64::min);
    let max = quoted.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(CompetitorSummary {
        mean: sum / quoted.len() as f64,
        min,
        max,
    })
}
