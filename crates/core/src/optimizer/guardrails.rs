use crate::domain::market::GuardrailConfig;
use crate::domain::recommendation::{Feasibility, Violation};

/// Absolute slack on every bound, so a grid point sitting exactly on a bound passes.
const TOLERANCE: f64 = 1e-9;

/// First violated guardrail, checked in the order bounds, change, margin, competitor cap.
///
/// The change limit is skipped without a last price and the competitor cap without any
/// competitor quote.
pub fn evaluate_guardrails(
    price: f64,
    cost: f64,
    last_price: Option<f64>,
    competitor_max: Option<f64>,
    guardrails: &GuardrailConfig,
) -> Feasibility {
    if let Some(min) = guardrails.min_price {
        if price < min - TOLERANCE {
            return Feasibility::Infeasible(Violation::MinPrice);
        }
    }
    if let Some(max) = guardrails.max_price {
        if price > max + TOLERANCE {
            return Feasibility::Infeasible(Violation::MaxPrice);
        }
    }

    if let (Some(pct), Some(last)) = (guardrails.max_change_pct, last_price) {
        if (price - last).abs() / last > pct + TOLERANCE {
            return Feasibility::Infeasible(Violation::MaxChangePct);
        }
    }

    if let Some(min_margin) = guardrails.min_margin {
        if price - cost < min_margin - TOLERANCE {
            return Feasibility::Infeasible(Violation::MinMargin);
        }
    }

    if let (Some(pct), Some(comp_max)) = (guardrails.max_vs_comp_pct, competitor_max) {
        if price > comp_max * (1.0 + pct) + TOLERANCE {
            return Feasibility::Infeasible(Violation::MaxVsCompPct);
        }
    }

    Feasibility::Feasible
}
