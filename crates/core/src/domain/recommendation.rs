use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guardrail names, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    MinPrice,
    MaxPrice,
    MaxChangePct,
    MinMargin,
    MaxVsCompPct,
}

impl Violation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Violation::MinPrice => "min_price",
            Violation::MaxPrice => "max_price",
            Violation::MaxChangePct => "max_change_pct",
            Violation::MinMargin => "min_margin",
            Violation::MaxVsCompPct => "max_vs_comp_pct",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "feasibility", content = "violation_reason", rename_all = "snake_case")]
pub enum Feasibility {
    Feasible,
    Infeasible(Violation),
}

/// One trial price from an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub price: f64,
    pub predicted_volume: f64,
    pub predicted_profit: f64,
    #[serde(flatten)]
    pub feasibility: Feasibility,
}

impl Candidate {
    pub fn is_feasible(&self) -> bool {
        matches!(self.feasibility, Feasibility::Feasible)
    }

    pub fn violation(&self) -> Option<Violation> {
        match self.feasibility {
            Feasibility::Feasible => None,
            Feasibility::Infeasible(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub date: NaiveDate,
    pub recommended_price: f64,
    pub expected_volume: f64,
    pub expected_profit: f64,
    /// True when no candidate satisfied every guardrail and the unconstrained best was returned.
    pub guardrail_applied: bool,
    pub violation_reason: Option<Violation>,
    pub candidates_tried: usize,
}
