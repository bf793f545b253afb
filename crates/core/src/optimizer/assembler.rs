use super::select::Selection;
use crate::domain::recommendation::{Candidate, Recommendation};
use chrono::NaiveDate;

pub fn assemble(date: NaiveDate, candidates: &[Candidate], selection: Selection) -> Recommendation {
    let chosen = &candidates[selection.index];
    Recommendation {
        date,
        recommended_price: chosen.price,
        expected_volume: chosen.predicted_volume,
        expected_profit: chosen.predicted_profit,
        guardrail_applied: selection.guardrail_applied,
        violation_reason: if selection.guardrail_applied {
            chosen.violation()
        } else {
            None
        },
        candidates_tried: candidates.len(),
    }
}
