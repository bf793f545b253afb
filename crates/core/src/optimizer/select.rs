use crate::domain::recommendation::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// No candidate was feasible; `index` is the unconstrained profit maximizer.
    pub guardrail_applied: bool,
}

/// Highest-profit feasible candidate, falling back to the highest-profit candidate overall.
///
/// Equal profits go to the price closest to `anchor`, then to the lowest index.
pub fn select_candidate(candidates: &[Candidate], anchor: f64) -> Option<Selection> {
    if let Some(index) = best_index(candidates, anchor, Candidate::is_feasible) {
        return Some(Selection {
            index,
            guardrail_applied: false,
        });
    }
    best_index(candidates, anchor, |_| true).map(|index| Selection {
        index,
        guardrail_applied: true,
    })
}

fn best_index(
    candidates: &[Candidate],
    anchor: f64,
    eligible: impl Fn(&Candidate) -> bool,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if !eligible(c) {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => {
                let incumbent = &candidates[b];
                c.predicted_profit > incumbent.predicted_profit
                    || (c.predicted_profit == incumbent.predicted_profit
                        && (c.price - anchor).abs() < (incumbent.price - anchor).abs())
            }
        };
        if better {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{Feasibility, Violation};

    fn candidate(price: f64, profit: f64, feasible: bool) -> Candidate {
        Candidate {
            price,
            predicted_volume: 1.0,
            predicted_profit: profit,
            feasibility: if feasible {
                Feasibility::Feasible
            } else {
                Feasibility::Infeasible(Violation::MinMargin)
            },
        }
    }

    #[test]
    fn picks_best_feasible() {
        let c = vec![
            candidate(1.0, 10.0, true),
            candidate(2.0, 50.0, false),
            candidate(3.0, 20.0, true),
        ];
        assert_eq!(
            select_candidate(&c, 2.0),
            Some(Selection {
                index: 2,
                guardrail_applied: false
            })
        );
    }

    #[test]
    fn falls_back_to_overall_best() {
        let c = vec![candidate(1.0, 10.0, false), candidate(2.0, 50.0, false)];
        assert_eq!(
            select_candidate(&c, 1.0),
            Some(Selection {
                index: 1,
                guardrail_applied: true
            })
        );
    }

    #[test]
    fn ties_go_to_anchor_then_lowest_index() {
        let c = vec![
            candidate(1.0, 5.0, true),
            candidate(2.0, 5.0, true),
            candidate(3.0, 5.0, true),
        ];
        assert_eq!(select_candidate(&c, 2.2).unwrap().index, 1);
        // 1.0 and 3.0 are equally far from 2.0 once 2.0 itself is out.
        let c = vec![candidate(1.0, 5.0, true), candidate(3.0, 5.0, true)];
        assert_eq!(select_candidate(&c, 2.0).unwrap().index, 0);
    }

    #[test]
    fn empty_has_no_selection() {
        assert_eq!(select_candidate(&[], 1.0), None);
    }
}
