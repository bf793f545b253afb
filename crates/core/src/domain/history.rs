use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of observed market data for the commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub price: f64,
    pub cost: f64,
    pub competitor_price_1: Option<f64>,
    pub competitor_price_2: Option<f64>,
    pub competitor_price_3: Option<f64>,
    pub volume: f64,
}

impl HistoricalRecord {
    pub fn competitor_prices(&self) -> [Option<f64>; 3] {
        [
            self.competitor_price_1,
            self.competitor_price_2,
            self.competitor_price_3,
        ]
    }
}

/// Rows strictly before `date`. Assumes `history` is sorted ascending by date.
pub fn rows_before(history: &[HistoricalRecord], date: NaiveDate) -> &[HistoricalRecord] {
    let end = history.partition_point(|r| r.date < date);
    &history[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32) -> HistoricalRecord {
        HistoricalRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            price: 90.0,
            cost: 80.0,
            competitor_price_1: Some(91.0),
            competitor_price_2: None,
            competitor_price_3: Some(92.0),
            volume: 1000.0,
        }
    }

    #[test]
    fn rows_before_excludes_same_day() {
        let history: Vec<_> = (1..=5).map(record).collect();
        let cut = rows_before(&history, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(cut.len(), 2);
        assert_eq!(cut.last().unwrap().date.to_string(), "2024-01-02");

        let all = rows_before(&history, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn competitor_prices_keep_slot_order() {
        assert_eq!(record(1).competitor_prices(), [Some(91.0), None, Some(92.0)]);
    }
}
