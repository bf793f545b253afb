use crate::domain::history::HistoricalRecord;
use crate::ingest::types::{HistoryDiagnostics, RawHistoryRow};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

const COLUMNS: [&str; 6] = [
    "price",
    "cost",
    "comp1_price",
    "comp2_price",
    "comp3_price",
    "volume",
];

fn columns(row: &RawHistoryRow) -> [Option<f64>; 6] {
    [
        row.price,
        row.cost,
        row.comp1_price,
        row.comp2_price,
        row.comp3_price,
        row.volume,
    ]
    .map(|v| v.filter(|x| x.is_finite()))
}

pub fn diagnose(rows: &[RawHistoryRow]) -> HistoryDiagnostics {
    let mut missing: BTreeMap<String, usize> =
        COLUMNS.iter().map(|c| (c.to_string(), 0)).collect();
    for row in rows {
        for (name, value) in COLUMNS.iter().zip(columns(row)) {
            if value.is_none() {
                *missing.entry(name.to_string()).or_default() += 1;
            }
        }
    }

    let range = |value: fn(&RawHistoryRow) -> Option<f64>| {
        let values = rows.iter().filter_map(value).filter(|v| v.is_finite());
        values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    };
    let price = range(|r| r.price);
    let volume = range(|r| r.volume);

    HistoryDiagnostics {
        n_rows: rows.len(),
        missing,
        price_min: price.map(|p| p.0),
        price_max: price.map(|p| p.1),
        volume_min: volume.map(|v| v.0),
        volume_max: volume.map(|v| v.1),
        first_date: rows.iter().map(|r| r.date).min(),
        last_date: rows.iter().map(|r| r.date).max(),
    }
}

/// Sorts by date, drops exact duplicate rows, then forward-fills and back-fills every numeric
/// column.
///
/// Competitor columns may stay empty; price, cost and volume must have at least one value.
/// Distinct rows sharing a date are kept and rejected later by the feature builder.
pub fn clean(mut rows: Vec<RawHistoryRow>) -> Result<Vec<HistoricalRecord>> {
    rows.sort_by_key(|r| r.date);

    let mut table: Vec<(chrono::NaiveDate, [Option<f64>; 6])> = Vec::with_capacity(rows.len());
    for row in &rows {
        let entry = (row.date, columns(row));
        let seen = table
            .iter()
            .rev()
            .take_while(|(date, _)| *date == row.date)
            .any(|e| *e == entry);
        if !seen {
            table.push(entry);
        }
    }
    let dropped = rows.len() - table.len();
    if dropped > 0 {
        tracing::info!(dropped, "dropped duplicate history rows");
    }

    for col in 0..COLUMNS.len() {
        let mut last = None;
        for (_, values) in table.iter_mut() {
            match values[col] {
                Some(v) => last = Some(v),
                None => values[col] = last,
            }
        }
        let mut next = None;
        for (_, values) in table.iter_mut().rev() {
            match values[col] {
                Some(v) => next = Some(v),
                None => values[col] = next,
            }
        }
    }

    table
        .into_iter()
        .map(|(date, [price, cost, comp1, comp2, comp3, volume])| {
            let (Some(price), Some(cost), Some(volume)) = (price, cost, volume) else {
                bail!("history has no price, cost or volume values to fill from");
            };
            Ok(HistoricalRecord {
                date,
                price,
                cost,
                competitor_price_1: comp1,
                competitor_price_2: comp2,
                competitor_price_3: comp3,
                volume,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn raw(d: u32, price: Option<f64>, comp1: Option<f64>, volume: Option<f64>) -> RawHistoryRow {
        RawHistoryRow {
            date: day(d),
            price,
            cost: Some(85.0),
            comp1_price: comp1,
            comp2_price: None,
            comp3_price: None,
            volume,
        }
    }

    #[test]
    fn diagnostics_count_missing_and_ranges() {
        let rows = vec![
            raw(1, Some(94.0), None, Some(1000.0)),
            raw(2, None, Some(95.0), Some(900.0)),
            raw(3, Some(96.0), None, None),
        ];
        let diag = diagnose(&rows);
        assert_eq!(diag.n_rows, 3);
        assert_eq!(diag.missing["price"], 1);
        assert_eq!(diag.missing["comp1_price"], 2);
        assert_eq!(diag.missing["comp2_price"], 3);
        assert_eq!(diag.missing["volume"], 1);
        assert_eq!(diag.missing["cost"], 0);
        assert_eq!(diag.price_min, Some(94.0));
        assert_eq!(diag.price_max, Some(96.0));
        assert_eq!(diag.volume_min, Some(900.0));
        assert_eq!(diag.first_date, Some(day(1)));
        assert_eq!(diag.last_date, Some(day(3)));
    }

    #[test]
    fn sorts_dedupes_and_fills() {
        let rows = vec![
            raw(3, Some(96.0), None, Some(1100.0)),
            raw(1, None, None, Some(1000.0)),
            raw(2, Some(95.0), Some(97.0), None),
            raw(2, Some(95.0), Some(97.0), None),
        ];
        let clean = clean(rows).unwrap();

        assert_eq!(clean.len(), 3);
        assert_eq!(
            clean.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![day(1), day(2), day(3)]
        );
        // back-filled from day 2
        assert_eq!(clean[0].price, 95.0);
        assert_eq!(clean[0].competitor_price_1, Some(97.0));
        // forward-filled from day 1 and day 2
        assert_eq!(clean[1].volume, 1000.0);
        assert_eq!(clean[2].competitor_price_1, Some(97.0));
        // never quoted
        assert_eq!(clean[2].competitor_price_2, None);
    }

    #[test]
    fn keeps_conflicting_rows_for_the_same_date() {
        let rows = vec![
            raw(1, Some(94.0), None, Some(1000.0)),
            raw(1, Some(95.0), None, Some(1000.0)),
        ];
        assert_eq!(clean(rows).unwrap().len(), 2);
    }

    #[test]
    fn empty_required_column_is_an_error() {
        let rows = vec![raw(1, Some(94.0), None, None), raw(2, Some(95.0), None, None)];
        assert!(clean(rows).is_err());
    }
}
