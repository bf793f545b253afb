use crate::ingest::types::RawHistoryRow;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Reads a history CSV. Columns are matched by header name; unknown columns are ignored.
pub fn read_history_csv(path: &Path) -> Result<Vec<RawHistoryRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open history file {}", path.display()))?;
    read_history_from_reader(file).with_context(|| format!("invalid history file {}", path.display()))
}

pub fn read_history_from_reader<R: Read>(reader: R) -> Result<Vec<RawHistoryRow>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in csv.deserialize::<RawHistoryRow>().enumerate() {
        // Line 1 is the header.
        let row = record.with_context(|| format!("failed to parse history line {}", i + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_canonical_columns() {
        let data = "\
date,price,cost,comp1_price,comp2_price,comp3_price,volume
2024-01-01,94.45,85.77,95.01,95.70,95.21,10234
2024-01-02,94.60,85.80,,95.65,95.30,10111
";
        let rows = read_history_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(rows[0].comp2_price, Some(95.70));
        assert_eq!(rows[1].comp1_price, None);
        assert_eq!(rows[1].volume, Some(10111.0));
    }

    #[test]
    fn accepts_short_competitor_headers_and_extra_columns() {
        let data = "\
date,price,cost,volume,comp1,comp2,comp3,region
2024-01-01,94.45,85.77,10234,95.01,95.70,95.21,north
";
        let rows = read_history_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows[0].comp1_price, Some(95.01));
        assert_eq!(rows[0].comp3_price, Some(95.21));
        assert_eq!(rows[0].cost, Some(85.77));
    }

    #[test]
    fn reports_the_failing_line() {
        let data = "\
date,price,cost,comp1_price,comp2_price,comp3_price,volume
2024-01-01,94.45,85.77,95.01,95.70,95.21,10234
not-a-date,94.60,85.80,95.0,95.65,95.30,10111
";
        let err = read_history_from_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn missing_file_has_context() {
        let err = read_history_csv(Path::new("/nonexistent/history.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/history.csv"));
    }
}
