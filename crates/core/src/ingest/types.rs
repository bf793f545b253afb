use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One CSV history row as read, before gap filling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHistoryRow {
    pub date: NaiveDate,
    pub price: Option<f64>,
    pub cost: Option<f64>,
    #[serde(alias = "comp1", alias = "competitor_price_1")]
    pub comp1_price: Option<f64>,
    #[serde(alias = "comp2", alias = "competitor_price_2")]
    pub comp2_price: Option<f64>,
    #[serde(alias = "comp3", alias = "competitor_price_3")]
    pub comp3_price: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDiagnostics {
    pub n_rows: usize,
    /// Missing (empty or non-finite) values per column.
    pub missing: BTreeMap<String, usize>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub volume_min: Option<f64>,
    pub volume_max: Option<f64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
