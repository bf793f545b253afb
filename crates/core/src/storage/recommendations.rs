use crate::domain::recommendation::Recommendation;
use crate::storage::write_json_atomic;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// One batch run's outcome for a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub run_id: uuid::Uuid,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub status: RunStatus,
    pub recommendation: Option<Recommendation>,
    pub error: Option<String>,
}

pub fn recommendation_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("recommendation_{date}.json"))
}

pub fn failure_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("recommendation_{date}.error.json"))
}

/// Writes `recommendation_<date>.json`, replacing any earlier run for that date, and clears a
/// stale failure record.
pub fn persist_success(
    dir: &Path,
    recommendation: &Recommendation,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<StoredRecommendation> {
    let record = StoredRecommendation {
        run_id: uuid::Uuid::new_v4(),
        date: recommendation.date,
        generated_at,
        status: RunStatus::Success,
        recommendation: Some(recommendation.clone()),
        error: None,
    };

    let path = recommendation_path(dir, record.date);
    write_json_atomic(&path, &record)
        .with_context(|| format!("failed to persist recommendation for {}", record.date))?;

    let stale = failure_path(dir, record.date);
    if stale.exists() {
        std::fs::remove_file(&stale)
            .with_context(|| format!("failed to remove {}", stale.display()))?;
    }

    Ok(record)
}

/// Failures go to a separate file so they never overwrite a good recommendation.
pub fn persist_failure(
    dir: &Path,
    date: NaiveDate,
    generated_at: DateTime<Utc>,
    error: &str,
) -> anyhow::Result<StoredRecommendation> {
    let record = StoredRecommendation {
        run_id: uuid::Uuid::new_v4(),
        date,
        generated_at,
        status: RunStatus::Error,
        recommendation: None,
        error: Some(error.to_string()),
    };

    write_json_atomic(&failure_path(dir, date), &record)
        .with_context(|| format!("failed to persist failure record for {date}"))?;
    Ok(record)
}

/// The successful record for `date`, if one exists.
pub fn load(dir: &Path, date: NaiveDate) -> anyhow::Result<Option<StoredRecommendation>> {
    let path = recommendation_path(dir, date);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = serde_json::from_str(&json)
        .with_context(|| format!("invalid recommendation record {}", path.display()))?;
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Violation;
    use serde_json::json;

    fn recommendation() -> Recommendation {
        Recommendation {
            date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            recommended_price: 96.3835,
            expected_volume: 10_234.5,
            expected_profit: 108_666.1,
            guardrail_applied: true,
            violation_reason: Some(Violation::MaxVsCompPct),
            candidates_tried: 41,
        }
    }

    #[test]
    fn success_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recommendation();
        let stored = persist_success(dir.path(), &rec, Utc::now()).unwrap();

        let path = dir.path().join("recommendation_2024-12-31.json");
        assert!(path.exists());
        let loaded = load(dir.path(), rec.date).unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.recommendation, Some(rec));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["status"], json!("success"));
        assert_eq!(raw["recommendation"]["violation_reason"], json!("max_vs_comp_pct"));
    }

    #[test]
    fn failure_does_not_clobber_success() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recommendation();
        persist_success(dir.path(), &rec, Utc::now()).unwrap();
        persist_failure(dir.path(), rec.date, Utc::now(), "model artifact missing").unwrap();

        assert!(failure_path(dir.path(), rec.date).exists());
        let loaded = load(dir.path(), rec.date).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Success);

        // A later success clears the failure record.
        persist_success(dir.path(), &rec, Utc::now()).unwrap();
        assert!(!failure_path(dir.path(), rec.date).exists());
    }

    #[test]
    fn missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(load(dir.path(), date).unwrap().is_none());
    }
}
