use anyhow::Context;
use chrono::NaiveDate;
use pricewise_core::domain::contract::RecommendRequest;
use pricewise_core::domain::history::rows_before;
use pricewise_core::storage::{lock, recommendations};
use pricewise_core::{GuardrailConfig, HistoricalRecord, MarketSnapshot, Recommendation};
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Args)]
pub struct RecommendArgs {
    /// Date to price (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    pub date: Option<String>,

    /// Today's market as JSON (`cost`, `comp1_price`..`comp3_price`, optional `last_price`).
    /// Without it the snapshot is taken from the last history row.
    #[arg(long)]
    pub today_json: Option<PathBuf>,

    /// Guardrail overrides as JSON. Defaults to the GUARDRAIL_* settings.
    #[arg(long)]
    pub guardrails_json: Option<PathBuf>,

    /// Defaults to PRICEWISE_OUTPUT_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub history: Option<PathBuf>,

    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Compute and log the recommendation without taking the lock or writing files.
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(
    settings: &pricewise_core::config::Settings,
    args: RecommendArgs,
) -> anyhow::Result<()> {
    let date = resolve_date(args.date.as_deref())?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());

    if args.dry_run {
        let rec = produce(settings, &args, date).await?;
        tracing::info!(
            %date,
            dry_run = true,
            price = rec.recommended_price,
            expected_volume = rec.expected_volume,
            expected_profit = rec.expected_profit,
            guardrail_applied = rec.guardrail_applied,
            "recommendation computed (dry-run)"
        );
        return Ok(());
    }

    pricewise_core::storage::ensure_dir(&output_dir)?;
    let Some(date_lock) = lock::try_acquire_date_lock(&output_dir, date)? else {
        tracing::warn!(%date, "date lock not acquired; another run in progress");
        return Ok(());
    };

    let generated_at = chrono::Utc::now();
    let outcome = match produce(settings, &args, date).await {
        Ok(rec) => {
            let stored = recommendations::persist_success(&output_dir, &rec, generated_at)?;
            tracing::info!(
                %date,
                run_id = %stored.run_id,
                price = rec.recommended_price,
                expected_profit = rec.expected_profit,
                guardrail_applied = rec.guardrail_applied,
                violation = ?rec.violation_reason,
                "persisted recommendation"
            );
            Ok(())
        }
        Err(err) => {
            let stored = recommendations::persist_failure(
                &output_dir,
                date,
                generated_at,
                &format!("{err:#}"),
            )?;
            tracing::error!(%date, run_id = %stored.run_id, "recommendation run failed");
            Err(err)
        }
    };

    release_date_lock(date_lock, date);
    outcome
}

fn release_date_lock(date_lock: lock::DateLock, date: NaiveDate) {
    let path = date_lock.path().to_path_buf();
    if let Err(e) = date_lock.release() {
        tracing::warn!(
            %date,
            path = %path.display(),
            error = %format!("{e:#}"),
            "failed to release date lock"
        );
    }
}

async fn produce(
    settings: &pricewise_core::config::Settings,
    args: &RecommendArgs,
    date: NaiveDate,
) -> anyhow::Result<Recommendation> {
    let model_path = match &args.model {
        Some(p) => p.clone(),
        None => settings.require_model_path()?.to_path_buf(),
    };
    let history_path = match &args.history {
        Some(p) => p.clone(),
        None => settings.require_history_path()?.to_path_buf(),
    };

    let model = pricewise_core::model::artifact::load(&model_path)?;
    let history = pricewise_core::ingest::load_history(&history_path)?;

    let (snapshot, request_guardrails) = match &args.today_json {
        Some(path) => read_today_json(path, date)?,
        None => (snapshot_from_history(&history, date)?, None),
    };
    let guardrails = match &args.guardrails_json {
        Some(path) => read_guardrails_json(path)?,
        None => request_guardrails.unwrap_or_else(|| settings.guardrails.clone()),
    };
    let optimizer = settings.optimizer_config();

    tracing::info!(
        %date,
        cost = snapshot.cost,
        last_price = ?snapshot.last_price,
        "running recommendation"
    );

    let rec = tokio::task::spawn_blocking(move || {
        pricewise_core::recommend(&model, &history, &snapshot, &guardrails, &optimizer)
    })
    .await
    .context("recommend task failed")??;
    Ok(rec)
}

fn resolve_date(arg: Option<&str>) -> anyhow::Result<NaiveDate> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --date {s:?}, expected YYYY-MM-DD")),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}

/// The run date always wins over a `date` inside the file.
fn read_today_json(
    path: &Path,
    date: NaiveDate,
) -> anyhow::Result<(MarketSnapshot, Option<GuardrailConfig>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let object = value
        .as_object_mut()
        .with_context(|| format!("{} must contain a JSON object", path.display()))?;
    object.insert("date".to_string(), serde_json::json!(date.to_string()));

    let request: RecommendRequest = serde_json::from_value(value)
        .with_context(|| format!("invalid market snapshot in {}", path.display()))?;
    request.validate_and_into_parts()
}

fn read_guardrails_json(path: &Path) -> anyhow::Result<GuardrailConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let guardrails: GuardrailConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid guardrails in {}", path.display()))?;
    guardrails.validate()?;
    Ok(guardrails)
}

/// Carries the latest known market (the last row before `date`) forward to `date`.
fn snapshot_from_history(
    history: &[HistoricalRecord],
    date: NaiveDate,
) -> anyhow::Result<MarketSnapshot> {
    let last = rows_before(history, date)
        .last()
        .with_context(|| format!("no history before {date} to derive a market snapshot from"))?;

    Ok(MarketSnapshot {
        date,
        cost: last.cost,
        competitor_price_1: last.competitor_price_1,
        competitor_price_2: last.competitor_price_2,
        competitor_price_3: last.competitor_price_3,
        last_price: Some(last.price),
    })
}
