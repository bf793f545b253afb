use anyhow::Context;
use pricewise_core::model::{artifact, BoostingParams};
use pricewise_core::training::{train_from_history, TrainingOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Args)]
pub struct TrainArgs {
    /// History CSV. Defaults to PRICEWISE_HISTORY_PATH.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Where to write the model artifact. Defaults to PRICEWISE_MODEL_PATH.
    #[arg(long)]
    pub model_out: Option<PathBuf>,

    /// Where to write the training report. Defaults to `<model_out>.metrics.json`.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Time-ordered cross-validation folds (0 disables).
    #[arg(long, default_value_t = 5)]
    pub cv_folds: usize,

    #[arg(long)]
    pub n_estimators: Option<usize>,
}

pub async fn run(
    settings: &pricewise_core::config::Settings,
    args: TrainArgs,
) -> anyhow::Result<()> {
    let history_path = match args.history {
        Some(p) => p,
        None => settings.require_history_path()?.to_path_buf(),
    };
    let model_out = match args.model_out {
        Some(p) => p,
        None => settings.require_model_path()?.to_path_buf(),
    };
    let metrics_out = args
        .metrics_out
        .unwrap_or_else(|| model_out.with_extension("metrics.json"));

    let mut params = BoostingParams::default();
    if let Some(n) = args.n_estimators {
        params.n_estimators = n;
    }
    let options = TrainingOptions {
        params,
        cv_folds: args.cv_folds,
        ..Default::default()
    };

    let history = pricewise_core::ingest::load_history(&history_path)?;
    let (model, report) =
        tokio::task::spawn_blocking(move || train_from_history(&history, &options))
            .await
            .context("training task failed")?
            .context("training failed")?;

    artifact::save(&model, &model_out)?;
    write_report(&metrics_out, &report)?;

    tracing::info!(
        model = %model_out.display(),
        metrics = %metrics_out.display(),
        rows = report.n_rows,
        in_sample_rmse = report.in_sample.rmse,
        "training complete"
    );
    Ok(())
}

fn write_report(
    path: &Path,
    report: &pricewise_core::training::TrainingReport,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
