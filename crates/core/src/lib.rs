pub mod domain;
pub mod error;
pub mod features;
pub mod ingest;
pub mod model;
pub mod optimizer;
pub mod storage;
pub mod training;

pub use domain::history::HistoricalRecord;
pub use domain::market::{GuardrailConfig, MarketSnapshot};
pub use domain::recommendation::{Candidate, Feasibility, Recommendation, Violation};
pub use error::{PricingError, PricingResult};
pub use model::{DemandModel, GradientBoostedModel};
pub use optimizer::{recommend, recommend_with_candidates, OptimizerConfig};

pub mod config {
    use crate::domain::market::GuardrailConfig;
    use crate::optimizer::OptimizerConfig;
    use anyhow::Context;
    use std::path::{Path, PathBuf};
    use std::str::FromStr;

    const DEFAULT_OUTPUT_DIR: &str = "outputs";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub history_path: Option<PathBuf>,
        pub model_path: Option<PathBuf>,
        pub output_dir: PathBuf,
        pub sentry_dsn: Option<String>,
        pub port: Option<u16>,
        pub grid_size: Option<usize>,
        pub exploration_pct: Option<f64>,
        pub default_margin_factor: Option<f64>,
        pub guardrails: GuardrailConfig,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let standard = GuardrailConfig::standard();
            let guardrail = |key: &str, default: Option<f64>| -> anyhow::Result<Option<f64>> {
                match var(key) {
                    None => Ok(default),
                    Some(v) if v.trim().eq_ignore_ascii_case("none") => Ok(None),
                    Some(v) => parse(key, &v).map(Some),
                }
            };

            Ok(Self {
                history_path: var("PRICEWISE_HISTORY_PATH").map(PathBuf::from),
                model_path: var("PRICEWISE_MODEL_PATH").map(PathBuf::from),
                output_dir: var("PRICEWISE_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                sentry_dsn: var("SENTRY_DSN"),
                port: var("PORT").map(|v| parse("PORT", &v)).transpose()?,
                grid_size: var("PRICEWISE_GRID_SIZE")
                    .map(|v| parse("PRICEWISE_GRID_SIZE", &v))
                    .transpose()?,
                exploration_pct: var("PRICEWISE_EXPLORATION_PCT")
                    .map(|v| parse("PRICEWISE_EXPLORATION_PCT", &v))
                    .transpose()?,
                default_margin_factor: var("PRICEWISE_DEFAULT_MARGIN_FACTOR")
                    .map(|v| parse("PRICEWISE_DEFAULT_MARGIN_FACTOR", &v))
                    .transpose()?,
                guardrails: GuardrailConfig {
                    max_change_pct: guardrail("GUARDRAIL_MAX_CHANGE_PCT", standard.max_change_pct)?,
                    min_margin: guardrail("GUARDRAIL_MIN_MARGIN", standard.min_margin)?,
                    min_price: guardrail("GUARDRAIL_MIN_PRICE", standard.min_price)?,
                    max_price: guardrail("GUARDRAIL_MAX_PRICE", standard.max_price)?,
                    max_vs_comp_pct: guardrail(
                        "GUARDRAIL_MAX_VS_COMP_PCT",
                        standard.max_vs_comp_pct,
                    )?,
                },
            })
        }

        pub fn require_history_path(&self) -> anyhow::Result<&Path> {
            self.history_path
                .as_deref()
                .context("PRICEWISE_HISTORY_PATH is required")
        }

        pub fn require_model_path(&self) -> anyhow::Result<&Path> {
            self.model_path
                .as_deref()
                .context("PRICEWISE_MODEL_PATH is required")
        }

        pub fn optimizer_config(&self) -> OptimizerConfig {
            let defaults = OptimizerConfig::default();
            OptimizerConfig {
                grid_size: self.grid_size.unwrap_or(defaults.grid_size),
                exploration_pct: self.exploration_pct.unwrap_or(defaults.exploration_pct),
                default_margin_factor: self
                    .default_margin_factor
                    .unwrap_or(defaults.default_margin_factor),
            }
        }
    }

    fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {value:?}"))
    }

}
