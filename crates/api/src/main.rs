mod error;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use error::ApiError;
use pricewise_core::domain::contract::RecommendRequest;
use pricewise_core::{
    GradientBoostedModel, GuardrailConfig, HistoricalRecord, OptimizerConfig, Recommendation,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = pricewise_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let engine = match load_engine(&settings) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "model or history failed to load; starting API in degraded mode");
            None
        }
    };

    let optimizer = settings.optimizer_config();
    optimizer.validate()?;
    settings.guardrails.validate()?;

    let state = AppState {
        engine,
        guardrails: settings.guardrails.clone(),
        optimizer,
    };

    let app = router(state);

    let port = settings.port.unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Everything a recommendation needs besides the request.
#[derive(Debug)]
struct Engine {
    model: GradientBoostedModel,
    history: Vec<HistoricalRecord>,
}

fn load_engine(settings: &pricewise_core::config::Settings) -> anyhow::Result<Engine> {
    let model = pricewise_core::model::artifact::load(settings.require_model_path()?)?;
    let history = pricewise_core::ingest::load_history(settings.require_history_path()?)?;
    tracing::info!(
        trees = model.n_estimators(),
        learning_rate = model.params().learning_rate,
        training_rows = model.n_training_rows(),
        trained_at = ?model.trained_at(),
        history_rows = history.len(),
        "demand model loaded"
    );
    Ok(Engine { model, history })
}

#[derive(Debug, Clone)]
struct AppState {
    engine: Option<Arc<Engine>>,
    guardrails: GuardrailConfig,
    optimizer: OptimizerConfig,
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.engine.is_some();
    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" },
        model_loaded,
    })
}

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<Recommendation>, ApiError> {
    let Some(engine) = state.engine.clone() else {
        return Err(ApiError::model_not_loaded());
    };

    let (snapshot, guardrails) = request
        .validate_and_into_parts()
        .map_err(ApiError::from_anyhow)?;
    let guardrails = guardrails.unwrap_or(state.guardrails);
    let optimizer = state.optimizer;

    let recommendation = tokio::task::spawn_blocking(move || {
        pricewise_core::recommend(
            &engine.model,
            &engine.history,
            &snapshot,
            &guardrails,
            &optimizer,
        )
    })
    .await
    .map_err(|e| ApiError::from_anyhow(anyhow::Error::new(e).context("recommend task failed")))??;

    Ok(Json(recommendation))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &pricewise_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
