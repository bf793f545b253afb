use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pricewise_core::PricingError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request itself is unusable (400).
    #[error("{kind}: {message}")]
    BadRequest { kind: &'static str, message: String },

    /// No usable model is loaded, or it cannot serve this request (503).
    #[error("{kind}: {message}")]
    Unavailable { kind: &'static str, message: String },

    #[error("{kind}: {message}")]
    Internal { kind: &'static str, message: String },
}

impl ApiError {
    pub fn model_not_loaded() -> Self {
        ApiError::Unavailable {
            kind: "model_not_loaded",
            message: "no demand model is loaded".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Engine errors keep their mapping; anything else is an internal failure and is reported
    /// to Sentry.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast_ref::<PricingError>() {
            Some(e) => e.clone().into(),
            None => {
                sentry_anyhow::capture_anyhow(&err);
                ApiError::Internal {
                    kind: "internal",
                    message: format!("{err:#}"),
                }
            }
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            PricingError::InvalidInput(_) | PricingError::DivisionDomain { .. } => {
                ApiError::BadRequest { kind, message }
            }
            PricingError::FeatureMismatch { .. } | PricingError::ModelNotTrained => {
                ApiError::Unavailable { kind, message }
            }
            PricingError::DataIntegrity(_) => ApiError::Internal { kind, message },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match &self {
            ApiError::BadRequest { kind, message }
            | ApiError::Unavailable { kind, message }
            | ApiError::Internal { kind, message } => (*kind, message.clone()),
        };

        if status.is_server_error() {
            tracing::error!(%status, kind, error = %message, "recommend request failed");
        } else {
            tracing::warn!(%status, kind, error = %message, "recommend request rejected");
        }

        let body = axum::Json(json!({
            "error": kind,
            "message": message,
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
