use chrono::NaiveDate;

/// Failures raised by the pricing engine itself.
///
/// Guardrail infeasibility is not represented here: a recommendation that could not satisfy
/// every guardrail is still a recommendation (see `Recommendation::guardrail_applied`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    /// History contains duplicate or out-of-order dates.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// A ratio with cost as denominator was requested for a non-positive cost.
    #[error("division domain error: cost must be > 0 on {date} (got {cost})")]
    DivisionDomain { date: NaiveDate, cost: f64 },

    #[error("demand model is not trained")]
    ModelNotTrained,

    /// Features the model was trained on are absent from the input schema.
    #[error("feature mismatch: missing features {missing:?}")]
    FeatureMismatch { missing: Vec<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PricingError {
    /// Stable snake_case name, used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::DataIntegrity(_) => "data_integrity",
            PricingError::DivisionDomain { .. } => "division_domain",
            PricingError::ModelNotTrained => "model_not_trained",
            PricingError::FeatureMismatch { .. } => "feature_mismatch",
            PricingError::InvalidInput(_) => "invalid_input",
        }
    }
}

pub type PricingResult<T> = std::result::Result<T, PricingError>;
