use crate::domain::market::{GuardrailConfig, MarketSnapshot};
use crate::error::PricingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire shape of a "price today" request, as sent to the API or read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub date: NaiveDate,
    pub cost: f64,
    #[serde(default, alias = "comp1", alias = "competitor_price_1")]
    pub comp1_price: Option<f64>,
    #[serde(default, alias = "comp2", alias = "competitor_price_2")]
    pub comp2_price: Option<f64>,
    #[serde(default, alias = "comp3", alias = "competitor_price_3")]
    pub comp3_price: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub guardrails: Option<GuardrailConfig>,
}

impl RecommendRequest {
    /// Validates the payload and splits it into the snapshot and optional guardrail override.
    pub fn validate_and_into_parts(
        self,
    ) -> anyhow::Result<(MarketSnapshot, Option<GuardrailConfig>)> {
        if self.comp1_price.is_none() && self.comp2_price.is_none() && self.comp3_price.is_none() {
            return Err(
                PricingError::InvalidInput("at least one competitor price is required".into())
                    .into(),
            );
        }

        let snapshot = MarketSnapshot {
            date: self.date,
            cost: self.cost,
            competitor_price_1: self.comp1_price,
            competitor_price_2: self.comp2_price,
            competitor_price_3: self.comp3_price,
            last_price: self.last_price,
        };
        snapshot.validate()?;

        if let Some(guardrails) = &self.guardrails {
            guardrails.validate()?;
        }

        Ok((snapshot, self.guardrails))
    }
}
