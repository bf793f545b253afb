//! Feature engineering for the demand model.
//!
//! Every feature is derived from rows strictly before the date being featurized, plus the
//! price/cost/competitor quotes of that date itself. Training and inference share
//! [`context_features`], so a training row and an inference row built from the same prior
//! history agree on every context feature.

mod builder;
mod vector;

pub use builder::{
    build_training_rows, check_ordering, context_features, inference_context, ContextFeatures,
    TrainingRow,
};
pub use vector::FeatureVector;

/// Canonical feature order. Models record the subset (and order) they were trained with.
pub const FEATURE_NAMES: [&str; 16] = [
    "price",
    "price_diff",
    "comp_mean",
    "comp_min",
    "comp_max",
    "price_ma7",
    "price_lag1",
    "vol_ma7",
    "vol_ma30",
    "vol_lag1",
    "vol_lag7",
    "dayofweek",
    "is_weekend",
    "month",
    "margin",
    "margin_pct",
];

/// Features that change when only the candidate price changes.
pub const PRICE_DEPENDENT_FEATURES: [&str; 4] = ["price", "price_diff", "margin", "margin_pct"];
