use serde::{Deserialize, Serialize};

/// Independent switches for the feature slots the featurizer populates.
///
/// A disabled slot contributes exactly zero to scoring, so flags can be
/// flipped per (slot, variant) without retraining anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub use_bias: bool,
    #[serde(default)]
    pub use_time_bucket: bool,
    #[serde(default)]
    pub use_dow_bucket: bool,
    #[serde(default)]
    pub use_slot_hash: bool,
    #[serde(default)]
    pub use_segment: bool,
    #[serde(default)]
    pub use_product_hash: bool,
    #[serde(default)]
    pub use_user_hash: bool,
}

/// Persisted per-(slot, variant) configuration row. Unique key `(slot, variant)`.
///
/// This is the wire/storage shape; the resolver folds it over built-in
/// defaults into the runtime [`Config`](crate::bandit::Config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub slot: String,
    #[serde(default)]
    pub variant: u32,

    #[serde(default)]
    pub num_segments: u32,
    #[serde(default)]
    pub num_variants: u32,

    #[serde(default)]
    pub w_bandit: f64,
    #[serde(default)]
    pub w_offline: f64,
    #[serde(default)]
    pub explore_noise: f64,
    #[serde(default)]
    pub alpha: f64,

    #[serde(default)]
    pub value_weight: f64,

    #[serde(default)]
    pub reward_impression: f64,
    #[serde(default)]
    pub reward_click: f64,
    #[serde(default)]
    pub reward_atc: f64,
    #[serde(default)]
    pub reward_order: f64,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub w_global: f64,
    #[serde(default)]
    pub w_user: f64,

    #[serde(default)]
    pub max_arms_per_state: u32,
}
