use serde::{Deserialize, Serialize};

use crate::bandit::Context;

/// One row of offline-ranker output for a slot, ordered by score descending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfflineCandidate {
    pub product_id: u64,
    pub score: f64,
}

/// A ranked recommendation returned by `Recommend`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: u64,
    pub score: f64,
}

/// Full per-candidate score breakdown returned by `DebugRecommend`.
///
/// The UCB decomposition (`bandit_mean`, `bandit_uncertainty`, `bandit_ucb`)
/// is reported for the global arm; the final score additionally blends the
/// per-user arm according to the resolved weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugRecommendation {
    pub product_id: u64,
    pub offline_score: f64,
    pub offline_normalized: f64,
    pub bandit_mean: f64,
    pub bandit_uncertainty: f64,
    pub bandit_ucb: f64,
    pub final_score: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<f64>,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    pub segment: u32,
    pub variant: u32,
}
