//! Resolved runtime configuration for one (slot, variant).

use crate::domain::{ConfigRecord, FeatureFlags};

pub const DEFAULT_NUM_SEGMENTS: u32 = 3;
pub const DEFAULT_NUM_VARIANTS: u32 = 3;
pub const DEFAULT_MAX_ARMS_PER_STATE: u32 = 300;

const DEFAULT_W_BANDIT: f64 = 0.7;
const DEFAULT_W_OFFLINE: f64 = 0.3;
const DEFAULT_EXPLORE_NOISE: f64 = 0.05;
const DEFAULT_ALPHA: f64 = 1.0;
const DEFAULT_W_GLOBAL: f64 = 0.7;
const DEFAULT_W_USER: f64 = 0.3;
const DEFAULT_VALUE_WEIGHT: f64 = 0.0001;
const DEFAULT_REWARD_IMPRESSION: f64 = 0.0;
const DEFAULT_REWARD_CLICK: f64 = 1.0;
const DEFAULT_REWARD_ATC: f64 = 3.0;
const DEFAULT_REWARD_ORDER: f64 = 5.0;

/// Fully resolved scoring/learning parameters. Built by the resolver from
/// defaults plus the persisted [`ConfigRecord`] for (slot, variant).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub num_segments: u32,
    pub num_variants: u32,

    /// Blend weights for the fused score; the sum is not required to be 1.
    pub w_bandit: f64,
    pub w_offline: f64,
    /// Additive uniform noise in `[0, explore_noise)` for non-control
    /// variants.
    pub explore_noise: f64,
    /// UCB exploration coefficient.
    pub alpha: f64,

    /// How much monetary value influences the reward.
    pub value_weight: f64,

    /// Per-state arm cap for both global and user states; 0 disables.
    pub max_arms_per_state: u32,

    /// How much the global vs per-user bandit scores matter.
    pub w_global: f64,
    pub w_user: f64,

    pub reward_impression: f64,
    pub reward_click: f64,
    pub reward_atc: f64,
    pub reward_order: f64,

    pub features: FeatureFlags,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_segments: DEFAULT_NUM_SEGMENTS,
            num_variants: DEFAULT_NUM_VARIANTS,
            w_bandit: DEFAULT_W_BANDIT,
            w_offline: DEFAULT_W_OFFLINE,
            explore_noise: DEFAULT_EXPLORE_NOISE,
            alpha: DEFAULT_ALPHA,
            value_weight: DEFAULT_VALUE_WEIGHT,
            max_arms_per_state: DEFAULT_MAX_ARMS_PER_STATE,
            w_global: DEFAULT_W_GLOBAL,
            w_user: DEFAULT_W_USER,
            reward_impression: DEFAULT_REWARD_IMPRESSION,
            reward_click: DEFAULT_REWARD_CLICK,
            reward_atc: DEFAULT_REWARD_ATC,
            reward_order: DEFAULT_REWARD_ORDER,
            features: FeatureFlags {
                use_bias: true,
                use_time_bucket: true,
                use_dow_bucket: true,
                use_slot_hash: true,
                use_segment: true,
                use_product_hash: true,
                use_user_hash: false,
            },
        }
    }
}

impl Config {
    /// Overlay a persisted record on top of this config. Field-for-field
    /// copy; the record is authoritative for everything it stores.
    pub fn with_record(&self, record: &ConfigRecord) -> Config {
        let mut cfg = self.clone();

        cfg.num_segments = record.num_segments;
        cfg.num_variants = record.num_variants;

        cfg.w_bandit = record.w_bandit;
        cfg.w_offline = record.w_offline;
        cfg.explore_noise = record.explore_noise;
        cfg.alpha = record.alpha;

        cfg.value_weight = record.value_weight;
        cfg.max_arms_per_state = record.max_arms_per_state;

        cfg.w_global = record.w_global;
        cfg.w_user = record.w_user;

        cfg.reward_impression = record.reward_impression;
        cfg.reward_click = record.reward_click;
        cfg.reward_atc = record.reward_atc;
        cfg.reward_order = record.reward_order;

        cfg.features = record.features;

        cfg
    }

    /// Effective (global, user) blend: the defaults kick in when an operator
    /// zeroes both weights, so bandit-enabled variants never silently score 0.
    pub fn effective_state_weights(&self) -> (f64, f64) {
        if self.w_global == 0.0 && self.w_user == 0.0 {
            (DEFAULT_W_GLOBAL, DEFAULT_W_USER)
        } else {
            (self.w_global, self.w_user)
        }
    }
}
