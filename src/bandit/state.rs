//! Per-arm and per-slot bandit state.
//!
//! A `SlotState` is persisted under a composite key as one JSON document and
//! reloaded whole; the store only needs atomic per-key upsert. Product IDs
//! serialize as string keys in the `arms` object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bandit::math::{add_outer, add_scaled, Matrix, Vector, FEATURE_DIM};

/// Diagonal value for freshly materialized arms. Positive definite from the
/// start, so the first inversion succeeds and UCB is finite immediately.
pub const INITIAL_DIAGONAL: f64 = 0.1;

const DEFAULT_ALPHA: f64 = 1.0;

/// Sufficient statistics for one (state-key, product) linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    /// Design matrix; positive definite: initialized to `0.1·I`, only ever
    /// accumulates `x·xᵀ` and multiplicative decay.
    #[serde(rename = "A")]
    pub a: Matrix,
    pub b: Vector,
    /// Accepted updates, decayed alongside A and b.
    #[serde(default)]
    pub count: u64,
    /// Epoch milliseconds of the last accepted update; drives eviction.
    #[serde(default)]
    pub last_updated: u64,
}

impl ArmState {
    pub fn new() -> Self {
        let mut a = [[0.0; FEATURE_DIM]; FEATURE_DIM];
        for i in 0..FEATURE_DIM {
            a[i][i] = INITIAL_DIAGONAL;
        }
        ArmState {
            a,
            b: [0.0; FEATURE_DIM],
            count: 0,
            last_updated: 0,
        }
    }

    /// Drop all learned signal. Used when inversion reports a singular
    /// matrix; the arm re-enters the cold-start regime.
    pub fn reset(&mut self) {
        *self = ArmState::new();
    }

    /// Soft forgetting: scale `A`, `b` and `count` by `1 - rate`.
    /// No-op when `rate <= 0`.
    pub fn apply_decay(&mut self, rate: f64) {
        if rate <= 0.0 {
            return;
        }
        let decay = 1.0 - rate;

        for i in 0..FEATURE_DIM {
            for j in 0..FEATURE_DIM {
                self.a[i][j] *= decay;
            }
            self.b[i] *= decay;
        }

        if self.count > 0 {
            self.count = (self.count as f64 * decay) as u64;
        }
    }

    /// Accept one reward observation: decay, then `A += x·xᵀ`, `b += r·x`.
    pub fn observe(&mut self, x: &Vector, reward: f64, decay_rate: f64, now_ms: u64) {
        self.apply_decay(decay_rate);
        add_outer(&mut self.a, x);
        add_scaled(&mut self.b, x, reward);
        self.count += 1;
        self.last_updated = now_ms;
    }
}

impl Default for ArmState {
    fn default() -> Self {
        Self::new()
    }
}

/// All arms sharing one state key, plus the UCB exploration coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Keyed by product ID; no intrinsic order.
    #[serde(default)]
    pub arms: HashMap<u64, ArmState>,
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

impl SlotState {
    pub fn new() -> Self {
        SlotState {
            alpha: DEFAULT_ALPHA,
            arms: HashMap::new(),
        }
    }

    /// Materialize the arm for `product_id` lazily.
    pub fn arm_mut(&mut self, product_id: u64) -> &mut ArmState {
        self.arms.entry(product_id).or_default()
    }
}

impl Default for SlotState {
    fn default() -> Self {
        Self::new()
    }
}

/// Key of the shared arm pool for a (slot, segment).
pub fn global_state_key(slot: &str, segment: u32) -> String {
    format!("{slot}|seg={segment}|global")
}

/// Key of the per-user delta for a (slot, segment, user).
pub fn user_state_key(slot: &str, segment: u32, user_id: u64) -> String {
    format!("{slot}|seg={segment}|user={user_id}")
}
