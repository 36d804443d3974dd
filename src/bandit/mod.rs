//! Online contextual-bandit recommendation core.
//!
//! Pluggable components around three entry points:
//! - **recommend**: rank offline candidates by a fused offline + bandit score
//! - **debug_recommend**: the same scoring with the full per-candidate breakdown
//! - **log_feedback**: online update of the per-arm linear models
//!
//! State is sharded by `(slot, segment)` with a shared global arm pool plus a
//! per-user delta, persisted through the [`StateStore`](crate::store::StateStore)
//! contract as JSON documents.

mod admin;
pub mod candidates;
pub mod config;
pub mod context;
mod debug;
pub mod eligibility;
pub mod features;
pub mod gc;
pub mod math;
pub mod metrics;
pub mod resolver;
mod rewards;
pub mod scoring;
mod service;
pub mod state;
pub mod trace;

#[cfg(test)]
mod tests;

pub use candidates::CandidateLoader;
pub use config::{Config, DEFAULT_MAX_ARMS_PER_STATE, DEFAULT_NUM_SEGMENTS, DEFAULT_NUM_VARIANTS};
pub use context::{
    base_context, int_value, merge_context, str_value, Context, ContextValue,
};
pub use eligibility::{EligibilityChecker, NoopEligibility};
pub use features::{build_feature_vector, fnv1a, unit_hash};
pub use gc::cap_arms;
pub use math::{dot, invert, mat_vec_mul, Matrix, Singular, Vector, DECAY_RATE, FEATURE_DIM};
pub use metrics::BanditMetrics;
pub use resolver::{ConfigResolver, Resolved};
pub use scoring::{thompson_score, ucb_score, Strategy};
pub use service::{BanditService, BanditServiceBuilder};
pub use state::{global_state_key, user_state_key, ArmState, SlotState, INITIAL_DIAGONAL};
pub use trace::RequestContext;
