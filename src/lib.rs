//! # reco-bandit
//!
//! Online contextual-bandit recommendation engine. Personalizes ranked
//! product lists for named placements ("slots") on top of a cheap offline
//! candidate ranker, learning continuously from feedback events.
//!
//! Per-(slot, segment) and per-(slot, segment, user) LinUCB state — a d×d
//! matrix `A` and vector `b` per candidate arm — is updated online with soft
//! forgetting and bounded memory, and persisted through a narrow store
//! contract. Scoring fuses the normalized offline score with a bandit score
//! under one of three exploration strategies (UCB, Thompson sampling, pure
//! offline) selected by a deterministic per-user A/B assignment.

// Core modules
mod errors;
mod prelude;

// Feature modules
pub mod bandit;
pub mod domain;
pub mod infra;
pub mod store;

// Re-exports
pub use bandit::{
    BanditMetrics, BanditService, BanditServiceBuilder, Config, ConfigResolver, Context,
    ContextValue, EligibilityChecker, NoopEligibility, RequestContext, SlotState, Strategy,
    FEATURE_DIM,
};
pub use domain::{
    BanditEvent, ConfigRecord, DebugRecommendation, EventType, FeatureFlags, OfflineCandidate,
    Recommendation,
};
pub use errors::{Error, Result};
pub use infra::{init_logging, LogFormat};
