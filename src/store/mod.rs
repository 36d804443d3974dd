//! Storage contracts consumed by the bandit core.
//!
//! Seven narrow capabilities, bound at service construction. Each
//! implementation owns its thread safety (pooled DB connection, HTTP
//! client, in-memory map). The core only assumes per-key atomic upsert with
//! last-writer-wins; see DESIGN.md for the lost-update discussion.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::bandit::SlotState;
use crate::domain::{BanditEvent, ConfigRecord, OfflineCandidate};

/// Failure inside a store implementation. Serving paths surface these as
/// `Internal`; admin paths pass them through.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Persisted bandit state by composite key. Upsert semantics,
/// last-writer-wins; a save is atomic per key.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_state(&self, key: &str) -> Result<Option<SlotState>, StoreError>;
    async fn save_state(&self, key: &str, state: &SlotState) -> Result<(), StoreError>;
}

/// Append-only feedback event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn save_event(&self, event: &BanditEvent) -> Result<(), StoreError>;
}

/// Offline-ranker output per slot, sorted by score descending.
#[async_trait]
pub trait OfflineCandidateStore: Send + Sync {
    async fn get_by_slot(
        &self,
        slot: &str,
        limit: usize,
    ) -> Result<Vec<OfflineCandidate>, StoreError>;
}

/// Product enumeration used as the candidate fallback when no offline store
/// is bound.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn list_products(&self) -> Result<Vec<u64>, StoreError>;
}

/// Per-(slot, variant) configuration rows.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(
        &self,
        slot: &str,
        variant: u32,
    ) -> Result<Option<ConfigRecord>, StoreError>;
    async fn upsert_config(&self, record: &ConfigRecord) -> Result<(), StoreError>;
}

/// Persisted user → segment assignments.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn get_segment(&self, user_id: u64) -> Result<Option<u32>, StoreError>;
    async fn upsert_segment(&self, user_id: u64, segment: u32) -> Result<(), StoreError>;
}

/// Optional enrichment: loyalty tier and active campaign for a user.
/// Lookup failures are swallowed by the service (the features simply stay
/// unset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    pub tier: Option<String>,
    pub campaign_id: Option<String>,
}

#[async_trait]
pub trait UserContextStore: Send + Sync {
    async fn get_user_context(&self, user_id: u64) -> Result<UserContext, StoreError>;
}
