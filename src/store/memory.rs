//! In-memory store implementations.
//!
//! Used by tests and the demo server. The state store round-trips
//! `SlotState` through JSON so the real persistence shape is exercised, and
//! each save replaces the whole document under its key (the same atomic
//! per-key upsert, last-writer-wins contract a database row gives).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::bandit::SlotState;
use crate::domain::{BanditEvent, ConfigRecord, OfflineCandidate};
use crate::store::{
    ConfigStore, EventStore, OfflineCandidateStore, ProductCatalog, SegmentStore, StateStore,
    StoreError, UserContext, UserContextStore,
};

/// State store over a `HashMap<key, json>`.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, String>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct state keys (test helper).
    pub fn key_count(&self) -> usize {
        self.states.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Raw JSON document for a key (test helper).
    pub fn raw(&self, key: &str) -> Option<String> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_state(&self, key: &str) -> Result<Option<SlotState>, StoreError> {
        let raw = {
            let states = self.states.read().unwrap_or_else(|e| e.into_inner());
            states.get(key).cloned()
        };
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_state(&self, key: &str, state: &SlotState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.insert(key.to_string(), json);
        Ok(())
    }
}

/// Append-only event log with auto-assigned IDs.
pub struct InMemoryEventStore {
    events: RwLock<Vec<BanditEvent>>,
    next_id: AtomicU64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        InMemoryEventStore {
            events: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> Vec<BanditEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_event(&self, event: &BanditEvent) -> Result<(), StoreError> {
        let mut stored = event.clone();
        stored.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(stored);
        Ok(())
    }
}

/// Offline candidate rows per slot, served sorted by score descending.
#[derive(Default)]
pub struct InMemoryOfflineStore {
    rows: RwLock<HashMap<String, Vec<OfflineCandidate>>>,
}

impl InMemoryOfflineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows for a slot.
    pub fn put(&self, slot: &str, rows: Vec<OfflineCandidate>) {
        self.rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(slot.to_string(), rows);
    }
}

#[async_trait]
impl OfflineCandidateStore for InMemoryOfflineStore {
    async fn get_by_slot(
        &self,
        slot: &str,
        limit: usize,
    ) -> Result<Vec<OfflineCandidate>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let Some(slot_rows) = rows.get(slot) else {
            return Ok(Vec::new());
        };
        let mut out = slot_rows.clone();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out.truncate(limit);
        Ok(out)
    }
}

/// Fixed product listing.
pub struct InMemoryProductCatalog {
    products: Vec<u64>,
}

impl InMemoryProductCatalog {
    pub fn new(products: Vec<u64>) -> Self {
        InMemoryProductCatalog { products }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn list_products(&self) -> Result<Vec<u64>, StoreError> {
        Ok(self.products.clone())
    }
}

/// Config rows keyed by (slot, variant).
#[derive(Default)]
pub struct InMemoryConfigStore {
    records: RwLock<HashMap<(String, u32), ConfigRecord>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Infallible upsert for seeding and tests.
    pub async fn upsert(&self, record: ConfigRecord) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((record.slot.clone(), record.variant), record);
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_config(
        &self,
        slot: &str,
        variant: u32,
    ) -> Result<Option<ConfigRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&(slot.to_string(), variant)).cloned())
    }

    async fn upsert_config(&self, record: &ConfigRecord) -> Result<(), StoreError> {
        self.upsert(record.clone()).await;
        Ok(())
    }
}

/// User → segment assignments.
#[derive(Default)]
pub struct InMemorySegmentStore {
    segments: RwLock<HashMap<u64, u32>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn get_segment(&self, user_id: u64) -> Result<Option<u32>, StoreError> {
        let segments = self.segments.read().unwrap_or_else(|e| e.into_inner());
        Ok(segments.get(&user_id).copied())
    }

    async fn upsert_segment(&self, user_id: u64, segment: u32) -> Result<(), StoreError> {
        self.segments
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id, segment);
        Ok(())
    }
}

/// User tier/campaign enrichment.
#[derive(Default)]
pub struct InMemoryUserContextStore {
    contexts: RwLock<HashMap<u64, UserContext>>,
}

impl InMemoryUserContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, user_id: u64, context: UserContext) {
        self.contexts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id, context);
    }
}

#[async_trait]
impl UserContextStore for InMemoryUserContextStore {
    async fn get_user_context(&self, user_id: u64) -> Result<UserContext, StoreError> {
        let contexts = self.contexts.read().unwrap_or_else(|e| e.into_inner());
        Ok(contexts.get(&user_id).cloned().unwrap_or_default())
    }
}

/// A state store wrapper that fails every call. Test-only helper for the
/// store-failure paths.
pub struct FailingStateStore;

#[async_trait]
impl StateStore for FailingStateStore {
    async fn get_state(&self, _key: &str) -> Result<Option<SlotState>, StoreError> {
        Err(StoreError::Unavailable("state store down".to_string()))
    }

    async fn save_state(&self, _key: &str, _state: &SlotState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("state store down".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_store_roundtrip() {
        let store = InMemoryStateStore::new();
        assert!(store.get_state("home|seg=1|global").await.unwrap().is_none());

        let mut state = SlotState::new();
        state.arm_mut(101);
        store.save_state("home|seg=1|global", &state).await.unwrap();

        let loaded = store.get_state("home|seg=1|global").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.key_count(), 1);
    }

    #[tokio::test]
    async fn test_state_store_last_writer_wins() {
        let store = InMemoryStateStore::new();

        let mut first = SlotState::new();
        first.arm_mut(1);
        let mut second = SlotState::new();
        second.arm_mut(2);

        store.save_state("k", &first).await.unwrap();
        store.save_state("k", &second).await.unwrap();

        let loaded = store.get_state("k").await.unwrap().unwrap();
        assert!(loaded.arms.contains_key(&2));
        assert!(!loaded.arms.contains_key(&1));
    }

    #[tokio::test]
    async fn test_event_store_appends_with_ids() {
        let store = InMemoryEventStore::new();
        let event = BanditEvent {
            user_id: 7,
            slot: "home".to_string(),
            product_id: 101,
            event_type: "click".to_string(),
            ..BanditEvent::default()
        };

        store.save_event(&event).await.unwrap();
        store.save_event(&event).await.unwrap();

        let events = store.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 1);
        assert_eq!(events[1].id, 2);
    }

    #[tokio::test]
    async fn test_offline_store_sorted_and_limited() {
        let store = InMemoryOfflineStore::new();
        store.put(
            "home",
            vec![
                OfflineCandidate { product_id: 1, score: 0.2 },
                OfflineCandidate { product_id: 2, score: 0.9 },
                OfflineCandidate { product_id: 3, score: 0.5 },
            ],
        );

        let rows = store.get_by_slot("home", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, 2);
        assert_eq!(rows[1].product_id, 3);
    }

    #[tokio::test]
    async fn test_config_store_keyed_by_slot_and_variant() {
        let store = InMemoryConfigStore::new();
        let mut record = ConfigRecord {
            slot: "home".to_string(),
            variant: 0,
            num_segments: 3,
            num_variants: 3,
            w_bandit: 0.7,
            w_offline: 0.3,
            explore_noise: 0.05,
            alpha: 1.0,
            value_weight: 0.0001,
            reward_impression: 0.0,
            reward_click: 1.0,
            reward_atc: 3.0,
            reward_order: 5.0,
            features: Default::default(),
            w_global: 0.7,
            w_user: 0.3,
            max_arms_per_state: 300,
        };

        store.upsert_config(&record).await.unwrap();
        record.variant = 1;
        record.alpha = 2.0;
        store.upsert_config(&record).await.unwrap();

        assert_eq!(store.get_config("home", 0).await.unwrap().unwrap().alpha, 1.0);
        assert_eq!(store.get_config("home", 1).await.unwrap().unwrap().alpha, 2.0);
        assert!(store.get_config("home", 2).await.unwrap().is_none());
        assert!(store.get_config("pdp", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_context_store_default_when_missing() {
        let store = InMemoryUserContextStore::new();
        assert_eq!(store.get_user_context(1).await.unwrap(), UserContext::default());

        store.put(
            1,
            UserContext {
                tier: Some("gold".to_string()),
                campaign_id: Some("c1".to_string()),
            },
        );
        let ctx = store.get_user_context(1).await.unwrap();
        assert_eq!(ctx.tier.as_deref(), Some("gold"));
    }
}
