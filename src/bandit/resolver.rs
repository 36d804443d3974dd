//! Per-request configuration, segment, and variant resolution.
//!
//! The variant and segment derivations are pure functions of the inputs and
//! the store contents; no wall-clock anywhere. They are the boundary of A/B
//! assignment, so they must be stable across processes and releases.

use std::sync::Arc;

use tracing::debug;

use crate::bandit::config::{Config, DEFAULT_NUM_SEGMENTS};
use crate::bandit::features::fnv1a;
use crate::store::{ConfigStore, SegmentStore};

/// Output of [`ConfigResolver::resolve_for_user`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: Config,
    pub segment: u32,
    pub variant: u32,
}

/// Resolves (config, segment, variant) for a (user, slot) pair.
///
/// Both stores are optional: an unbound config store means built-in defaults
/// everywhere, an unbound segment store means hash-derived segments.
pub struct ConfigResolver {
    config_store: Option<Arc<dyn ConfigStore>>,
    segment_store: Option<Arc<dyn SegmentStore>>,
    defaults: Config,
}

impl ConfigResolver {
    pub fn new(
        config_store: Option<Arc<dyn ConfigStore>>,
        segment_store: Option<Arc<dyn SegmentStore>>,
    ) -> Self {
        ConfigResolver {
            config_store,
            segment_store,
            defaults: Config::default(),
        }
    }

    /// Replace the built-in defaults (used when the deployment ships its own
    /// baseline).
    pub fn with_defaults(mut self, defaults: Config) -> Self {
        self.defaults = defaults;
        self
    }

    /// Stable variant assignment: `fnv1a("{user}:{slot}") % num_variants`.
    /// Everyone lands in variant 0 when fewer than two variants exist.
    pub fn assign_variant(user_id: u64, slot: &str, num_variants: u32) -> u32 {
        if num_variants <= 1 {
            return 0;
        }
        fnv1a(&format!("{user_id}:{slot}")) % num_variants
    }

    /// Main entry point used by all three service operations.
    pub async fn resolve_for_user(&self, user_id: u64, slot: &str) -> Resolved {
        // Base config for the slot, then the user's variant override.
        let base = self.load_config(slot, 0).await;
        let variant = Self::assign_variant(user_id, slot, base.num_variants);
        let config = if variant == 0 {
            base
        } else {
            self.load_config_or(slot, variant, base).await
        };

        let segment = self.user_segment(user_id, &config).await;

        debug!(user_id, slot, segment, variant, "resolved bandit config");

        Resolved {
            config,
            segment,
            variant,
        }
    }

    /// Config for (slot, variant), falling back to defaults on miss or error.
    async fn load_config(&self, slot: &str, variant: u32) -> Config {
        self.load_config_or(slot, variant, self.defaults.clone())
            .await
    }

    async fn load_config_or(&self, slot: &str, variant: u32, fallback: Config) -> Config {
        let Some(store) = &self.config_store else {
            return fallback;
        };
        match store.get_config(slot, variant).await {
            Ok(Some(record)) => self.defaults.with_record(&record),
            Ok(None) => fallback,
            Err(err) => {
                debug!(slot, variant, %err, "config fetch failed, using fallback");
                fallback
            }
        }
    }

    /// Persisted segment when one exists, otherwise `user_id % num_segments`.
    async fn user_segment(&self, user_id: u64, config: &Config) -> u32 {
        if let Some(store) = &self.segment_store {
            if let Ok(Some(segment)) = store.get_segment(user_id).await {
                if config.num_segments > 0 {
                    return segment % config.num_segments;
                }
                return segment;
            }
        }

        let num_segments = if config.num_segments > 0 {
            config.num_segments
        } else {
            DEFAULT_NUM_SEGMENTS
        };
        (user_id % u64::from(num_segments)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigRecord;
    use crate::store::memory::{InMemoryConfigStore, InMemorySegmentStore};

    #[test]
    fn test_assign_variant_deterministic() {
        let a = ConfigResolver::assign_variant(42, "home", 3);
        let b = ConfigResolver::assign_variant(42, "home", 3);
        assert_eq!(a, b);
        assert!(a < 3);
    }

    #[test]
    fn test_assign_variant_single_bucket() {
        assert_eq!(ConfigResolver::assign_variant(42, "home", 0), 0);
        assert_eq!(ConfigResolver::assign_variant(42, "home", 1), 0);
    }

    #[test]
    fn test_assign_variant_reference_values() {
        // fnv1a("7:home") == 1597692675, which is 0 mod 3: user 7 on "home"
        // is a control-bucket user under the default variant count.
        assert_eq!(ConfigResolver::assign_variant(7, "home", 3), 0);
        // fnv1a("7:home_top") == 3306130583 == 2 mod 3.
        assert_eq!(ConfigResolver::assign_variant(7, "home_top", 3), 2);
    }

    #[tokio::test]
    async fn test_resolve_defaults_without_stores() {
        let resolver = ConfigResolver::new(None, None);
        let resolved = resolver.resolve_for_user(7, "home").await;

        assert_eq!(resolved.config, Config::default());
        assert_eq!(resolved.segment, 7 % 3);
        assert_eq!(resolved.variant, 0);
    }

    #[tokio::test]
    async fn test_resolve_variant_override() {
        let store = Arc::new(InMemoryConfigStore::new());
        // Base row widens the variant space; the variant row retunes alpha.
        store
            .upsert(ConfigRecord {
                slot: "home_top".to_string(),
                variant: 0,
                num_segments: 3,
                num_variants: 3,
                alpha: 1.0,
                ..zeroed_record("home_top", 0)
            })
            .await;
        store
            .upsert(ConfigRecord {
                slot: "home_top".to_string(),
                variant: 2,
                num_segments: 3,
                num_variants: 3,
                alpha: 9.0,
                ..zeroed_record("home_top", 2)
            })
            .await;

        let resolver = ConfigResolver::new(Some(store), None);
        // User 7 lands in variant 2 on home_top.
        let resolved = resolver.resolve_for_user(7, "home_top").await;
        assert_eq!(resolved.variant, 2);
        assert_eq!(resolved.config.alpha, 9.0);
    }

    #[tokio::test]
    async fn test_resolve_variant_miss_keeps_base() {
        let store = Arc::new(InMemoryConfigStore::new());
        store
            .upsert(ConfigRecord {
                slot: "home_top".to_string(),
                variant: 0,
                num_segments: 3,
                num_variants: 3,
                alpha: 4.0,
                ..zeroed_record("home_top", 0)
            })
            .await;

        let resolver = ConfigResolver::new(Some(store), None);
        let resolved = resolver.resolve_for_user(7, "home_top").await;
        assert_eq!(resolved.variant, 2);
        // No row for variant 2: the base row stands.
        assert_eq!(resolved.config.alpha, 4.0);
    }

    #[tokio::test]
    async fn test_persisted_segment_wraps_into_range() {
        let segments = Arc::new(InMemorySegmentStore::new());
        segments.upsert_segment(9, 7).await.unwrap();

        let resolver = ConfigResolver::new(None, Some(segments));
        let resolved = resolver.resolve_for_user(9, "home").await;
        assert_eq!(resolved.segment, 7 % 3);
    }

    fn zeroed_record(slot: &str, variant: u32) -> ConfigRecord {
        ConfigRecord {
            slot: slot.to_string(),
            variant,
            num_segments: 0,
            num_variants: 0,
            w_bandit: 0.7,
            w_offline: 0.3,
            explore_noise: 0.0,
            alpha: 1.0,
            value_weight: 0.0,
            reward_impression: 0.0,
            reward_click: 1.0,
            reward_atc: 3.0,
            reward_order: 5.0,
            features: Default::default(),
            w_global: 0.7,
            w_user: 0.3,
            max_arms_per_state: 300,
        }
    }
}
