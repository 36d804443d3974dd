//! Feature vectorization.
//!
//! Maps (user, slot, product, segment, context, flags) onto a fixed
//! 7-dimensional vector. Slot assignments:
//!
//! | index | flag | value |
//! |-------|------|-------|
//! | 0 | `use_bias` | 1.0 |
//! | 1 | `use_time_bucket` | time-of-day bucket in {0, 0.33, 0.66, 1.0} |
//! | 2 | `use_dow_bucket` | day-of-week / 6 |
//! | 3 | (always) | platform hash, 0.5 when platform empty |
//! | 4 | `use_slot_hash` | slot hash, 0 for empty slot |
//! | 5 | `use_segment` | segment / num_segments |
//! | 6 | `use_user_hash` or `use_product_hash` | composite identity hash |
//!
//! Disabled slots are exactly zero so a toggled-off feature contributes
//! nothing to any score.
//!
//! The stable hash is FNV-1a (32-bit) normalized into the unit interval.
//! It doubles as the A/B assignment hash, so it must not change across
//! processes or releases.

use chrono::{Datelike, Local, Timelike};

use crate::bandit::config::Config;
use crate::bandit::context::{int_value, str_value, Context};
use crate::bandit::math::{Vector, FEATURE_DIM};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a of the input string.
pub fn fnv1a(s: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for byte in s.as_bytes() {
        h ^= u32::from(*byte);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// FNV-1a normalized into `[0, 1]`.
pub fn unit_hash(s: &str) -> f64 {
    f64::from(fnv1a(s)) / f64::from(u32::MAX)
}

/// Time-of-day bucket from an explicit label.
fn time_bucket_from_label(label: &str) -> Option<f64> {
    match label {
        "night" => Some(0.0),
        "morning" => Some(0.33),
        "afternoon" => Some(0.66),
        "evening" => Some(1.0),
        _ => None,
    }
}

/// Time-of-day bucket from the hour: <6, <12, <18 thresholds.
fn time_bucket_from_hour(hour: u32) -> f64 {
    match hour {
        h if h < 6 => 0.0,
        h if h < 12 => 0.33,
        h if h < 18 => 0.66,
        _ => 1.0,
    }
}

/// Day-of-week in [0,6] mapped onto [0,1]; out-of-range values clamp to 0.
fn dow_bucket(dow: i64) -> f64 {
    if !(0..=6).contains(&dow) {
        return 0.0;
    }
    dow as f64 / 6.0
}

/// Build the feature vector for one candidate.
pub fn build_feature_vector(
    user_id: u64,
    slot: &str,
    product_id: u64,
    cfg: &Config,
    segment: u32,
    ctx: &Context,
) -> Vector {
    let flags = &cfg.features;
    let mut x = [0.0; FEATURE_DIM];

    if flags.use_bias {
        x[0] = 1.0;
    }

    if flags.use_time_bucket {
        x[1] = str_value(ctx, "time_bucket")
            .and_then(time_bucket_from_label)
            .unwrap_or_else(|| time_bucket_from_hour(Local::now().hour()));
    }

    if flags.use_dow_bucket {
        let dow = int_value(ctx, "dow")
            .unwrap_or_else(|| i64::from(Local::now().weekday().num_days_from_sunday()));
        x[2] = dow_bucket(dow);
    }

    // Platform is always populated: hashed when present, midpoint otherwise.
    let platform = str_value(ctx, "platform").unwrap_or("");
    x[3] = if platform.is_empty() {
        0.5
    } else {
        unit_hash(&format!("platform:{platform}"))
    };

    if flags.use_slot_hash && !slot.is_empty() {
        x[4] = unit_hash(&format!("slot:{slot}"));
    }

    if flags.use_segment && cfg.num_segments > 0 {
        x[5] = f64::from(segment) / f64::from(cfg.num_segments);
    }

    if flags.use_user_hash {
        let mut key = format!("user:{user_id}|prod:{product_id}");
        if let Some(tier) = str_value(ctx, "user_tier") {
            key.push_str(&format!("|tier:{tier}"));
        }
        if let Some(campaign) = str_value(ctx, "campaign_id") {
            key.push_str(&format!("|camp:{campaign}"));
        }
        x[6] = unit_hash(&key);
    } else if flags.use_product_hash {
        x[6] = unit_hash(&format!("prod:{product_id}"));
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::context::ContextValue;
    use crate::domain::FeatureFlags;

    fn all_flags_on() -> Config {
        let mut cfg = Config::default();
        cfg.features = FeatureFlags {
            use_bias: true,
            use_time_bucket: true,
            use_dow_bucket: true,
            use_slot_hash: true,
            use_segment: true,
            use_product_hash: true,
            use_user_hash: true,
        };
        cfg
    }

    #[test]
    fn test_fnv1a_reference_values() {
        // Standard FNV-1a 32-bit test vectors.
        assert_eq!(fnv1a(""), 0x811c9dc5);
        assert_eq!(fnv1a("a"), 0xe40c292c);
        assert_eq!(fnv1a("foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_unit_hash_in_unit_interval() {
        for s in ["", "a", "platform:ios", "slot:home_top", "user:1|prod:9"] {
            let v = unit_hash(s);
            assert!((0.0..=1.0).contains(&v), "{s} hashed to {v}");
        }
    }

    #[test]
    fn test_full_context_vector() {
        // All flags on, explicit context: every slot is pinned or
        // hash-deterministic.
        let cfg = all_flags_on();
        let mut ctx = Context::new();
        ctx.insert("platform".to_string(), "ios".into());
        ctx.insert("time_bucket".to_string(), "evening".into());
        ctx.insert("dow".to_string(), ContextValue::Int(3));
        ctx.insert("user_tier".to_string(), "gold".into());
        ctx.insert("campaign_id".to_string(), "c1".into());

        let x = build_feature_vector(1, "s", 9, &cfg, 1, &ctx);

        assert_eq!(x[0], 1.0);
        assert_eq!(x[1], 1.0);
        assert_eq!(x[2], 0.5);
        assert!((x[5] - 1.0 / 3.0).abs() < 1e-9);
        for idx in [3, 4, 6] {
            assert!((0.0..=1.0).contains(&x[idx]), "x[{idx}] = {}", x[idx]);
            assert!(x[idx] != 0.0);
        }

        // Hash slots are deterministic across calls.
        let again = build_feature_vector(1, "s", 9, &cfg, 1, &ctx);
        assert_eq!(x, again);
    }

    #[test]
    fn test_all_flags_off_leaves_only_platform() {
        let mut cfg = Config::default();
        cfg.features = FeatureFlags::default();

        let mut ctx = Context::new();
        ctx.insert("platform".to_string(), "ios".into());

        let x = build_feature_vector(1, "home", 42, &cfg, 2, &ctx);
        for (i, v) in x.iter().enumerate() {
            if i == 3 {
                assert!(*v > 0.0);
            } else {
                assert_eq!(*v, 0.0, "x[{i}] should be gated off");
            }
        }
    }

    #[test]
    fn test_empty_platform_defaults_to_midpoint() {
        let cfg = all_flags_on();
        let ctx = Context::new();
        let x = build_feature_vector(1, "home", 42, &cfg, 0, &ctx);
        assert_eq!(x[3], 0.5);
    }

    #[test]
    fn test_empty_slot_hash_is_zero() {
        let cfg = all_flags_on();
        let ctx = Context::new();
        let x = build_feature_vector(1, "", 42, &cfg, 0, &ctx);
        assert_eq!(x[4], 0.0);
    }

    #[test]
    fn test_product_hash_without_user_hash() {
        let mut cfg = all_flags_on();
        cfg.features.use_user_hash = false;

        let ctx = Context::new();
        let x = build_feature_vector(1, "home", 42, &cfg, 0, &ctx);
        assert!((x[6] - unit_hash("prod:42")).abs() < 1e-12);
    }

    #[test]
    fn test_composite_hash_includes_tier_and_campaign() {
        let cfg = all_flags_on();

        let bare = build_feature_vector(1, "home", 42, &cfg, 0, &Context::new());

        let mut ctx = Context::new();
        ctx.insert("user_tier".to_string(), "gold".into());
        ctx.insert("campaign_id".to_string(), "c1".into());
        let enriched = build_feature_vector(1, "home", 42, &cfg, 0, &ctx);

        assert!((bare[6] - unit_hash("user:1|prod:42")).abs() < 1e-12);
        assert!(
            (enriched[6] - unit_hash("user:1|prod:42|tier:gold|camp:c1")).abs() < 1e-12
        );
        assert!(bare[6] != enriched[6]);
    }

    #[test]
    fn test_dow_bucket_bounds() {
        assert_eq!(dow_bucket(0), 0.0);
        assert_eq!(dow_bucket(6), 1.0);
        assert_eq!(dow_bucket(3), 0.5);
        assert_eq!(dow_bucket(-1), 0.0);
        assert_eq!(dow_bucket(7), 0.0);
    }
}
