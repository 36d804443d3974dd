//! Request-scoped context map.
//!
//! The context is opaque to everything except the featurizer, which looks up
//! a fixed set of keys with expected types. It is modeled as a typed map with
//! checked lookups rather than untyped JSON in the hot path.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

/// One context value. Untagged on the wire, so events persist their context
/// as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::Str(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::Str(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Float(v)
    }
}

/// Ordered so serialized events are byte-stable for a given content.
pub type Context = BTreeMap<String, ContextValue>;

/// Checked string lookup: `None` unless the key holds a string.
pub fn str_value<'a>(ctx: &'a Context, key: &str) -> Option<&'a str> {
    match ctx.get(key) {
        Some(ContextValue::Str(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Checked integer lookup: `None` unless the key holds an integer.
pub fn int_value(ctx: &Context, key: &str) -> Option<i64> {
    match ctx.get(key) {
        Some(ContextValue::Int(v)) => Some(*v),
        _ => None,
    }
}

/// Coarse time-of-day label for the given hour.
pub fn time_bucket_label(hour: u32) -> &'static str {
    match hour {
        h if h < 6 => "night",
        h if h < 12 => "morning",
        h if h < 18 => "afternoon",
        _ => "evening",
    }
}

/// Base context assembled by the service for every request:
/// `{time_bucket, dow, platform, segment, variant, event_time}`.
pub fn base_context(
    now: DateTime<Local>,
    platform: &str,
    segment: u32,
    variant: u32,
) -> Context {
    let mut ctx = Context::new();
    ctx.insert(
        "time_bucket".to_string(),
        time_bucket_label(now.hour()).into(),
    );
    ctx.insert(
        "dow".to_string(),
        ContextValue::Int(i64::from(now.weekday().num_days_from_sunday())),
    );
    ctx.insert("platform".to_string(), platform.into());
    ctx.insert("segment".to_string(), ContextValue::Int(i64::from(segment)));
    ctx.insert("variant".to_string(), ContextValue::Int(i64::from(variant)));
    ctx.insert(
        "event_time".to_string(),
        ContextValue::Int(now.timestamp_millis()),
    );
    ctx
}

/// Merge `overrides` on top of `base`; the caller wins on conflict.
pub fn merge_context(base: Context, overrides: &Context) -> Context {
    let mut merged = base;
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_bucket_label_thresholds() {
        assert_eq!(time_bucket_label(0), "night");
        assert_eq!(time_bucket_label(5), "night");
        assert_eq!(time_bucket_label(6), "morning");
        assert_eq!(time_bucket_label(11), "morning");
        assert_eq!(time_bucket_label(12), "afternoon");
        assert_eq!(time_bucket_label(17), "afternoon");
        assert_eq!(time_bucket_label(18), "evening");
        assert_eq!(time_bucket_label(23), "evening");
    }

    #[test]
    fn test_base_context_keys() {
        let now = Local.with_ymd_and_hms(2024, 5, 15, 20, 0, 0).unwrap();
        let ctx = base_context(now, "ios", 1, 2);

        assert_eq!(str_value(&ctx, "time_bucket"), Some("evening"));
        assert_eq!(str_value(&ctx, "platform"), Some("ios"));
        assert_eq!(int_value(&ctx, "segment"), Some(1));
        assert_eq!(int_value(&ctx, "variant"), Some(2));
        assert!(int_value(&ctx, "dow").is_some());
        assert!(int_value(&ctx, "event_time").is_some());
    }

    #[test]
    fn test_merge_caller_wins() {
        let now = Local.with_ymd_and_hms(2024, 5, 15, 20, 0, 0).unwrap();
        let base = base_context(now, "ios", 1, 2);

        let mut overrides = Context::new();
        overrides.insert("platform".to_string(), "android".into());
        overrides.insert("campaign_id".to_string(), "c1".into());

        let merged = merge_context(base, &overrides);
        assert_eq!(str_value(&merged, "platform"), Some("android"));
        assert_eq!(str_value(&merged, "campaign_id"), Some("c1"));
        assert_eq!(str_value(&merged, "time_bucket"), Some("evening"));
    }

    #[test]
    fn test_checked_lookups_reject_wrong_type() {
        let mut ctx = Context::new();
        ctx.insert("dow".to_string(), ContextValue::Str("three".to_string()));
        assert_eq!(int_value(&ctx, "dow"), None);
        assert_eq!(str_value(&ctx, "missing"), None);
    }

    #[test]
    fn test_context_value_json_roundtrip() {
        let mut ctx = Context::new();
        ctx.insert("dow".to_string(), ContextValue::Int(3));
        ctx.insert("platform".to_string(), "ios".into());
        ctx.insert("weight".to_string(), ContextValue::Float(0.5));

        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
        assert_eq!(int_value(&back, "dow"), Some(3));
    }
}
