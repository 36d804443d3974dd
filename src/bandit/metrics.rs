//! Service metrics: feedback counters and latency histograms.
//!
//! Lock-free on the hot path; a Prometheus scrape renders the text
//! exposition on demand. The collector is owned by the service and shared
//! with the HTTP layer via `Arc`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Atomic f64 built on `AtomicU64` bit casts (std has no `AtomicF64`).
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(val: f64) -> Self {
        Self(AtomicU64::new(val.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn fetch_add(&self, val: f64) {
        loop {
            let current = self.0.load(Ordering::Relaxed);
            let new = (f64::from_bits(current) + val).to_bits();
            if self
                .0
                .compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}

/// Upper bounds (milliseconds) for the latency histogram buckets; the last
/// bucket is +Inf.
const LATENCY_BOUNDS_MS: [f64; 8] = [1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0];

/// Fixed-bucket latency histogram.
struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BOUNDS_MS.len() + 1],
    sum_ms: AtomicF64,
    count: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        LatencyHistogram {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ms: AtomicF64::new(0.0),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, ms: f64) {
        let idx = LATENCY_BOUNDS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(LATENCY_BOUNDS_MS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn render(&self, out: &mut String, name: &str) {
        let mut cumulative = 0u64;
        for (i, bound) in LATENCY_BOUNDS_MS.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!("{name}_bucket{{le=\"{bound}\"}} {cumulative}\n"));
        }
        cumulative += self.buckets[LATENCY_BOUNDS_MS.len()].load(Ordering::Relaxed);
        out.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {cumulative}\n"));
        out.push_str(&format!("{name}_sum {}\n", self.sum_ms.load()));
        out.push_str(&format!(
            "{name}_count {}\n",
            self.count.load(Ordering::Relaxed)
        ));
    }
}

/// Label key for the feedback counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FeedbackKey {
    slot: String,
    event_type: String,
    segment: u32,
    variant: u32,
}

/// Metrics collector for the bandit service.
pub struct BanditMetrics {
    feedback_events: RwLock<HashMap<FeedbackKey, AtomicU64>>,
    recommend_latency: LatencyHistogram,
    feedback_latency: LatencyHistogram,
    errors_total: AtomicU64,
}

impl BanditMetrics {
    pub fn new() -> Self {
        BanditMetrics {
            feedback_events: RwLock::new(HashMap::new()),
            recommend_latency: LatencyHistogram::new(),
            feedback_latency: LatencyHistogram::new(),
            errors_total: AtomicU64::new(0),
        }
    }

    /// Count one accepted feedback event by (slot, event_type, segment,
    /// variant).
    pub fn record_feedback_event(
        &self,
        slot: &str,
        event_type: &str,
        segment: u32,
        variant: u32,
    ) {
        let key = FeedbackKey {
            slot: slot.to_string(),
            event_type: event_type.to_string(),
            segment,
            variant,
        };

        // Fast path: the label set already exists.
        {
            let counters = self.feedback_events.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counters.get(&key) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut counters = self.feedback_events.write().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn feedback_event_count(
        &self,
        slot: &str,
        event_type: &str,
        segment: u32,
        variant: u32,
    ) -> u64 {
        let key = FeedbackKey {
            slot: slot.to_string(),
            event_type: event_type.to_string(),
            segment,
            variant,
        };
        self.feedback_events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn observe_recommend_latency_ms(&self, ms: f64) {
        self.recommend_latency.observe(ms);
    }

    pub fn observe_feedback_latency_ms(&self, ms: f64) {
        self.feedback_latency.observe(ms);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn errors_total(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    /// Render the Prometheus text exposition.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str(
            "# HELP bandit_feedback_events_total Feedback events by slot, event_type, segment, and variant.\n",
        );
        out.push_str("# TYPE bandit_feedback_events_total counter\n");
        {
            let counters = self.feedback_events.read().unwrap_or_else(|e| e.into_inner());
            let mut rows: Vec<(String, u64)> = counters
                .iter()
                .map(|(key, counter)| {
                    (
                        format!(
                            "bandit_feedback_events_total{{slot=\"{}\",event_type=\"{}\",segment=\"{}\",variant=\"{}\"}}",
                            key.slot, key.event_type, key.segment, key.variant
                        ),
                        counter.load(Ordering::Relaxed),
                    )
                })
                .collect();
            rows.sort();
            for (label, value) in rows {
                out.push_str(&format!("{label} {value}\n"));
            }
        }

        out.push_str("# TYPE bandit_recommend_latency_ms histogram\n");
        self.recommend_latency
            .render(&mut out, "bandit_recommend_latency_ms");

        out.push_str("# TYPE bandit_feedback_latency_ms histogram\n");
        self.feedback_latency
            .render(&mut out, "bandit_feedback_latency_ms");

        out.push_str("# TYPE bandit_errors_total counter\n");
        out.push_str(&format!(
            "bandit_errors_total {}\n",
            self.errors_total.load(Ordering::Relaxed)
        ));

        out
    }
}

impl Default for BanditMetrics {
    fn default() -> Self {
        Self::new()
    }
}
