//! State-growth and contention stress tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bandit::{global_state_key, user_state_key, BanditService, RequestContext};
use crate::domain::BanditEvent;
use crate::store::memory::{InMemoryEventStore, InMemoryStateStore};
use crate::store::StateStore;

const STRESS_NUM_USERS: u64 = 500;
const STRESS_NUM_SEGMENTS: u64 = 3;
const STRESS_NUM_PRODUCTS: u64 = 100;
const STRESS_FEEDBACK_PER_USER: usize = 20;

const STRESS_SLOTS: [&str; 2] = ["home_top", "pdp_similar"];

/// Compares state-key and arm growth between a global-only sharding and the
/// global + per-user sharding the service uses. The per-user delta multiplies
/// the key count by the user population but keeps every individual state
/// small, which is what the arm cap is sized against.
#[test]
fn test_state_growth_global_vs_global_plus_user() {
    let mut rng = StdRng::seed_from_u64(99);

    // Global-only: one key per (slot, segment).
    let mut global_only: HashMap<String, HashSet<u64>> = HashMap::new();
    for user_id in 1..=STRESS_NUM_USERS {
        for slot in STRESS_SLOTS {
            let seg = (user_id % STRESS_NUM_SEGMENTS) as u32;
            let key = format!("{slot}|seg={seg}");
            let arms = global_only.entry(key).or_default();
            for _ in 0..STRESS_FEEDBACK_PER_USER {
                arms.insert(rng.gen_range(0..STRESS_NUM_PRODUCTS));
            }
        }
    }

    let global_only_states = global_only.len();
    let global_only_arms: usize = global_only.values().map(|arms| arms.len()).sum();

    // Global + user: the real key scheme.
    let mut globals: HashMap<String, HashSet<u64>> = HashMap::new();
    let mut users: HashMap<String, HashSet<u64>> = HashMap::new();
    for user_id in 1..=STRESS_NUM_USERS {
        for slot in STRESS_SLOTS {
            let seg = (user_id % STRESS_NUM_SEGMENTS) as u32;
            let g_key = global_state_key(slot, seg);
            let u_key = user_state_key(slot, seg, user_id);
            for _ in 0..STRESS_FEEDBACK_PER_USER {
                let pid = rng.gen_range(0..STRESS_NUM_PRODUCTS);
                globals.entry(g_key.clone()).or_default().insert(pid);
                users.entry(u_key.clone()).or_default().insert(pid);
            }
        }
    }

    let user_states = users.len();
    let user_arms: usize = users.values().map(|arms| arms.len()).sum();
    let max_user_arms = users.values().map(|arms| arms.len()).max().unwrap_or(0);

    println!(
        "[GLOBAL ONLY] states={global_only_states} arms={global_only_arms}; \
         [GLOBAL+USER] global_states={} user_states={user_states} user_arms={user_arms}",
        globals.len()
    );

    // Shared pools are identical under both schemes.
    assert_eq!(globals.len(), global_only_states);
    // One user state per (user, slot); every one stays far below the cap.
    assert_eq!(
        user_states as u64,
        STRESS_NUM_USERS * STRESS_SLOTS.len() as u64
    );
    assert!(max_user_arms <= STRESS_FEEDBACK_PER_USER);
}

/// Concurrent feedback on the same state key: last-writer-wins may drop
/// state updates, but no request errors and the event log keeps every
/// observation.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_feedback_keeps_event_log_complete() {
    let state = Arc::new(InMemoryStateStore::new());
    let events = Arc::new(InMemoryEventStore::new());
    let service = Arc::new(
        BanditService::builder(state.clone(), events.clone()).build(),
    );

    const WRITERS: u64 = 16;
    const EVENTS_PER_WRITER: u64 = 10;

    let mut tasks = Vec::new();
    for writer in 0..WRITERS {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            // All writers share segment 0 (user_id ≡ 0 mod 3), so every
            // global update races on the same key.
            let user_id = 3 * (writer + 1);
            let ctx = RequestContext::new();
            for i in 0..EVENTS_PER_WRITER {
                let event = BanditEvent {
                    user_id,
                    slot: "home_top".to_string(),
                    product_id: 1 + (i % 5),
                    event_type: "click".to_string(),
                    ..BanditEvent::default()
                };
                service.log_feedback(&ctx, event).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Ground truth preserved: one event per accepted feedback.
    assert_eq!(events.len(), (WRITERS * EVENTS_PER_WRITER) as usize);

    // The shared global state exists and is well-formed; under contention
    // some read-modify-write cycles may have been lost, so the total count
    // is bounded by the event count, not equal to it.
    let global = state
        .get_state("home_top|seg=0|global")
        .await
        .unwrap()
        .expect("global state persisted");
    let total_count: u64 = global.arms.values().map(|arm| arm.count).sum();
    assert!(total_count >= 1);
    assert!(total_count <= WRITERS * EVENTS_PER_WRITER);
    assert!(global.arms.len() <= 5);
}
