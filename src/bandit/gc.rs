//! Arm eviction: bounds per-state memory at `max_arms_per_state`.

use crate::bandit::state::SlotState;

/// Evict arms beyond `max_arms`, keeping the most recently updated (ties by
/// count, then product ID for a stable order). `max_arms == 0` disables
/// capping. Called at the end of every feedback path, never on read-only
/// recommend paths.
pub fn cap_arms(state: &mut SlotState, max_arms: u32) {
    let max_arms = max_arms as usize;
    if max_arms == 0 || state.arms.len() <= max_arms {
        return;
    }

    let mut infos: Vec<(u64, u64, u64)> = state
        .arms
        .iter()
        .map(|(pid, arm)| (*pid, arm.last_updated, arm.count))
        .collect();

    // Most recent first; least-recently-updated arms fall off the tail.
    infos.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    for (pid, _, _) in infos.drain(max_arms..) {
        state.arms.remove(&pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::state::ArmState;

    fn arm_updated_at(ts: u64, count: u64) -> ArmState {
        let mut arm = ArmState::new();
        arm.last_updated = ts;
        arm.count = count;
        arm
    }

    #[test]
    fn test_cap_noop_under_limit() {
        let mut state = SlotState::new();
        for pid in 0..5u64 {
            state.arms.insert(pid, arm_updated_at(pid, 1));
        }
        cap_arms(&mut state, 10);
        assert_eq!(state.arms.len(), 5);
    }

    #[test]
    fn test_cap_zero_disables() {
        let mut state = SlotState::new();
        for pid in 0..50u64 {
            state.arms.insert(pid, arm_updated_at(pid, 1));
        }
        cap_arms(&mut state, 0);
        assert_eq!(state.arms.len(), 50);
    }

    #[test]
    fn test_cap_retains_most_recently_updated() {
        let mut state = SlotState::new();
        for pid in 0..20u64 {
            // Product pid updated at time 1000 + pid.
            state.arms.insert(pid, arm_updated_at(1000 + pid, 1));
        }

        cap_arms(&mut state, 5);

        assert_eq!(state.arms.len(), 5);
        for pid in 15..20u64 {
            assert!(state.arms.contains_key(&pid), "expected arm {pid} retained");
        }
    }

    #[test]
    fn test_cap_tie_break_by_count() {
        let mut state = SlotState::new();
        state.arms.insert(1, arm_updated_at(1000, 10));
        state.arms.insert(2, arm_updated_at(1000, 1));
        state.arms.insert(3, arm_updated_at(2000, 1));

        cap_arms(&mut state, 2);

        assert!(state.arms.contains_key(&3));
        assert!(state.arms.contains_key(&1), "higher count wins the tie");
        assert!(!state.arms.contains_key(&2));
    }
}
