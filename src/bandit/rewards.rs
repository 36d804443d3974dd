//! Reward model: event type → scalar reward.

use crate::bandit::config::Config;
use crate::domain::{BanditEvent, EventType};
use crate::prelude::Result;

impl Config {
    /// Base reward for an event class.
    pub fn base_reward(&self, event_type: EventType) -> f64 {
        match event_type {
            EventType::Impression => self.reward_impression,
            EventType::Click => self.reward_click,
            EventType::Atc => self.reward_atc,
            EventType::Order => self.reward_order,
        }
    }

    /// Reward for a feedback event: per-type base plus the monetary value
    /// term. Negative values are clamped; unknown event types are rejected.
    pub fn reward_for_event(&self, event: &BanditEvent) -> Result<f64> {
        let event_type = EventType::parse(&event.event_type)?;
        let base = self.base_reward(event_type);
        Ok(base + self.value_weight * event.value.max(0.0))
    }
}
