use serde::{Deserialize, Serialize};

use crate::bandit::Context;
use crate::prelude::{Error, Result};

/// The closed set of feedback event types the learner accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Impression,
    Click,
    /// Add-to-cart.
    Atc,
    Order,
}

impl EventType {
    /// Parse the wire string. Anything outside the closed set is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "impression" => Ok(EventType::Impression),
            "click" => Ok(EventType::Click),
            "atc" => Ok(EventType::Atc),
            "order" => Ok(EventType::Order),
            other => Err(Error::invalid_argument(format!(
                "unknown event type: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Impression => "impression",
            EventType::Click => "click",
            EventType::Atc => "atc",
            EventType::Order => "order",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single feedback observation, appended to the immutable event log.
///
/// `event_type` stays a string on the wire so the service can reject unknown
/// values with `InvalidArgument` instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BanditEvent {
    /// Assigned by the event store on append; 0 until persisted.
    #[serde(default)]
    pub id: u64,
    pub user_id: u64,
    pub slot: String,
    pub product_id: u64,
    pub event_type: String,
    /// Optional monetary value (GMV / margin), clamped non-negative in the
    /// reward model.
    #[serde(default)]
    pub value: f64,
    /// A/B bucket, stamped by the service before persisting.
    #[serde(default)]
    pub variant: u32,
    /// Merged request context, written back by the service so the log
    /// carries exactly what the featurizer saw.
    #[serde(default)]
    pub context: Context,
    /// Epoch milliseconds; stamped by the service when 0.
    #[serde(default)]
    pub created_at: u64,
}
