//! Request-scoped context: trace ID plus cooperative cancellation.
//!
//! Dropping the request future cancels in-flight store calls (tokio
//! semantics); the flag here covers the "already cancelled on arrival" case
//! and lets the HTTP layer abort between suspension points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::prelude::{Error, Result};

/// Cloneable per-request handle carried through every entry point.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: Arc<str>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Fresh context with a random 16-hex-digit trace ID.
    pub fn new() -> Self {
        let id: u64 = rand::thread_rng().gen();
        Self::with_trace_id(format!("{id:016x}"))
    }

    /// Context carrying an externally supplied trace ID (e.g. from an
    /// inbound header).
    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        RequestContext {
            trace_id: trace_id.into().into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Mark the request as cancelled; visible to all clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` when the request has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
