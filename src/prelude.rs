//! Convenience re-exports used across the crate.

pub use crate::errors::{Error, Result};
