//! Process-level infrastructure: logging bootstrap.

pub mod logging;

pub use logging::{init_logging, LogFormat};
