use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the recommendation service.
///
/// The HTTP layer maps these onto status codes: `Cancelled` → 499,
/// `InvalidArgument` → 400, `Unauthenticated` → 401, `NotFound` → 404,
/// everything else → 500.
#[derive(Error, Debug)]
pub enum Error {
    /// The request context was cancelled before or during processing.
    #[error("request cancelled")]
    Cancelled,

    /// Malformed caller input (empty slot, unknown event type, zero user ID).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller identity missing. Enforced at the HTTP boundary.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Admin lookups only; the serving paths treat missing rows as defaults.
    #[error("not found: {0}")]
    NotFound(String),

    /// A store failed mid-request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Anything else that should never happen in a healthy process.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
