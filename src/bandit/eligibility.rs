//! Eligibility filtering for candidates.

use async_trait::async_trait;

use crate::store::StoreError;

/// Decides whether a product may be recommended to a user in a slot
/// (stock, visibility, regional restrictions). Advisory: the service treats
/// errors as "not eligible" and drops the candidate silently.
#[async_trait]
pub trait EligibilityChecker: Send + Sync {
    async fn is_eligible(
        &self,
        user_id: u64,
        product_id: u64,
        slot: &str,
    ) -> Result<bool, StoreError>;
}

/// Default checker: everything is eligible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEligibility;

#[async_trait]
impl EligibilityChecker for NoopEligibility {
    async fn is_eligible(
        &self,
        _user_id: u64,
        _product_id: u64,
        _slot: &str,
    ) -> Result<bool, StoreError> {
        Ok(true)
    }
}
