//! Admin pass-throughs for configuration and segment management.
//!
//! Unlike the serving paths, these surface `NotFound` instead of silently
//! falling back to defaults.

use crate::bandit::service::BanditService;
use crate::domain::ConfigRecord;
use crate::prelude::{Error, Result};

impl BanditService {
    pub async fn get_config(&self, slot: &str, variant: u32) -> Result<ConfigRecord> {
        let store = self
            .config_store
            .as_ref()
            .ok_or_else(|| Error::Internal("no config store bound".to_string()))?;
        store
            .get_config(slot, variant)
            .await?
            .ok_or_else(|| Error::NotFound(format!("config for ({slot}, {variant})")))
    }

    pub async fn upsert_config(&self, record: &ConfigRecord) -> Result<()> {
        if record.slot.is_empty() {
            return Err(Error::invalid_argument("slot is required"));
        }
        let store = self
            .config_store
            .as_ref()
            .ok_or_else(|| Error::Internal("no config store bound".to_string()))?;
        store.upsert_config(record).await?;
        Ok(())
    }

    pub async fn get_segment(&self, user_id: u64) -> Result<u32> {
        let store = self
            .segment_store
            .as_ref()
            .ok_or_else(|| Error::Internal("no segment store bound".to_string()))?;
        store
            .get_segment(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("segment for user {user_id}")))
    }

    pub async fn upsert_segment(&self, user_id: u64, segment: u32) -> Result<()> {
        if user_id == 0 {
            return Err(Error::invalid_argument("user_id is required"));
        }
        let store = self
            .segment_store
            .as_ref()
            .ok_or_else(|| Error::Internal("no segment store bound".to_string()))?;
        store.upsert_segment(user_id, segment).await?;
        Ok(())
    }
}
