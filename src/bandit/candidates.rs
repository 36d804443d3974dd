//! Candidate loading: offline-ranker rows with a catalog fallback.

use std::sync::Arc;

use crate::domain::OfflineCandidate;
use crate::prelude::Result;
use crate::store::{OfflineCandidateStore, ProductCatalog};

/// Oversampling factor over the requested limit, so the bandit has room to
/// reorder beyond the offline ranking.
const CANDIDATE_OVERSAMPLE: usize = 3;

/// Loads the candidate pool for a slot.
///
/// Primary source is the offline store (top rows by score). When none is
/// bound, the product catalog is enumerated with a uniform score of 1.0.
pub struct CandidateLoader {
    offline: Option<Arc<dyn OfflineCandidateStore>>,
    catalog: Option<Arc<dyn ProductCatalog>>,
}

impl CandidateLoader {
    pub fn new(
        offline: Option<Arc<dyn OfflineCandidateStore>>,
        catalog: Option<Arc<dyn ProductCatalog>>,
    ) -> Self {
        CandidateLoader { offline, catalog }
    }

    /// Returns `(rows, effective_limit)`: the candidate pool plus the limit
    /// clamped to what actually exists. `(vec![], 0)` when nothing does.
    pub async fn load(&self, slot: &str, limit: usize) -> Result<(Vec<OfflineCandidate>, usize)> {
        if let Some(offline) = &self.offline {
            let candidate_limit = limit.saturating_mul(CANDIDATE_OVERSAMPLE).max(limit);
            let rows = offline.get_by_slot(slot, candidate_limit).await?;
            if rows.is_empty() {
                return Ok((Vec::new(), 0));
            }
            let effective = limit.min(rows.len());
            return Ok((rows, effective));
        }

        let Some(catalog) = &self.catalog else {
            return Ok((Vec::new(), 0));
        };

        let products = catalog.list_products().await?;
        if products.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let effective = limit.min(products.len());
        let rows = products
            .into_iter()
            .map(|product_id| OfflineCandidate {
                product_id,
                score: 1.0,
            })
            .collect();
        Ok((rows, effective))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{InMemoryOfflineStore, InMemoryProductCatalog};

    #[tokio::test]
    async fn test_offline_rows_clamp_limit() {
        let offline = Arc::new(InMemoryOfflineStore::new());
        offline.put(
            "home",
            vec![
                OfflineCandidate { product_id: 101, score: 0.9 },
                OfflineCandidate { product_id: 102, score: 0.6 },
            ],
        );

        let loader = CandidateLoader::new(Some(offline), None);
        let (rows, limit) = loader.load("home", 5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(limit, 2);
    }

    #[tokio::test]
    async fn test_offline_empty_slot() {
        let loader = CandidateLoader::new(Some(Arc::new(InMemoryOfflineStore::new())), None);
        let (rows, limit) = loader.load("nowhere", 5).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(limit, 0);
    }

    #[tokio::test]
    async fn test_oversampled_pool_exceeds_limit() {
        let offline = Arc::new(InMemoryOfflineStore::new());
        let rows: Vec<OfflineCandidate> = (0..30)
            .map(|i| OfflineCandidate {
                product_id: i,
                score: 1.0 - i as f64 / 100.0,
            })
            .collect();
        offline.put("home", rows);

        let loader = CandidateLoader::new(Some(offline), None);
        let (rows, limit) = loader.load("home", 5).await.unwrap();
        // Pool carries 3x the request, limit stays at the request.
        assert_eq!(rows.len(), 15);
        assert_eq!(limit, 5);
    }

    #[tokio::test]
    async fn test_catalog_fallback_uniform_score() {
        let catalog = Arc::new(InMemoryProductCatalog::new(vec![11, 12, 13]));
        let loader = CandidateLoader::new(None, Some(catalog));

        let (rows, limit) = loader.load("home", 2).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(limit, 2);
        assert!(rows.iter().all(|r| r.score == 1.0));
    }

    #[tokio::test]
    async fn test_no_sources_is_empty() {
        let loader = CandidateLoader::new(None, None);
        let (rows, limit) = loader.load("home", 2).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(limit, 0);
    }
}
