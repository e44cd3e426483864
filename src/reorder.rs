//! Optimistic drag-reorder of a cached jobs list.
//!
//! The reorder operates on one concrete list key: the caller names the
//! parameter set whose page is on screen, and the whole page array is
//! replaced optimistically before the backend call. Stale drag indices
//! (the cached item at `old_index` is not the dragged job) make the whole
//! operation a no-op, with no network call and no cache write.

use std::sync::Arc;

use crate::backend::Backend;
use crate::cache::CacheStore;
use crate::error::ApiError;
use crate::key::QueryKey;
use crate::model::{Job, Paginated, SearchParams};
use crate::mutation::{MutationEngine, MutationHooks};

/// Executes jobs-list reorders with the optimistic/rollback contract.
pub struct ReorderController {
    cache: Arc<CacheStore>,
    backend: Arc<dyn Backend>,
    engine: MutationEngine,
}

impl ReorderController {
    pub fn new(cache: Arc<CacheStore>, backend: Arc<dyn Backend>) -> Self {
        ReorderController {
            engine: MutationEngine::new(cache.clone()),
            cache,
            backend,
        }
    }

    /// Move the job at `old_index` to `new_index` within the cached list for
    /// `params`.
    ///
    /// Returns `Ok(false)` when nothing was issued: equal indices, no cached
    /// list, an out-of-range target, or a dragged id that no longer matches
    /// the cached item at `old_index`.
    pub async fn reorder(
        &self,
        params: &SearchParams,
        job_id: &str,
        old_index: usize,
        new_index: usize,
    ) -> Result<bool, ApiError> {
        if old_index == new_index {
            return Ok(false);
        }

        let key = QueryKey::jobs_list(params);
        let Some(page) = self.cache.get::<Paginated<Job>>(&key) else {
            return Ok(false);
        };
        if page.data.get(old_index).map(|j| j.id.as_str()) != Some(job_id) {
            return Ok(false);
        }
        if new_index >= page.data.len() {
            return Ok(false);
        }

        let mut reordered = page;
        let moved = reordered.data.remove(old_index);
        reordered.data.insert(new_index, moved);

        let backend = self.backend.clone();
        let id = job_id.to_string();
        let write_key = key.clone();
        self.engine
            .execute(
                vec![key],
                move |cache| cache.put(&write_key, reordered),
                move || async move { backend.reorder_job(&id, new_index as i64).await?.into_result() },
                MutationHooks::new(),
            )
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::mock::fixtures::job;
    use crate::mock::{FaultProfile, MockBackend};
    use crate::queries::QueryClient;
    use std::time::Duration;

    fn ids(page: &Paginated<Job>) -> Vec<&str> {
        page.data.iter().map(|j| j.id.as_str()).collect()
    }

    async fn setup(
        profile: FaultProfile,
    ) -> (Arc<MockBackend>, Arc<CacheStore>, ReorderController, SearchParams) {
        let backend = Arc::new(MockBackend::new(profile));
        backend.seed_jobs([job("a", 0), job("b", 1), job("c", 2)]);
        let cache = Arc::new(CacheStore::new(CacheConfig::default()));

        // Populate the list through the client so a refetcher is registered.
        let client = QueryClient::new(cache.clone(), backend.clone());
        let params = SearchParams::default();
        client.jobs(&params).await.unwrap();

        let controller = ReorderController::new(cache.clone(), backend.clone());
        (backend, cache, controller, params)
    }

    #[tokio::test]
    async fn test_reorder_applies_optimistically_and_refetches() {
        let (backend, cache, controller, params) = setup(FaultProfile::none()).await;

        let issued = controller.reorder(&params, "c", 2, 0).await.unwrap();
        assert!(issued);
        assert_eq!(backend.counts().reorders(), 1);

        // The optimistic replacement is already in place when the call
        // returns; the background refetch has not run yet.
        let page = cache
            .get::<Paginated<Job>>(&QueryKey::jobs_list(&params))
            .unwrap();
        assert_eq!(ids(&page), vec!["c", "a", "b"]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        // The settle invalidated the list key and its refetcher ran.
        assert_eq!(backend.counts().reads(), 2);
    }

    #[tokio::test]
    async fn test_equal_indices_are_a_no_op() {
        let (backend, _, controller, params) = setup(FaultProfile::none()).await;

        let issued = controller.reorder(&params, "a", 0, 0).await.unwrap();
        assert!(!issued);
        assert_eq!(backend.counts().reorders(), 0);
    }

    #[tokio::test]
    async fn test_stale_drag_indices_are_a_no_op() {
        let (backend, cache, controller, params) = setup(FaultProfile::none()).await;
        let before = cache
            .get::<Paginated<Job>>(&QueryKey::jobs_list(&params))
            .unwrap();

        // "b" is at index 1, not 0; the drag metadata is stale.
        let issued = controller.reorder(&params, "b", 0, 2).await.unwrap();
        assert!(!issued);
        assert_eq!(backend.counts().reorders(), 0);

        let after = cache
            .get::<Paginated<Job>>(&QueryKey::jobs_list(&params))
            .unwrap();
        assert_eq!(ids(&before), ids(&after));
    }

    #[tokio::test]
    async fn test_uncached_list_is_a_no_op() {
        let backend = Arc::new(MockBackend::new(FaultProfile::none()));
        backend.seed_jobs([job("a", 0)]);
        let cache = Arc::new(CacheStore::new(CacheConfig::default()));
        let controller = ReorderController::new(cache, backend.clone());

        let issued = controller
            .reorder(&SearchParams::default(), "a", 0, 1)
            .await
            .unwrap();
        assert!(!issued);
        assert_eq!(backend.counts().reorders(), 0);
    }

    #[tokio::test]
    async fn test_failed_reorder_restores_the_cached_order() {
        let (backend, cache, controller, params) = setup(FaultProfile::failing_writes()).await;

        let err = controller.reorder(&params, "c", 2, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(backend.counts().reorders(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let page = cache
            .get::<Paginated<Job>>(&QueryKey::jobs_list(&params))
            .unwrap();
        assert_eq!(ids(&page), vec!["a", "b", "c"]);
    }
}
