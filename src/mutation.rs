//! The optimistic-update and reconciliation engine.
//!
//! One [`MutationEngine::execute`] call runs a single state-changing
//! operation through the full contract:
//!
//! 1. snapshot the affected keys
//! 2. apply the optimistic cache update (synchronous, visible to readers
//!    before the network call is issued)
//! 3. await the network call
//! 4. on success: run `on_success` (which may merge the server entity), then
//!    invalidate the affected keys so a refetch reconciles any drift
//! 5. on failure: restore the snapshot, run `on_error`, then still
//!    invalidate to converge on the backend's actual state
//! 6. `on_settled` always runs last
//!
//! No ordering is guaranteed between two concurrent mutations' completions;
//! whichever settles last drives the final invalidation-triggered refetch,
//! which is the convergence mechanism.

use std::future::Future;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::error::ApiError;
use crate::key::QueryKey;

/// Success / error / settle callbacks for one mutation.
///
/// `on_settled` is cleanup only; correctness never depends on it.
pub struct MutationHooks<T> {
    pub on_success: Option<Box<dyn FnOnce(&T, &CacheStore) + Send>>,
    pub on_error: Option<Box<dyn FnOnce(&ApiError, &CacheStore) + Send>>,
    pub on_settled: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> MutationHooks<T> {
    pub fn new() -> Self {
        MutationHooks {
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }

    pub fn on_success(mut self, f: impl FnOnce(&T, &CacheStore) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&ApiError, &CacheStore) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_settled(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_settled = Some(Box::new(f));
        self
    }
}

impl<T> Default for MutationHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes state-changing operations with the optimistic/rollback contract.
#[derive(Clone)]
pub struct MutationEngine {
    cache: Arc<CacheStore>,
}

impl MutationEngine {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        MutationEngine { cache }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Run one mutation through the snapshot → optimistic → network →
    /// commit-or-rollback → invalidate sequence.
    ///
    /// `optimistic` runs synchronously against the cache before `network` is
    /// awaited, so a second mutation started afterwards observes the
    /// optimistic state. Errors are routed to `on_error` and also returned;
    /// they never escape as panics.
    pub async fn execute<T, Net, Fut>(
        &self,
        affected_keys: Vec<QueryKey>,
        optimistic: impl FnOnce(&CacheStore),
        network: Net,
        hooks: MutationHooks<T>,
    ) -> Result<T, ApiError>
    where
        Net: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let snapshot = self.cache.snapshot(&affected_keys);
        optimistic(&self.cache);

        let result = network().await;

        let outcome = match result {
            Ok(value) => {
                if let Some(on_success) = hooks.on_success {
                    on_success(&value, &self.cache);
                }
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, keys = affected_keys.len(), "mutation failed, rolling back");
                self.cache.restore(snapshot);
                if let Some(on_error) = hooks.on_error {
                    on_error(&err, &self.cache);
                }
                Err(err)
            }
        };

        // Success or failure, the refetch is the actual source of truth.
        let keys = affected_keys;
        self.cache.invalidate(move |k| keys.contains(k));

        if let Some(on_settled) = hooks.on_settled {
            on_settled();
        }
        outcome
    }
}
