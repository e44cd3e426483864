//! The keyed, versioned in-memory store of query results.
//!
//! `CacheStore` is the single source of truth for everything the view layer
//! reads. All access goes through `read`/`write`/`invalidate`/`snapshot`/
//! `restore`; no caller ever holds a long-lived reference into an entry.
//!
//! Reads and writes are synchronous and atomic (one lock acquisition per
//! call), so an optimistic write always completes before the network call it
//! precedes is issued. Suspension only ever happens at network boundaries,
//! in the spawned background refetch tasks.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use crate::error::ApiError;
use crate::key::QueryKey;
use crate::utils::now_ms;

/// A refetch closure registered by a read-through fetch.
///
/// Invoked in the background when its key is invalidated; responsible for
/// writing the fresh value back into the store.
pub type Refetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync>;

/// A cached query result.
///
/// The value is type-erased so one store can hold jobs lists, candidate
/// pages and timelines side by side; readers downcast back through
/// [`CacheStore::read`].
#[derive(Clone)]
pub struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    pub fetched_at: i64,
    pub is_stale: bool,
}

impl CacheEntry {
    fn new<T: Send + Sync + 'static>(value: T) -> Self {
        CacheEntry {
            value: Arc::new(value),
            fetched_at: now_ms(),
            is_stale: false,
        }
    }

    /// Downcast the entry's value, cloning it out of the store.
    pub fn typed<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }
}

/// A captured set of entries for later restoration.
///
/// Keys that were absent at capture time are recorded as `None`, so a
/// restore removes any optimistic insert made after the snapshot. Entry
/// values are immutable once stored (writes replace, never mutate in
/// place), so holding the `Arc`s is a deep-enough copy.
pub struct Snapshot {
    entries: HashMap<QueryKey, Option<CacheEntry>>,
}

impl Snapshot {
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.keys()
    }
}

/// Configuration for the cache store.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum number of entries to hold. When exceeded, the oldest entries
    /// by `fetched_at` are evicted on write. `None` means unbounded.
    pub max_entries: Option<usize>,
}

/// Keyed in-memory store of query results with snapshot/restore support.
pub struct CacheStore {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    refetchers: RwLock<HashMap<QueryKey, Refetcher>>,
    max_entries: Option<usize>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        CacheStore {
            entries: RwLock::new(HashMap::new()),
            refetchers: RwLock::new(HashMap::new()),
            max_entries: config.max_entries,
        }
    }

    /// Read the entry for a key. No side effects.
    pub fn read(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Read and downcast the value for a key, ignoring staleness.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.read(key).and_then(|e| e.typed())
    }

    /// Apply `updater` to the current value (or `None` if absent or of a
    /// different type) and replace the entry atomically.
    ///
    /// The updater must be pure; callers normalize retrieved shapes before
    /// mutating them rather than assuming what the prior value looks like.
    pub fn write<T, F>(&self, key: &QueryKey, updater: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<T>) -> T,
    {
        let mut entries = self.entries.write().unwrap();
        let old = entries.get(key).and_then(|e| e.typed::<T>());
        entries.insert(key.clone(), CacheEntry::new(updater(old)));
        self.maybe_evict(&mut entries);
    }

    /// Insert a freshly fetched value, superseding whatever was there.
    pub fn put<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.clone(), CacheEntry::new(value));
        self.maybe_evict(&mut entries);
    }

    /// Remove every entry matching the predicate, without refetching.
    pub fn remove(&self, predicate: impl Fn(&QueryKey) -> bool) {
        self.entries.write().unwrap().retain(|k, _| !predicate(k));
    }

    /// All keys currently cached that match the predicate.
    pub fn keys_matching(&self, predicate: impl Fn(&QueryKey) -> bool) -> Vec<QueryKey> {
        self.entries
            .read()
            .unwrap()
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect()
    }

    /// Capture the current entries for the given keys.
    pub fn snapshot(&self, keys: &[QueryKey]) -> Snapshot {
        let entries = self.entries.read().unwrap();
        Snapshot {
            entries: keys
                .iter()
                .map(|k| (k.clone(), entries.get(k).cloned()))
                .collect(),
        }
    }

    /// Write every captured entry back verbatim, superseding intervening
    /// writes to those keys. Last writer wins; the mandatory invalidation
    /// after a mutation settles is what reconverges overlapping mutations.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut entries = self.entries.write().unwrap();
        for (key, entry) in snapshot.entries {
            match entry {
                Some(e) => {
                    entries.insert(key, e);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
    }

    /// Register the refetch closure for a key. A key with a registered
    /// refetcher counts as having active readers for invalidation purposes.
    pub fn register_refetcher(&self, key: &QueryKey, refetcher: Refetcher) {
        self.refetchers
            .write()
            .unwrap()
            .insert(key.clone(), refetcher);
    }

    /// Mark all matching entries stale and schedule a background refetch for
    /// any that have a registered refetcher. Does not block the caller.
    ///
    /// Background refetch failures leave the entry stale and are logged; the
    /// next foreground read retries the origin.
    pub fn invalidate(&self, predicate: impl Fn(&QueryKey) -> bool) {
        let mut stale_keys = Vec::new();
        {
            let mut entries = self.entries.write().unwrap();
            for (key, entry) in entries.iter_mut() {
                if predicate(key) {
                    entry.is_stale = true;
                    stale_keys.push(key.clone());
                }
            }
        }

        // Outside a runtime (pure-sync tests) there is nothing to drive the
        // refetch; entries stay stale until the next foreground read.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let refetchers = self.refetchers.read().unwrap();
        for key in stale_keys {
            if let Some(refetcher) = refetchers.get(&key) {
                let refetcher = Arc::clone(refetcher);
                let key_display = key.to_string();
                handle.spawn(async move {
                    if let Err(e) = refetcher().await {
                        tracing::warn!(key = %key_display, error = %e, "background refetch failed");
                    } else {
                        tracing::debug!(key = %key_display, "background refetch completed");
                    }
                });
            }
        }
    }

    fn maybe_evict(&self, entries: &mut HashMap<QueryKey, CacheEntry>) {
        let Some(max) = self.max_entries else {
            return;
        };
        if entries.len() <= max {
            return;
        }
        let mut by_age: Vec<_> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.fetched_at))
            .collect();
        by_age.sort_by_key(|(_, fetched_at)| *fetched_at);

        let to_remove = entries.len() - max;
        for (key, _) in by_age.into_iter().take(to_remove) {
            entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> CacheStore {
        CacheStore::new(CacheConfig::default())
    }

    fn key(n: &str) -> QueryKey {
        QueryKey::new(["test", n])
    }

    #[test]
    fn test_write_then_read() {
        let cache = store();
        cache.write(&key("a"), |old: Option<Vec<u32>>| {
            assert!(old.is_none());
            vec![1, 2, 3]
        });
        assert_eq!(cache.get::<Vec<u32>>(&key("a")), Some(vec![1, 2, 3]));
        assert!(!cache.read(&key("a")).unwrap().is_stale);
    }

    #[test]
    fn test_updater_sees_previous_value() {
        let cache = store();
        cache.put(&key("a"), vec![1u32]);
        cache.write(&key("a"), |old: Option<Vec<u32>>| {
            let mut v = old.unwrap();
            v.push(2);
            v
        });
        assert_eq!(cache.get::<Vec<u32>>(&key("a")), Some(vec![1, 2]));
    }

    #[test]
    fn test_snapshot_restore_undoes_intervening_writes() {
        let cache = store();
        cache.put(&key("a"), "before".to_string());

        let snap = cache.snapshot(&[key("a"), key("b")]);
        cache.put(&key("a"), "optimistic".to_string());
        cache.put(&key("b"), "inserted".to_string());

        cache.restore(snap);
        assert_eq!(cache.get::<String>(&key("a")), Some("before".to_string()));
        // Key absent at snapshot time is removed again.
        assert!(cache.read(&key("b")).is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let cache = store();
        cache.put(&key("a"), vec!["x".to_string()]);
        let snap = cache.snapshot(&[key("a")]);

        cache.write(&key("a"), |_: Option<Vec<String>>| vec!["y".to_string()]);
        cache.restore(snap);
        assert_eq!(
            cache.get::<Vec<String>>(&key("a")),
            Some(vec!["x".to_string()])
        );
    }

    #[test]
    fn test_concurrent_snapshots_restore_independently() {
        let cache = store();
        cache.put(&key("a"), 1u32);
        cache.put(&key("b"), 2u32);

        let snap_a = cache.snapshot(&[key("a")]);
        let snap_b = cache.snapshot(&[key("b")]);

        cache.put(&key("a"), 10u32);
        cache.put(&key("b"), 20u32);

        cache.restore(snap_b);
        assert_eq!(cache.get::<u32>(&key("a")), Some(10));
        assert_eq!(cache.get::<u32>(&key("b")), Some(2));

        cache.restore(snap_a);
        assert_eq!(cache.get::<u32>(&key("a")), Some(1));
    }

    #[test]
    fn test_invalidate_marks_matching_entries_stale() {
        let cache = store();
        cache.put(&key("a"), 1u32);
        cache.put(&QueryKey::new(["other", "x"]), 2u32);

        cache.invalidate(|k| k.in_namespace("test"));

        assert!(cache.read(&key("a")).unwrap().is_stale);
        assert!(!cache.read(&QueryKey::new(["other", "x"])).unwrap().is_stale);
    }

    #[tokio::test]
    async fn test_invalidate_triggers_registered_refetcher() {
        let cache = Arc::new(store());
        cache.put(&key("a"), 1u32);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let cache_clone = cache.clone();
        cache.register_refetcher(
            &key("a"),
            Arc::new(move || {
                let calls = calls_clone.clone();
                let cache = cache_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    cache.put(&QueryKey::new(["test", "a"]), 2u32);
                    Ok(())
                })
            }),
        );

        cache.invalidate(|k| k.in_namespace("test"));
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<u32>(&key("a")), Some(2));
        assert!(!cache.read(&key("a")).unwrap().is_stale);
    }

    #[test]
    fn test_eviction_removes_oldest_entries() {
        let cache = CacheStore::new(CacheConfig { max_entries: Some(2) });
        cache.put(&key("a"), 1u32);
        // fetched_at has millisecond resolution; force distinct ages.
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.put(&key("b"), 2u32);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.put(&key("c"), 3u32);

        assert!(cache.read(&key("a")).is_none());
        assert_eq!(cache.get::<u32>(&key("b")), Some(2));
        assert_eq!(cache.get::<u32>(&key("c")), Some(3));
    }

    #[test]
    fn test_type_mismatch_reads_as_none() {
        let cache = store();
        cache.put(&key("a"), 1u32);
        assert!(cache.get::<String>(&key("a")).is_none());
    }
}
