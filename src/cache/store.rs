//! Bounded entry store backed by Moka.

use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use parking_lot::Mutex;

use super::CacheConfig;
use super::node::CacheNode;

/// The lookup index of the security cache.
///
/// This store is:
/// - Thread-safe per operation, composite operations are not transactional
/// - Bounded, with optional TTL/TTI, evicting silently under pressure
/// - Keyed by the derived string keys of `super::key`
///
/// Nodes evicted for size or expiry are queued instead of being disposed
/// from within Moka's listener; the owner drains the queue with
/// [`EntryStore::take_evicted`].
pub(crate) struct EntryStore {
    inner: Cache<String, Arc<CacheNode>>,
    evicted: Arc<Mutex<Vec<Arc<CacheNode>>>>,
}

impl EntryStore {
    /// Create a new store with the given config.
    pub fn new(config: &CacheConfig) -> Self {
        let evicted: Arc<Mutex<Vec<Arc<CacheNode>>>> = Arc::default();
        let queue = Arc::clone(&evicted);

        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .eviction_listener(move |_key: Arc<String>, node: Arc<CacheNode>, cause: RemovalCause| {
                if cause.was_evicted() {
                    queue.lock().push(node);
                }
            });

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
            evicted,
        }
    }

    /// Get a node from the store.
    pub fn get(&self, key: &str) -> Option<Arc<CacheNode>> {
        self.inner.get(key)
    }

    /// Insert `node` unless its key is taken.
    ///
    /// Returns the node already stored under the key on failure.
    pub fn insert_if_absent(&self, node: &Arc<CacheNode>) -> Result<(), Arc<CacheNode>> {
        let entry = self
            .inner
            .entry(node.key().to_owned())
            .or_insert_with(|| Arc::clone(node));

        if entry.is_fresh() {
            Ok(())
        } else {
            Err(entry.into_value())
        }
    }

    /// Remove whatever node is stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<CacheNode>> {
        self.inner.remove(key)
    }

    /// Remove `node` only if it is still the one stored under its key.
    pub fn remove_if_same(&self, node: &Arc<CacheNode>) -> bool {
        let result = self
            .inner
            .entry(node.key().to_owned())
            .and_compute_with(|current| match current {
                Some(current) if Arc::ptr_eq(current.value(), node) => Op::Remove,
                _ => Op::Nop,
            });
        matches!(result, CompResult::Removed(_))
    }

    /// All nodes currently stored.
    pub fn nodes(&self) -> Vec<Arc<CacheNode>> {
        self.inner.iter().map(|(_, node)| node).collect()
    }

    /// Nodes evicted by the store since the last call.
    pub fn take_evicted(&self) -> Vec<Arc<CacheNode>> {
        std::mem::take(&mut *self.evicted.lock())
    }

    /// Run Moka's pending maintenance, delivering due evictions.
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    /// Get the number of entries in the store.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
