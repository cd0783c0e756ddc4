//! Linked cache entries.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::CacheEntry;

/// An entry as stored in the index, linked to the entries it depends on.
///
/// Parents are held strongly, so an entry stays usable through any child
/// that still holds it. Children are held weakly and only serve cascading
/// removal.
pub(crate) struct CacheNode {
    key: String,
    entry: CacheEntry,
    parents: Vec<Arc<CacheNode>>,
    links: Mutex<Links>,
}

#[derive(Default)]
struct Links {
    disposed: bool,
    children: Vec<Weak<CacheNode>>,
}

impl CacheNode {
    pub fn new(key: String, entry: CacheEntry, parents: Vec<Arc<CacheNode>>) -> Arc<Self> {
        Arc::new(Self {
            key,
            entry,
            parents,
            links: Mutex::new(Links::default()),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn parents(&self) -> &[Arc<CacheNode>] {
        &self.parents
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        self.links.lock().disposed
    }

    /// Register `child` as depending on this node.
    ///
    /// Returns `false` once this node has been disposed; the child must then
    /// be discarded.
    pub fn adopt(&self, child: &Arc<CacheNode>) -> bool {
        let mut links = self.links.lock();
        if links.disposed {
            return false;
        }
        links.children.retain(|c| c.strong_count() > 0);
        links.children.push(Arc::downgrade(child));
        true
    }

    /// Mark this node disposed and hand back its live children.
    ///
    /// Returns `None` when it was already disposed.
    pub fn dispose(&self) -> Option<Vec<Arc<CacheNode>>> {
        let children = {
            let mut links = self.links.lock();
            if links.disposed {
                return None;
            }
            links.disposed = true;
            std::mem::take(&mut links.children)
        };
        Some(children.iter().filter_map(Weak::upgrade).collect())
    }

    /// Drop the link to a child that went away.
    pub fn forget(&self, child: &CacheNode) {
        let child: *const CacheNode = child;
        self.links
            .lock()
            .children
            .retain(|c| c.strong_count() > 0 && c.as_ptr() != child);
    }
}

impl std::fmt::Debug for CacheNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheNode")
            .field("key", &self.key)
            .field("parents", &self.parents.len())
            .finish()
    }
}
