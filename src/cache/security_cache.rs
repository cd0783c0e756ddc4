//! The security cache: rule, shadow and access entries linked to their parents.

use std::sync::Arc;

use tracing::{debug, info, trace};

use super::key::{access_key, reference_key, shadow_key};
use super::node::CacheNode;
use super::store::EntryStore;
use super::{AccessEntry, CacheConfig, CacheEntry, RuleEntry, ShadowEntry};
use crate::error::{AuthorizationError, Result};
use crate::reference::{SecurityReference, SecurityType};

/// Store of rule, shadow and access entries.
///
/// Every entry is inserted below the entries it depends on, which must
/// already be cached. Removing an entry removes everything inserted below
/// it.
pub trait SecurityCache: Send + Sync {
    /// Cache the rules of an entity. Its parent must be cached, the root has
    /// no parent.
    fn add_rule_entry(&self, entry: Arc<RuleEntry>) -> Result<()>;

    /// Cache the rules of a user or group, member of `groups`.
    ///
    /// Every group must already be cached as a group entry.
    fn add_identity_rule_entry(&self, entry: Arc<RuleEntry>, groups: &[SecurityReference]) -> Result<()>;

    /// Cache the presence of a global identity in another wiki.
    ///
    /// The identity and the wiki must be cached. Local groups must be cached
    /// in that wiki, global groups must be shadowed into it.
    fn add_shadow_entry(&self, entry: Arc<ShadowEntry>, groups: &[SecurityReference]) -> Result<()>;

    /// Cache a settled access, scoped to `scope_wiki` or to the entity's wiki
    /// when `None`.
    ///
    /// Returns the key used, or `None` when a local user is asked about a
    /// wiki other than its own and nothing is cached.
    fn add_access_entry(
        &self,
        entry: Arc<AccessEntry>,
        scope_wiki: Option<&SecurityReference>,
    ) -> Result<Option<String>>;

    /// Rule entry of an entity, or identity entry of a user or group.
    fn get(&self, reference: &SecurityReference) -> Option<Arc<RuleEntry>>;

    /// Shadow of a global identity into `wiki`.
    fn get_shadow(&self, identity: &SecurityReference, wiki: &SecurityReference) -> Option<Arc<ShadowEntry>>;

    /// Settled access of `user` on `entity`.
    fn get_access(&self, user: &SecurityReference, entity: &SecurityReference) -> Option<Arc<AccessEntry>>;

    /// Remove the entry of `reference` and everything depending on it.
    fn remove(&self, reference: &SecurityReference);

    /// Remove the settled access of `user` on `entity`.
    fn remove_access(&self, user: &SecurityReference, entity: &SecurityReference);
}

/// Where an access entry goes, depending on user and wiki.
enum AccessScope {
    /// Same wiki as the user: keyed on the user's own entry.
    Home,
    /// Global user in another wiki: keyed on the user's shadow.
    Shadowed(SecurityReference),
    /// Local user in another wiki: not cached.
    Foreign,
}

fn access_scope(user: &SecurityReference, wiki: &SecurityReference) -> AccessScope {
    if user.wiki_reference() == wiki {
        AccessScope::Home
    } else if user.is_global() {
        AccessScope::Shadowed(wiki.clone())
    } else {
        AccessScope::Foreign
    }
}

/// Default [`SecurityCache`] over a bounded Moka store.
///
/// Size or expiry evictions cascade like explicit removals, so the index
/// never keeps an entry whose parent can no longer be found. Entries already
/// handed out stay valid; they hold their parents.
#[derive(Debug)]
pub struct DefaultSecurityCache {
    store: EntryStore,
}

impl DefaultSecurityCache {
    /// Create a new cache with the given store config.
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            "Security cache initialized (capacity {}, ttl {:?}, tti {:?})",
            config.max_capacity, config.ttl, config.tti
        );
        Self {
            store: EntryStore::new(config),
        }
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.store.run_pending_tasks();
        self.settle_evictions();
        self.store.entry_count()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        for node in self.store.nodes() {
            self.evict(&node);
        }
        debug!("Security cache cleared");
    }

    pub(crate) fn node(&self, key: &str) -> Option<Arc<CacheNode>> {
        self.store.get(key)
    }

    fn parent_node(&self, reference: &SecurityReference) -> Result<Arc<CacheNode>> {
        self.node(&reference_key(reference))
            .ok_or_else(|| AuthorizationError::parent_evicted(reference))
    }

    /// Cascade the removal of nodes the store evicted on its own.
    fn settle_evictions(&self) {
        for node in self.store.take_evicted() {
            debug!("Entry {} evicted by the store", node.key());
            self.dispose(node);
        }
    }

    /// Remove `node` from the index, if still there, and dispose it.
    fn evict(&self, node: &Arc<CacheNode>) {
        self.store.remove_if_same(node);
        self.dispose(Arc::clone(node));
    }

    /// Dispose a node already out of the index, then all its descendants.
    fn dispose(&self, node: Arc<CacheNode>) {
        let mut pending = vec![node];
        while let Some(node) = pending.pop() {
            let Some(children) = node.dispose() else {
                continue;
            };
            for parent in node.parents() {
                parent.forget(&node);
            }
            for child in children {
                if self.store.remove_if_same(&child) {
                    trace!("Cascading removal to {}", child.key());
                }
                pending.push(child);
            }
        }
    }

    fn remove_key(&self, key: &str) {
        self.settle_evictions();
        match self.store.remove(key) {
            Some(node) => {
                debug!("Removing {} and its dependents", key);
                self.dispose(node);
            }
            None => debug!("Nothing cached under {}", key),
        }
    }

    /// Insert a new node below `parents`.
    fn insert(&self, key: String, entry: CacheEntry, parents: Vec<Arc<CacheNode>>) -> Result<()> {
        let node = CacheNode::new(key, entry, parents);

        if let Err(existing) = self.store.insert_if_absent(&node) {
            if existing.entry().is_same(node.entry()) {
                debug!("Entry {} already cached", node.key());
                return Ok(());
            }
            return Err(AuthorizationError::ConflictingInsertion(node.key().to_owned()));
        }

        for parent in node.parents() {
            if !parent.adopt(&node) {
                debug!("Parent {} of {} went away during insertion", parent.key(), node.key());
                self.evict(&node);
                return Err(AuthorizationError::parent_evicted(parent.key()));
            }
        }

        trace!("Cached {}", node.key());
        Ok(())
    }

    /// Group parents of an identity living in `wiki`.
    fn group_nodes(&self, groups: &[SecurityReference], wiki: &SecurityReference) -> Result<Vec<Arc<CacheNode>>> {
        groups
            .iter()
            .map(|group| {
                let node = if group.is_global() && group.wiki_reference() != wiki {
                    self.node(&shadow_key(group, wiki))
                } else {
                    self.node(&reference_key(group))
                };
                match node {
                    Some(node) if node.entry().is_group() => Ok(node),
                    Some(_) => Err(AuthorizationError::parent_evicted(format!(
                        "{group} is not a group entry"
                    ))),
                    None => Err(AuthorizationError::parent_evicted(group)),
                }
            })
            .collect()
    }
}

impl Default for DefaultSecurityCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl SecurityCache for DefaultSecurityCache {
    fn add_rule_entry(&self, entry: Arc<RuleEntry>) -> Result<()> {
        if entry.reference().security_type().is_identity() {
            return self.add_identity_rule_entry(entry, &[]);
        }
        self.settle_evictions();

        let reference = entry.reference();
        let parents = match reference.parent() {
            Some(parent) => vec![self.parent_node(parent)?],
            None => Vec::new(),
        };

        self.insert(reference_key(reference), CacheEntry::Rule(entry), parents)
    }

    fn add_identity_rule_entry(&self, entry: Arc<RuleEntry>, groups: &[SecurityReference]) -> Result<()> {
        let reference = entry.reference();
        if !reference.security_type().is_identity() {
            return Err(AuthorizationError::InvalidReference(format!(
                "{reference} is not a user or group"
            )));
        }
        let parent = match reference.parent() {
            Some(parent) if parent.security_type() == SecurityType::Space || parent.is_root() => parent,
            _ => {
                return Err(AuthorizationError::InvalidReference(format!(
                    "{reference} has no valid identity parent"
                )));
            }
        };
        self.settle_evictions();

        let mut parents = vec![self.parent_node(parent)?];
        parents.extend(self.group_nodes(groups, reference.wiki_reference())?);

        self.insert(reference_key(reference), CacheEntry::Rule(entry), parents)
    }

    fn add_shadow_entry(&self, entry: Arc<ShadowEntry>, groups: &[SecurityReference]) -> Result<()> {
        let identity = entry.reference();
        let wiki = entry.wiki();
        if !identity.is_global() || identity.wiki_reference() == wiki {
            return Err(AuthorizationError::InvalidReference(format!(
                "{identity} cannot be shadowed into {wiki}"
            )));
        }
        self.settle_evictions();

        let mut parents = vec![self.parent_node(identity)?, self.parent_node(wiki)?];
        parents.extend(self.group_nodes(groups, wiki)?);

        self.insert(shadow_key(identity, wiki), CacheEntry::Shadow(entry), parents)
    }

    fn add_access_entry(
        &self,
        entry: Arc<AccessEntry>,
        scope_wiki: Option<&SecurityReference>,
    ) -> Result<Option<String>> {
        let user = entry.user();
        let entity = entry.entity();
        let wiki = scope_wiki.unwrap_or_else(|| entity.wiki_reference());
        self.settle_evictions();

        let (key, user_node) = match access_scope(user, wiki) {
            AccessScope::Home => (access_key(user, entity, None), self.node(&reference_key(user))),
            AccessScope::Shadowed(wiki) => (
                access_key(user, entity, Some(&wiki)),
                self.node(&shadow_key(user, &wiki)),
            ),
            AccessScope::Foreign => {
                debug!("Not caching access of local user {} in {}", user, wiki);
                return Ok(None);
            }
        };

        let entity_node = self.parent_node(entity)?;
        let user_node = user_node.ok_or_else(|| AuthorizationError::parent_evicted(user))?;
        if !user_node.entry().is_user() {
            return Err(AuthorizationError::parent_evicted(format!(
                "{} is not a user entry",
                user_node.key()
            )));
        }

        self.insert(key.clone(), CacheEntry::Access(entry), vec![entity_node, user_node])?;
        Ok(Some(key))
    }

    fn get(&self, reference: &SecurityReference) -> Option<Arc<RuleEntry>> {
        let key = reference_key(reference);
        let entry = self
            .node(&key)
            .and_then(|node| node.entry().as_rule().cloned());
        trace!("Rule lookup {} hit={}", key, entry.is_some());
        entry
    }

    fn get_shadow(&self, identity: &SecurityReference, wiki: &SecurityReference) -> Option<Arc<ShadowEntry>> {
        self.node(&shadow_key(identity, wiki))
            .and_then(|node| node.entry().as_shadow().cloned())
    }

    fn get_access(&self, user: &SecurityReference, entity: &SecurityReference) -> Option<Arc<AccessEntry>> {
        let key = match access_scope(user, entity.wiki_reference()) {
            AccessScope::Home => access_key(user, entity, None),
            AccessScope::Shadowed(wiki) => access_key(user, entity, Some(&wiki)),
            AccessScope::Foreign => return None,
        };
        self.node(&key)
            .and_then(|node| node.entry().as_access().cloned())
    }

    fn remove(&self, reference: &SecurityReference) {
        self.remove_key(&reference_key(reference));
    }

    fn remove_access(&self, user: &SecurityReference, entity: &SecurityReference) {
        match access_scope(user, entity.wiki_reference()) {
            AccessScope::Home => self.remove_key(&access_key(user, entity, None)),
            AccessScope::Shadowed(wiki) => self.remove_key(&access_key(user, entity, Some(&wiki))),
            AccessScope::Foreign => {}
        }
    }
}
