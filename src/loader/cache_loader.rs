//! Fills the security cache for one (user, entity) pair.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{AuthorizationSettler, GroupResolver, SecurityEntryReader};
use crate::cache::{AccessEntry, RuleEntry, SecurityCache, ShadowEntry};
use crate::error::{AuthorizationError, Result};
use crate::reference::SecurityReference;

/// Loads missing entries into the cache and settles access.
///
/// A load is not transactional. When an entry it depends on is removed
/// midway, it fails with [`AuthorizationError::ParentEvicted`] and must be
/// retried from scratch by the caller.
pub struct CacheLoader {
    cache: Arc<dyn SecurityCache>,
    reader: Arc<dyn SecurityEntryReader>,
    settler: Arc<dyn AuthorizationSettler>,
    groups: Arc<dyn GroupResolver>,
}

impl CacheLoader {
    pub fn new(
        cache: Arc<dyn SecurityCache>,
        reader: Arc<dyn SecurityEntryReader>,
        settler: Arc<dyn AuthorizationSettler>,
        groups: Arc<dyn GroupResolver>,
    ) -> Self {
        Self {
            cache,
            reader,
            settler,
            groups,
        }
    }

    /// Settle the access of `user` on `entity`, caching whatever was missing.
    ///
    /// The returned entry is always the one computed by this call, whether
    /// or not it made it into the cache.
    pub fn load(&self, user: &SecurityReference, entity: &SecurityReference) -> Result<Arc<AccessEntry>> {
        let hierarchy = self.load_rules(entity)?;
        let wiki = entity.wiki_reference();
        let groups = self.load_user(user, wiki)?;

        let access = self.settler.settle(user, &groups, &hierarchy)?;
        let entry = Arc::new(AccessEntry::new(user.clone(), entity.clone(), access));

        self.store_access(&entry, wiki)?;
        Ok(entry)
    }

    /// Rule entries of `reference` and its ancestors, entity first.
    ///
    /// Missing entries are read and cached from the root down.
    fn load_rules(&self, reference: &SecurityReference) -> Result<Vec<Arc<RuleEntry>>> {
        let mut hierarchy = Vec::new();
        for reference in reference.reversed_chain() {
            let entry = match self.cache.get(&reference) {
                Some(entry) => entry,
                None => {
                    debug!("Rule cache miss for {}", reference);
                    let entry = Arc::new(self.reader.read(&reference)?);
                    self.cache.add_rule_entry(Arc::clone(&entry))?;
                    entry
                }
            };
            hierarchy.push(entry);
        }
        hierarchy.reverse();
        Ok(hierarchy)
    }

    /// Make sure the user side of an access on `wiki` is cached and return
    /// the groups of the user in that wiki.
    fn load_user(&self, user: &SecurityReference, wiki: &SecurityReference) -> Result<HashSet<SecurityReference>> {
        let groups = self.groups_of(user, wiki)?;
        // The guest has no wiki of its own; it resolves to the main wiki.
        let home = user.wiki_reference();

        if home == wiki {
            let parents = self.load_groups(&groups, wiki)?;
            self.load_identity(user, &parents)?;
        } else if user.is_global() {
            let home_groups = self.groups_of(user, home)?;
            let parents = self.load_groups(&home_groups, home)?;
            self.load_identity(user, &parents)?;

            let shadow_parents = self.load_groups(&groups, wiki)?;
            self.load_shadow(user, wiki, &shadow_parents)?;
        } else {
            debug!("Local user {} has no presence in {}", user, wiki);
        }

        Ok(groups)
    }

    fn groups_of(&self, user: &SecurityReference, wiki: &SecurityReference) -> Result<HashSet<SecurityReference>> {
        if user.is_guest() {
            return Ok(HashSet::new());
        }
        self.groups.get_all_groups_for(user, wiki)
    }

    /// Cache the groups usable as parents in `wiki` and return them.
    ///
    /// Global groups are shadowed into foreign wikis, local groups of other
    /// wikis are skipped.
    fn load_groups(
        &self,
        groups: &HashSet<SecurityReference>,
        wiki: &SecurityReference,
    ) -> Result<Vec<SecurityReference>> {
        let mut parents = Vec::with_capacity(groups.len());
        for group in groups {
            if group.wiki_reference() == wiki {
                self.load_identity(group, &[])?;
            } else if group.is_global() {
                self.load_identity(group, &[])?;
                self.load_shadow(group, wiki, &[])?;
            } else {
                continue;
            }
            parents.push(group.clone());
        }
        Ok(parents)
    }

    fn load_identity(&self, identity: &SecurityReference, groups: &[SecurityReference]) -> Result<()> {
        if self.cache.get(identity).is_some() {
            return Ok(());
        }
        if let Some(parent) = identity.parent() {
            self.load_rules(parent)?;
        }
        let entry = Arc::new(self.reader.read(identity)?);
        self.cache.add_identity_rule_entry(entry, groups)
    }

    fn load_shadow(
        &self,
        identity: &SecurityReference,
        wiki: &SecurityReference,
        groups: &[SecurityReference],
    ) -> Result<()> {
        if self.cache.get_shadow(identity, wiki).is_some() {
            return Ok(());
        }
        let entry = Arc::new(ShadowEntry::new(identity.clone(), wiki.clone()));
        self.cache.add_shadow_entry(entry, groups)
    }

    /// Best-effort insertion of a settled access.
    ///
    /// The key carries a wiki scope only for a user outside its home wiki.
    /// A conflict is retried once without an explicit scope, which resolves
    /// to the same slot: the retry only lands when the competing entry went
    /// away in between. Either way the computed entry is returned.
    fn store_access(&self, entry: &Arc<AccessEntry>, wiki: &SecurityReference) -> Result<()> {
        let scope = (entry.user().wiki_reference() != wiki).then_some(wiki);

        match self.cache.add_access_entry(Arc::clone(entry), scope) {
            Ok(_) => Ok(()),
            Err(AuthorizationError::ConflictingInsertion(key)) => {
                debug!("Access {} inserted concurrently, retrying", key);
                if let Err(error) = self.cache.add_access_entry(Arc::clone(entry), None) {
                    warn!(
                        "Ignoring failure to cache access of {} on {}: {}",
                        entry.user(),
                        entry.entity(),
                        error
                    );
                }
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

impl std::fmt::Debug for CacheLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLoader").finish_non_exhaustive()
    }
}
