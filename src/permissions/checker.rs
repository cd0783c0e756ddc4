//! Authorization checks with caching.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{AccessEntry, DefaultSecurityCache, SecurityCache};
use crate::config::{DEFAULT_LOAD_ATTEMPTS, Settings};
use crate::error::{AuthorizationError, Result};
use crate::loader::{AuthorizationSettler, CacheLoader, GroupResolver, SecurityEntryReader, WikiBridge};
use crate::reference::{EntityReference, SecurityReference, SecurityReferenceFactory};
use crate::rules::{Access, Right};

/// Answers access questions from the cache, loading what is missing.
///
/// Loads that observe a concurrent removal are restarted from scratch, up
/// to a bounded number of attempts.
#[derive(Clone)]
pub struct AuthorizationManager {
    cache: Arc<dyn SecurityCache>,
    loader: Arc<CacheLoader>,
    bridge: Arc<dyn WikiBridge>,
    factory: SecurityReferenceFactory,
    max_load_attempts: usize,
}

impl AuthorizationManager {
    /// Create a manager over an existing cache.
    pub fn new(
        cache: Arc<dyn SecurityCache>,
        reader: Arc<dyn SecurityEntryReader>,
        settler: Arc<dyn AuthorizationSettler>,
        groups: Arc<dyn GroupResolver>,
        bridge: Arc<dyn WikiBridge>,
    ) -> Self {
        let factory = SecurityReferenceFactory::new(bridge.main_wiki_reference());
        let loader = CacheLoader::new(Arc::clone(&cache), reader, settler, groups);

        Self {
            cache,
            loader: Arc::new(loader),
            bridge,
            factory,
            max_load_attempts: DEFAULT_LOAD_ATTEMPTS,
        }
    }

    /// Create a manager with its own cache, sized by `settings`.
    pub fn from_settings(
        settings: &Settings,
        reader: Arc<dyn SecurityEntryReader>,
        settler: Arc<dyn AuthorizationSettler>,
        groups: Arc<dyn GroupResolver>,
        bridge: Arc<dyn WikiBridge>,
    ) -> Self {
        let cache = Arc::new(DefaultSecurityCache::new(&settings.cache));
        Self::new(cache, reader, settler, groups, bridge).max_load_attempts(settings.max_load_attempts)
    }

    /// Set how many times a load is started before giving up (at least one).
    #[must_use]
    pub fn max_load_attempts(mut self, attempts: usize) -> Self {
        self.max_load_attempts = attempts.max(1);
        self
    }

    pub fn factory(&self) -> &SecurityReferenceFactory {
        &self.factory
    }

    /// Settled access of `user` (the guest for `None`) on `entity`.
    pub fn access(&self, user: Option<&EntityReference>, entity: &EntityReference) -> Result<Access> {
        let user = self.factory.user(user);
        let entity = self.security_entity(entity);

        if let Some(cached) = self.cache.get_access(&user, &entity) {
            debug!("Access cache hit for {} on {}", user, entity);
            return Ok(cached.access().clone());
        }

        debug!("Access cache miss for {} on {}", user, entity);
        self.load(&user, &entity).map(|entry| entry.access().clone())
    }

    /// Whether `user` is explicitly allowed `right` on `entity`.
    pub fn has_access(&self, right: Right, user: Option<&EntityReference>, entity: &EntityReference) -> Result<bool> {
        Ok(self.access(user, entity)?.allows(right))
    }

    /// Drop the cached rules of `entity` and everything settled from them.
    ///
    /// Call this when rules attached to the entity change.
    pub fn invalidate(&self, entity: &EntityReference) {
        let entity = self.security_entity(entity);
        self.cache.remove(&entity);
        debug!("Invalidated {}", entity);
    }

    /// Drop the cached entry of a user and its settled accesses.
    pub fn invalidate_user(&self, user: Option<&EntityReference>) {
        let user = self.factory.user(user);
        self.cache.remove(&user);
        debug!("Invalidated {}", user);
    }

    /// Drop everything cached in the wiki of a group.
    ///
    /// Call this when the membership of the group changes. Members that just
    /// joined hold no link to the group entry, so the whole wiki goes,
    /// together with the shadows and accesses settled there. For a group of
    /// the main wiki this empties the cache.
    pub fn invalidate_group(&self, group: &EntityReference) {
        let group = self.factory.group(group);
        let wiki = group.wiki_reference();
        self.cache.remove(wiki);
        debug!("Invalidated {} and {}", group, wiki);
    }

    /// Drop a single settled access.
    pub fn invalidate_access(&self, user: Option<&EntityReference>, entity: &EntityReference) {
        let user = self.factory.user(user);
        let entity = self.security_entity(entity);
        self.cache.remove_access(&user, &entity);
        debug!("Invalidated access of {} on {}", user, entity);
    }

    fn security_entity(&self, entity: &EntityReference) -> SecurityReference {
        self.factory
            .entity(&self.bridge.to_compatible_entity_reference(entity))
    }

    fn load(&self, user: &SecurityReference, entity: &SecurityReference) -> Result<Arc<AccessEntry>> {
        let mut attempt = 1;
        loop {
            match self.loader.load(user, entity) {
                Ok(entry) => return Ok(entry),
                Err(error) if error.is_retryable() && attempt < self.max_load_attempts => {
                    warn!(
                        "Load of {} on {} failed ({}), retrying (attempt {}/{})",
                        user,
                        entity,
                        error,
                        attempt + 1,
                        self.max_load_attempts
                    );
                    attempt += 1;
                }
                Err(error) if error.is_retryable() => {
                    return Err(AuthorizationError::RetriesExhausted {
                        user: user.to_string(),
                        entity: entity.to_string(),
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl std::fmt::Debug for AuthorizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationManager")
            .field("factory", &self.factory)
            .field("max_load_attempts", &self.max_load_attempts)
            .finish_non_exhaustive()
    }
}
