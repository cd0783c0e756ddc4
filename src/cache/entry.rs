//! Entries held by the security cache.

use std::sync::Arc;

use crate::reference::{SecurityReference, SecurityType};
use crate::rules::{Access, SecurityRule};

/// Rules attached directly to one reference, possibly none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    reference: SecurityReference,
    rules: Vec<SecurityRule>,
}

impl RuleEntry {
    pub fn new(reference: SecurityReference, rules: Vec<SecurityRule>) -> Self {
        Self { reference, rules }
    }

    pub fn empty(reference: SecurityReference) -> Self {
        Self::new(reference, Vec::new())
    }

    pub fn reference(&self) -> &SecurityReference {
        &self.reference
    }

    pub fn rules(&self) -> &[SecurityRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Presence of a global identity inside a wiki other than the main one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEntry {
    reference: SecurityReference,
    wiki: SecurityReference,
}

impl ShadowEntry {
    pub fn new(reference: SecurityReference, wiki: SecurityReference) -> Self {
        Self { reference, wiki }
    }

    /// The shadowed global identity.
    pub fn reference(&self) -> &SecurityReference {
        &self.reference
    }

    pub fn wiki(&self) -> &SecurityReference {
        &self.wiki
    }
}

/// Settled access of a user on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    user: SecurityReference,
    entity: SecurityReference,
    access: Access,
}

impl AccessEntry {
    pub fn new(user: SecurityReference, entity: SecurityReference, access: Access) -> Self {
        Self { user, entity, access }
    }

    pub fn user(&self) -> &SecurityReference {
        &self.user
    }

    pub fn entity(&self) -> &SecurityReference {
        &self.entity
    }

    pub fn access(&self) -> &Access {
        &self.access
    }
}

/// Any value stored in the cache.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Rule(Arc<RuleEntry>),
    Shadow(Arc<ShadowEntry>),
    Access(Arc<AccessEntry>),
}

impl CacheEntry {
    /// Whether inserting `other` over `self` is a harmless repeat.
    ///
    /// Rule and shadow entries are snapshots compared by value; two loaders
    /// reading the same rules agree. Access entries are only the same when
    /// they are the very same object.
    pub fn is_same(&self, other: &CacheEntry) -> bool {
        match (self, other) {
            (CacheEntry::Rule(a), CacheEntry::Rule(b)) => Arc::ptr_eq(a, b) || a == b,
            (CacheEntry::Shadow(a), CacheEntry::Shadow(b)) => Arc::ptr_eq(a, b) || a == b,
            (CacheEntry::Access(a), CacheEntry::Access(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this entry can stand as the user side of an access entry.
    pub fn is_user(&self) -> bool {
        match self {
            CacheEntry::Rule(entry) => entry.reference().security_type() == SecurityType::User,
            CacheEntry::Shadow(entry) => entry.reference().security_type() == SecurityType::User,
            CacheEntry::Access(_) => false,
        }
    }

    /// Whether this entry is a group identity, cached or shadowed.
    pub fn is_group(&self) -> bool {
        match self {
            CacheEntry::Rule(entry) => entry.reference().security_type() == SecurityType::Group,
            CacheEntry::Shadow(entry) => entry.reference().security_type() == SecurityType::Group,
            CacheEntry::Access(_) => false,
        }
    }

    pub fn as_rule(&self) -> Option<&Arc<RuleEntry>> {
        match self {
            CacheEntry::Rule(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_shadow(&self) -> Option<&Arc<ShadowEntry>> {
        match self {
            CacheEntry::Shadow(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_access(&self) -> Option<&Arc<AccessEntry>> {
        match self {
            CacheEntry::Access(entry) => Some(entry),
            _ => None,
        }
    }
}
