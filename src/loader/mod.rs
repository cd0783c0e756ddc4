//! Cache loader and the collaborators it drives.
//!
//! The loader is the only component that calls the rule reader, the group
//! resolver and the settler; the cache never calls them back.

mod cache_loader;

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::RuleEntry;
use crate::error::Result;
use crate::reference::{EntityReference, EntityType, SecurityReference};
use crate::rules::Access;

pub use cache_loader::CacheLoader;

/// Reads the rules attached to a reference. Called on cache misses only.
pub trait SecurityEntryReader: Send + Sync {
    fn read(&self, reference: &SecurityReference) -> Result<RuleEntry>;
}

/// Turns a rule hierarchy into a decision.
///
/// `hierarchy` is ordered from the entity (first) up to the root (last).
/// Implementations must be pure and deterministic.
pub trait AuthorizationSettler: Send + Sync {
    fn settle(
        &self,
        user: &SecurityReference,
        groups: &HashSet<SecurityReference>,
        hierarchy: &[Arc<RuleEntry>],
    ) -> Result<Access>;
}

/// Finds every group a user belongs to in a wiki, directly or not.
pub trait GroupResolver: Send + Sync {
    fn get_all_groups_for(
        &self,
        user: &SecurityReference,
        wiki: &SecurityReference,
    ) -> Result<HashSet<SecurityReference>>;
}

/// Wiki-level knowledge the cache depends on.
pub trait WikiBridge: Send + Sync {
    fn main_wiki_reference(&self) -> EntityReference;

    /// Normalize a reference to something rules can be attached to.
    ///
    /// Rights are held by documents, so attachments map to their document.
    fn to_compatible_entity_reference(&self, reference: &EntityReference) -> EntityReference {
        match reference.entity_type() {
            EntityType::Attachment => reference
                .extract(EntityType::Document)
                .unwrap_or(reference)
                .clone(),
            _ => reference.clone(),
        }
    }
}

#[cfg(test)]
mod tests;
