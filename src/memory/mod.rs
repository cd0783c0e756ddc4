//! In-memory rules and group memberships.
//!
//! Implements the reader, group resolver and wiki bridge over concurrent
//! maps, for embedding and tests.

use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;
use tracing::debug;

use crate::cache::RuleEntry;
use crate::cache::key::reference_key;
use crate::error::Result;
use crate::loader::{GroupResolver, SecurityEntryReader, WikiBridge};
use crate::reference::{EntityReference, SecurityReference, SecurityReferenceFactory};
use crate::rules::SecurityRule;

/// Rules and memberships held in memory.
///
/// Rules are attached to domain references; users and groups carry the
/// rules of their profile document.
#[derive(Debug)]
pub struct MemoryRuleStore {
    factory: SecurityReferenceFactory,
    rules: DashMap<EntityReference, Vec<SecurityRule>>,
    /// Member (user or group) -> groups it directly belongs to.
    memberships: DashMap<EntityReference, Vec<EntityReference>>,
    reads: DashMap<String, usize>,
}

impl MemoryRuleStore {
    pub fn new(main_wiki: EntityReference) -> Self {
        Self {
            factory: SecurityReferenceFactory::new(main_wiki),
            rules: DashMap::new(),
            memberships: DashMap::new(),
            reads: DashMap::new(),
        }
    }

    pub fn factory(&self) -> &SecurityReferenceFactory {
        &self.factory
    }

    /// Replace the rules attached to `reference`.
    pub fn set_rules(&self, reference: &EntityReference, rules: Vec<SecurityRule>) {
        self.rules.insert(reference.clone(), rules);
    }

    /// Add a rule to those attached to `reference`.
    pub fn add_rule(&self, reference: &EntityReference, rule: SecurityRule) {
        self.rules.entry(reference.clone()).or_default().push(rule);
    }

    /// Make `member` (a user or group) a direct member of `group`.
    pub fn add_member(&self, group: &EntityReference, member: &EntityReference) {
        let mut groups = self.memberships.entry(member.clone()).or_default();
        if !groups.contains(group) {
            groups.push(group.clone());
        }
    }

    pub fn remove_member(&self, group: &EntityReference, member: &EntityReference) {
        if let Some(mut groups) = self.memberships.get_mut(member) {
            groups.retain(|g| g != group);
        }
    }

    /// How many times the rules of `reference` were read.
    pub fn read_count(&self, reference: &SecurityReference) -> usize {
        self.reads
            .get(&reference_key(reference))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Groups reachable from `member`, following nested groups once each.
    fn transitive_groups(&self, member: &EntityReference) -> Vec<EntityReference> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([member.clone()]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(groups) = self.memberships.get(&current).map(|g| g.value().clone()) else {
                continue;
            };
            for group in groups {
                if seen.insert(group.clone()) {
                    found.push(group.clone());
                    queue.push_back(group);
                }
            }
        }
        found
    }
}

impl SecurityEntryReader for MemoryRuleStore {
    fn read(&self, reference: &SecurityReference) -> Result<RuleEntry> {
        *self.reads.entry(reference_key(reference)).or_default() += 1;

        let rules = reference
            .original()
            .and_then(|original| self.rules.get(original).map(|rules| rules.value().clone()))
            .unwrap_or_default();

        debug!("Read {} rules for {}", rules.len(), reference);
        Ok(RuleEntry::new(reference.clone(), rules))
    }
}

impl GroupResolver for MemoryRuleStore {
    fn get_all_groups_for(
        &self,
        user: &SecurityReference,
        wiki: &SecurityReference,
    ) -> Result<HashSet<SecurityReference>> {
        let Some(original) = user.original() else {
            return Ok(HashSet::new());
        };
        let wiki = wiki.original().map(EntityReference::wiki_reference);

        Ok(self
            .transitive_groups(original)
            .into_iter()
            .filter(|group| {
                Some(group.wiki_reference()) == wiki
                    || (user.is_global() && self.factory.is_main_wiki(group))
            })
            .map(|group| self.factory.group(&group))
            .collect())
    }
}

impl WikiBridge for MemoryRuleStore {
    fn main_wiki_reference(&self) -> EntityReference {
        self.factory.main_wiki_entity().clone()
    }
}
