//! Rules and settled access decisions.
//!
//! The cache treats both as opaque values. This module only gives them a
//! concrete shape so entries stay strongly typed.

mod settler;

use std::collections::{BTreeMap, BTreeSet};

use crate::reference::{EntityReference, SecurityReference};

pub use settler::DefaultAuthorizationSettler;

/// A right that can be granted or denied on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Right {
    View,
    Edit,
    Comment,
    Delete,
    Script,
    Admin,
    Programming,
    Register,
    Login,
}

/// Outcome of a rule, or of settling, for one right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleState {
    #[default]
    Undetermined,
    Deny,
    Allow,
}

/// A single rule attached to an entity or identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityRule {
    pub rights: BTreeSet<Right>,
    pub users: Vec<EntityReference>,
    pub groups: Vec<EntityReference>,
    pub state: RuleState,
}

impl SecurityRule {
    /// Allow `rights` to the listed subjects.
    pub fn allow(rights: impl IntoIterator<Item = Right>) -> Self {
        Self {
            rights: rights.into_iter().collect(),
            state: RuleState::Allow,
            ..Default::default()
        }
    }

    /// Deny `rights` to the listed subjects.
    pub fn deny(rights: impl IntoIterator<Item = Right>) -> Self {
        Self {
            rights: rights.into_iter().collect(),
            state: RuleState::Deny,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn user(mut self, user: EntityReference) -> Self {
        self.users.push(user);
        self
    }

    #[must_use]
    pub fn group(mut self, group: EntityReference) -> Self {
        self.groups.push(group);
        self
    }

    /// Whether the rule targets `user` directly or one of `groups`.
    pub fn applies_to<'a>(
        &self,
        user: &SecurityReference,
        groups: impl IntoIterator<Item = &'a SecurityReference>,
    ) -> bool {
        if user.original().is_some_and(|u| self.users.contains(u)) {
            return true;
        }
        groups
            .into_iter()
            .filter_map(SecurityReference::original)
            .any(|g| self.groups.contains(g))
    }
}

/// The settled access of a user on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Access {
    states: BTreeMap<Right, RuleState>,
}

impl Access {
    pub fn get(&self, right: Right) -> RuleState {
        self.states.get(&right).copied().unwrap_or_default()
    }

    /// Only an explicit allow grants a right.
    pub fn allows(&self, right: Right) -> bool {
        self.get(right) == RuleState::Allow
    }

    pub fn set(&mut self, right: Right, state: RuleState) {
        if state == RuleState::Undetermined {
            self.states.remove(&right);
        } else {
            self.states.insert(right, state);
        }
    }

    #[must_use]
    pub fn with(mut self, right: Right, state: RuleState) -> Self {
        self.set(right, state);
        self
    }

    pub fn is_undetermined(&self, right: Right) -> bool {
        self.get(right) == RuleState::Undetermined
    }
}
