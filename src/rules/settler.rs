//! Reference settling policy.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::cache::RuleEntry;
use crate::error::Result;
use crate::loader::AuthorizationSettler;
use crate::reference::SecurityReference;

use super::{Access, RuleState};

/// Closest level wins.
///
/// The hierarchy is walked from the entity up to the root; the first level
/// holding rules that apply to the user decides each right, and within one
/// level a deny beats an allow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAuthorizationSettler;

impl AuthorizationSettler for DefaultAuthorizationSettler {
    fn settle(
        &self,
        user: &SecurityReference,
        groups: &HashSet<SecurityReference>,
        hierarchy: &[Arc<RuleEntry>],
    ) -> Result<Access> {
        let mut access = Access::default();

        for entry in hierarchy {
            let mut level = BTreeMap::new();
            for rule in entry.rules() {
                if !rule.applies_to(user, groups) {
                    continue;
                }
                for right in &rule.rights {
                    let state = level.entry(*right).or_insert(rule.state);
                    if rule.state == RuleState::Deny {
                        *state = RuleState::Deny;
                    }
                }
            }
            for (right, state) in level {
                if access.is_undetermined(right) {
                    access.set(right, state);
                }
            }
        }

        Ok(access)
    }
}
