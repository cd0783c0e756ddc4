//! Security references: the authorization view of entities and identities.

use std::fmt;
use std::sync::Arc;

use super::EntityReference;

/// Level of a node in the security tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityType {
    Wiki,
    Space,
    Document,
    User,
    Group,
}

impl SecurityType {
    /// Single letter used when deriving cache keys.
    pub fn tag(self) -> char {
        match self {
            SecurityType::Wiki => 'W',
            SecurityType::Space => 'S',
            SecurityType::Document => 'D',
            SecurityType::User => 'U',
            SecurityType::Group => 'G',
        }
    }

    /// Whether this is a user or group.
    pub fn is_identity(self) -> bool {
        matches!(self, SecurityType::User | SecurityType::Group)
    }
}

/// A node of the security tree.
///
/// The main wiki is the root; every other wiki hangs below it. Identities
/// (users and groups) hang below the space holding their profile, except the
/// guest which hangs directly below the main wiki.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecurityReference(Arc<Node>);

#[derive(PartialEq, Eq, Hash)]
struct Node {
    security_type: SecurityType,
    name: String,
    parent: Option<SecurityReference>,
    original: Option<EntityReference>,
    global: bool,
}

impl SecurityReference {
    pub(crate) fn new(
        security_type: SecurityType,
        name: impl Into<String>,
        parent: Option<SecurityReference>,
        original: Option<EntityReference>,
        global: bool,
    ) -> Self {
        Self(Arc::new(Node {
            security_type,
            name: name.into(),
            parent,
            original,
            global,
        }))
    }

    pub fn security_type(&self) -> SecurityType {
        self.0.security_type
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&SecurityReference> {
        self.0.parent.as_ref()
    }

    /// The domain reference this node mirrors. `None` only for the guest.
    pub fn original(&self) -> Option<&EntityReference> {
        self.0.original.as_ref()
    }

    /// Identity defined in the main wiki, usable from every wiki.
    pub fn is_global(&self) -> bool {
        self.0.global
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn is_guest(&self) -> bool {
        self.security_type() == SecurityType::User && self.0.original.is_none()
    }

    /// The wiki this node belongs to. A wiki belongs to itself.
    pub fn wiki_reference(&self) -> &SecurityReference {
        let mut current = self;
        while current.security_type() != SecurityType::Wiki {
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Ancestors from the root down to this node, inclusive.
    pub fn reversed_chain(&self) -> Vec<SecurityReference> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(reference) = current {
            chain.push(reference.clone());
            current = reference.parent();
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for SecurityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.original() {
            Some(original) => write!(f, "{:?} {}", self.security_type(), original),
            None => write!(f, "{:?} guest", self.security_type()),
        }
    }
}

impl fmt::Debug for SecurityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityReference({self})")
    }
}
