//! Domain references to wiki entities.

use std::fmt;
use std::sync::Arc;

/// Kind of a domain entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Wiki,
    Space,
    Document,
    Attachment,
}

/// Reference to an entity of the wiki model.
///
/// A wiki is always the root of the chain. Spaces nest under a wiki or
/// another space, documents live in a space and attachments in a document.
/// Cloning is cheap, the parent chain is shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EntityReference(Arc<EntityNode>);

#[derive(PartialEq, Eq, Hash)]
struct EntityNode {
    entity_type: EntityType,
    name: String,
    parent: Option<EntityReference>,
}

impl EntityReference {
    fn new(entity_type: EntityType, name: impl Into<String>, parent: Option<&EntityReference>) -> Self {
        Self(Arc::new(EntityNode {
            entity_type,
            name: name.into(),
            parent: parent.cloned(),
        }))
    }

    /// Create a reference to a wiki.
    pub fn wiki(name: impl Into<String>) -> Self {
        Self::new(EntityType::Wiki, name, None)
    }

    /// Create a space under this wiki or space.
    pub fn space(&self, name: impl Into<String>) -> Self {
        debug_assert!(matches!(self.entity_type(), EntityType::Wiki | EntityType::Space));
        Self::new(EntityType::Space, name, Some(self))
    }

    /// Create a document in this space.
    pub fn document(&self, name: impl Into<String>) -> Self {
        debug_assert_eq!(self.entity_type(), EntityType::Space);
        Self::new(EntityType::Document, name, Some(self))
    }

    /// Create an attachment of this document.
    pub fn attachment(&self, name: impl Into<String>) -> Self {
        debug_assert_eq!(self.entity_type(), EntityType::Document);
        Self::new(EntityType::Attachment, name, Some(self))
    }

    /// Shortcut for `wiki:Space1.Space2.Page` style documents.
    pub fn document_in(wiki: &str, spaces: &[&str], page: &str) -> Self {
        let mut parent = Self::wiki(wiki);
        for space in spaces {
            parent = parent.space(*space);
        }
        parent.document(page)
    }

    pub fn entity_type(&self) -> EntityType {
        self.0.entity_type
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&EntityReference> {
        self.0.parent.as_ref()
    }

    /// The wiki this entity belongs to.
    pub fn wiki_reference(&self) -> &EntityReference {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Nearest reference of the given type, starting with this one.
    pub fn extract(&self, entity_type: EntityType) -> Option<&EntityReference> {
        let mut current = Some(self);
        while let Some(reference) = current {
            if reference.entity_type() == entity_type {
                return Some(reference);
            }
            current = reference.parent();
        }
        None
    }

    /// References from the wiki down to this one.
    pub fn chain(&self) -> Vec<&EntityReference> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(reference) = current {
            chain.push(reference);
            current = reference.parent();
        }
        chain.reverse();
        chain
    }

    /// Render as `wiki:Space.Page@attachment`.
    ///
    /// Nested spaces and documents share the dotted notation, so a space
    /// and a document can serialize to the same string.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for reference in self.chain() {
            match reference.entity_type() {
                EntityType::Wiki => {
                    out.push_str(reference.name());
                    out.push(':');
                }
                EntityType::Space | EntityType::Document => {
                    if !out.ends_with(':') {
                        out.push('.');
                    }
                    out.push_str(reference.name());
                }
                EntityType::Attachment => {
                    out.push('@');
                    out.push_str(reference.name());
                }
            }
        }
        if out.ends_with(':') {
            out.pop();
        }
        out
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl fmt::Debug for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]", self.entity_type(), self.serialize())
    }
}
