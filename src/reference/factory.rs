//! Builds security references from domain references.

use super::{EntityReference, EntityType, SecurityReference, SecurityType};

/// Converts domain references into security references rooted at the main wiki.
#[derive(Debug, Clone)]
pub struct SecurityReferenceFactory {
    main_wiki: EntityReference,
    root: SecurityReference,
}

impl SecurityReferenceFactory {
    /// Create a factory for a farm whose main wiki is `main_wiki`.
    pub fn new(main_wiki: EntityReference) -> Self {
        let main_wiki = main_wiki.wiki_reference().clone();
        let root = SecurityReference::new(
            SecurityType::Wiki,
            main_wiki.name(),
            None,
            Some(main_wiki.clone()),
            true,
        );
        Self { main_wiki, root }
    }

    /// The main wiki, root of the security tree.
    pub fn main_wiki(&self) -> &SecurityReference {
        &self.root
    }

    pub fn main_wiki_entity(&self) -> &EntityReference {
        &self.main_wiki
    }

    pub fn is_main_wiki(&self, reference: &EntityReference) -> bool {
        reference.wiki_reference() == &self.main_wiki
    }

    /// Security reference of an entity. Attachments resolve to their document.
    pub fn entity(&self, reference: &EntityReference) -> SecurityReference {
        match reference.entity_type() {
            EntityType::Wiki if reference == &self.main_wiki => self.root.clone(),
            EntityType::Wiki => SecurityReference::new(
                SecurityType::Wiki,
                reference.name(),
                Some(self.root.clone()),
                Some(reference.clone()),
                false,
            ),
            EntityType::Space => self.child(SecurityType::Space, reference),
            EntityType::Document => self.child(SecurityType::Document, reference),
            EntityType::Attachment => match reference.parent() {
                Some(document) => self.entity(document),
                None => self.root.clone(),
            },
        }
    }

    /// Security reference of a user profile document, or the guest for `None`.
    pub fn user(&self, user: Option<&EntityReference>) -> SecurityReference {
        match user {
            Some(user) => self.identity(SecurityType::User, user),
            None => self.guest(),
        }
    }

    /// Security reference of a group document.
    pub fn group(&self, group: &EntityReference) -> SecurityReference {
        self.identity(SecurityType::Group, group)
    }

    /// The anonymous user. It has no home wiki of its own and hangs below the
    /// main wiki.
    pub fn guest(&self) -> SecurityReference {
        SecurityReference::new(SecurityType::User, "", Some(self.root.clone()), None, true)
    }

    fn identity(&self, security_type: SecurityType, reference: &EntityReference) -> SecurityReference {
        let document = reference
            .extract(EntityType::Document)
            .unwrap_or(reference);
        SecurityReference::new(
            security_type,
            document.name(),
            Some(self.parent_of(document)),
            Some(document.clone()),
            self.is_main_wiki(document),
        )
    }

    fn child(&self, security_type: SecurityType, reference: &EntityReference) -> SecurityReference {
        SecurityReference::new(
            security_type,
            reference.name(),
            Some(self.parent_of(reference)),
            Some(reference.clone()),
            false,
        )
    }

    fn parent_of(&self, reference: &EntityReference) -> SecurityReference {
        match reference.parent() {
            Some(parent) => self.entity(parent),
            None => self.root.clone(),
        }
    }
}
