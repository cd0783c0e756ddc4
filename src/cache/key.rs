//! Cache key derivation.
//!
//! Every path segment carries its own type tag, so a space and a document
//! with the same serialized path never share a slot. Names are length
//! prefixed, which keeps keys unambiguous whatever characters they contain.

use std::fmt::Write;

use crate::reference::SecurityReference;

const ACCESS_PREFIX: char = 'A';
const USER_ENTITY_SEPARATOR: char = '@';
const WIKI_SCOPE_SEPARATOR: char = '#';

/// Key of the rule entry (or identity entry) of a reference.
pub fn reference_key(reference: &SecurityReference) -> String {
    let mut key = String::new();
    key.push(reference.security_type().tag());
    for segment in reference.reversed_chain() {
        let name = segment.name();
        let _ = write!(key, "|{}{}:{}", segment.security_type().tag(), name.len(), name);
    }
    key
}

/// Key of the shadow of a global identity inside `wiki`.
pub fn shadow_key(identity: &SecurityReference, wiki: &SecurityReference) -> String {
    format!(
        "{}{}{}",
        reference_key(identity),
        USER_ENTITY_SEPARATOR,
        reference_key(wiki)
    )
}

/// Key of the access of `user` on `entity`, optionally scoped to a wiki.
pub fn access_key(
    user: &SecurityReference,
    entity: &SecurityReference,
    scope_wiki: Option<&SecurityReference>,
) -> String {
    let mut key = format!(
        "{}{}{}{}",
        ACCESS_PREFIX,
        reference_key(user),
        USER_ENTITY_SEPARATOR,
        reference_key(entity)
    );
    if let Some(wiki) = scope_wiki {
        key.push(WIKI_SCOPE_SEPARATOR);
        key.push_str(&reference_key(wiki));
    }
    key
}
