//! Reference model.
//!
//! - `EntityReference` - domain references (wiki, space, document, attachment)
//! - `SecurityReference` - the security tree, rooted at the main wiki, also
//!   covering users and groups
//! - `SecurityReferenceFactory` - conversion between the two

mod entity;
mod factory;
mod security;

pub use entity::{EntityReference, EntityType};
pub use factory::SecurityReferenceFactory;
pub use security::{SecurityReference, SecurityType};
