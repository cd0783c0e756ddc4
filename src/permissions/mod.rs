//! Authorization checks for users on wiki entities.
//!
//! ## Features
//!
//! - Cached access decisions, settled once per (user, entity)
//! - Attachments checked against their document
//! - Targeted invalidation of entities, users, groups and single accesses
//!
//! ## Usage
//!
//! ```rust,ignore
//! let manager = AuthorizationManager::from_settings(
//!     &Settings::from_env(),
//!     store.clone(),
//!     Arc::new(DefaultAuthorizationSettler),
//!     store.clone(),
//!     store.clone(),
//! );
//!
//! if manager.has_access(Right::Edit, Some(&user), &page)? {
//!     // ...
//! }
//!
//! // Rules of the page changed
//! manager.invalidate(&page);
//! ```

mod checker;

pub use checker::AuthorizationManager;
