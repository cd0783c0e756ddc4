//! Hierarchical cache of authorization decisions for a farm of wikis.
//!
//! Rules attached to wikis, spaces and documents are cached in a tree that
//! mirrors the security hierarchy, together with user and group entries and
//! the decisions settled from them. Removing any entry removes everything
//! that was derived from it.
//!
//! ```rust,ignore
//! let store = Arc::new(MemoryRuleStore::new(EntityReference::wiki("xwiki")));
//! let manager = AuthorizationManager::from_settings(
//!     &Settings::from_env(),
//!     store.clone(),
//!     Arc::new(DefaultAuthorizationSettler),
//!     store.clone(),
//!     store.clone(),
//! );
//!
//! let allowed = manager.has_access(Right::View, Some(&user), &page)?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod memory;
pub mod permissions;
pub mod reference;
pub mod rules;

pub use cache::{CacheConfig, DefaultSecurityCache, SecurityCache};
pub use config::Settings;
pub use error::{AuthorizationError, Result};
pub use loader::CacheLoader;
pub use permissions::AuthorizationManager;
pub use reference::{EntityReference, SecurityReference, SecurityReferenceFactory};
pub use rules::{Access, Right};

/// Route `tracing` output of a test run to the test writer.
///
/// If RUST_LOG is not set, default to "debug" level for this crate.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wiki_authz_cache=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
