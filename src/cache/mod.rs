//! Cache module - the security cache and its Moka-backed store.
//!
//! ## Architecture
//!
//! - `SecurityCache` - rule, shadow and access entries with parent checks,
//!   conflict detection and cascading removal
//! - `EntryStore` - bounded, thread-safe index keyed by derived strings
//! - `CacheConfig` - capacity and expiry of the store
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = DefaultSecurityCache::new(&CacheConfig::with_capacity(5_000));
//!
//! cache.add_rule_entry(Arc::new(RuleEntry::empty(main_wiki)))?;
//! let entry = cache.get(&main_wiki);
//! ```

mod config;
mod entry;
pub mod key;
mod node;
mod security_cache;
mod store;

pub use config::CacheConfig;
pub use entry::{AccessEntry, CacheEntry, RuleEntry, ShadowEntry};
pub use security_cache::{DefaultSecurityCache, SecurityCache};
