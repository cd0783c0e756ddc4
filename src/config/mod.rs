//! Configuration module for the authorization cache.
//!
//! Loads settings from environment variables, reading a `.env` file first
//! when one is present.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::CacheConfig;

/// Default number of attempts for a load that keeps hitting evicted parents.
pub const DEFAULT_LOAD_ATTEMPTS: usize = 3;

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bounds of the entry store.
    pub cache: CacheConfig,

    /// How many times a load is started before giving up.
    pub max_load_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_load_attempts: DEFAULT_LOAD_ATTEMPTS,
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// - `AUTHZ_CACHE_CAPACITY`: max entries (default 10000)
    /// - `AUTHZ_CACHE_TTL_SECS`: time-to-live, unset for none
    /// - `AUTHZ_CACHE_TTI_SECS`: time-to-idle, unset for none
    /// - `AUTHZ_LOAD_ATTEMPTS`: load attempts (default 3)
    ///
    /// Invalid values are logged and replaced by their default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mut cache = CacheConfig::with_capacity(
            positive(&lookup, "AUTHZ_CACHE_CAPACITY").unwrap_or(defaults.cache.max_capacity),
        );
        if let Some(secs) = positive(&lookup, "AUTHZ_CACHE_TTL_SECS") {
            cache = cache.ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = positive(&lookup, "AUTHZ_CACHE_TTI_SECS") {
            cache = cache.tti(Duration::from_secs(secs));
        }

        Self {
            cache,
            max_load_attempts: positive(&lookup, "AUTHZ_LOAD_ATTEMPTS")
                .unwrap_or(defaults.max_load_attempts),
        }
    }
}

/// Parse a strictly positive number, `None` when unset or invalid.
fn positive<T>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}
