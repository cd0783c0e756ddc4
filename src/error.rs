//! Error types for the authorization cache.

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthorizationError>;

/// Errors raised while populating or querying the authorization cache.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// A required parent, group or user entry is not in the cache.
    ///
    /// Raised during a load, this means the reference chain went stale
    /// under a concurrent removal; the whole load should be retried.
    #[error("Parent entry evicted: {0}")]
    ParentEvicted(String),

    /// A different entry is already cached under the same key.
    #[error("Conflicting insertion for key {0}")]
    ConflictingInsertion(String),

    /// The entry does not fit the operation it was passed to.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A rule reader, group resolver, settler or bridge failed.
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// Loading kept observing evicted parents.
    #[error("Gave up loading access of {user} on {entity} after {attempts} attempts")]
    RetriesExhausted {
        /// The user whose access was being loaded.
        user: String,
        /// The entity whose access was being loaded.
        entity: String,
        /// How many loads were attempted.
        attempts: usize,
        /// The error observed by the last attempt.
        #[source]
        last: Box<AuthorizationError>,
    },
}

impl AuthorizationError {
    pub(crate) fn parent_evicted(what: impl std::fmt::Display) -> Self {
        Self::ParentEvicted(what.to_string())
    }

    /// Whether a fresh load could succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ParentEvicted(_))
    }
}
