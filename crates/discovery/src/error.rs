//! Error types for crawl orchestration

use platform::RemoteError;

use crate::content_ref::ContentRefError;

/// Failure of a catalog call.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("entity already exists: {0}")]
    Conflict(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Errors that end a unit of crawl work.
///
/// `Remote` and `ContentRef` only end the unit they occurred in (one tag,
/// one metrics read).
/// The other variants abort the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Pool(#[from] access_pool::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{target}: {source}")]
    Remote {
        target: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    ContentRef(#[from] ContentRefError),

    #[error("cancelled")]
    Cancelled,
}

impl DiscoveryError {
    /// Whether this error must stop the enclosing batch.
    pub fn is_abort(&self) -> bool {
        !matches!(
            self,
            DiscoveryError::Remote { .. } | DiscoveryError::ContentRef(_)
        )
    }
}

/// Result alias for orchestration operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
