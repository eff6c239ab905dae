//! Error types for session persistence

/// Errors from the on-disk session store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session file error: {0}")]
    Store(#[from] common::Error),

    #[error("session not found: {0}")]
    NotFound(String),
}

/// Result alias for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
