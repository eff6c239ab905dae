//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every account is cooling down, over quota, pacing or suspended.
    /// Carries a JSON summary of the pool.
    #[error("no available account: {0}")]
    NoAvailableAccount(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
