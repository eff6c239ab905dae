//! Typed failures at the platform boundary

/// Failure of a single remote call.
///
/// Every platform operation fails with exactly one of these kinds. Callers
/// branch on the variant; the message is for logs only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The account must be re-verified by a human before it can be used again.
    #[error("challenge required: {0}")]
    ChallengeRequired(String),

    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Target is private or otherwise inaccessible to this account.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transient error: {0}")]
    Transient(String),
}

impl RemoteError {
    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::NotFound(_) => "not_found",
            RemoteError::RateLimited(_) => "rate_limited",
            RemoteError::ChallengeRequired(_) => "challenge_required",
            RemoteError::AuthRequired(_) => "auth_required",
            RemoteError::PermissionDenied(_) => "permission_denied",
            RemoteError::Transient(_) => "transient",
        }
    }
}

/// Failure to establish or restore an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    BadCredentials(String),

    #[error("challenge required: {0}")]
    ChallengeRequired(String),

    /// Stored session material was rejected; a full login is needed.
    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("rate limited during login: {0}")]
    RateLimited(String),

    #[error("login failed: {0}")]
    Transient(String),
}

impl From<AuthError> for RemoteError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ChallengeRequired(msg) => RemoteError::ChallengeRequired(msg),
            AuthError::RateLimited(msg) => RemoteError::RateLimited(msg),
            AuthError::Transient(msg) => RemoteError::Transient(msg),
            AuthError::BadCredentials(msg) | AuthError::SessionExpired(msg) => {
                RemoteError::AuthRequired(msg)
            }
        }
    }
}
