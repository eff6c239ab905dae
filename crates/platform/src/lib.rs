//! Remote platform boundary
//!
//! Defines the `PlatformApi` trait that decouples account sessions from the
//! transport used to reach the social platform. The platform is treated as an
//! opaque request/response surface: every call either yields a typed snapshot
//! or one of the typed `RemoteError` kinds, never a loosely-typed payload.

pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;
pub mod snapshot;

pub use error::{AuthError, RemoteError};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedPlatform;
pub use snapshot::{ContentSnapshot, FollowerSnapshot, MediaKind, ProfileRef, ProfileSnapshot};

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future used by the dyn-compatible traits in this workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque session material returned by a successful login.
///
/// The platform hands this back as a string blob (cookies, device settings,
/// bearer token; the shape is not our concern). It is stored per account and
/// replayed on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

/// Abstraction over the remote platform's call surface.
///
/// One implementation is shared by every account; the session token passed to
/// each call selects which authenticated channel the request rides on.
/// Implementations translate transport failures into `RemoteError`/`AuthError`
/// and never retry.
///
/// Uses `BoxFuture` return types for dyn-compatibility (`Arc<dyn PlatformApi>`).
pub trait PlatformApi: Send + Sync {
    /// Identifier for logging (e.g. "http", "scripted")
    fn id(&self) -> &str;

    /// Full credential login. Returns fresh session material on success.
    fn login<'a>(
        &'a self,
        handle: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<SessionToken, AuthError>>;

    /// Check that previously issued session material is still accepted.
    fn verify_session<'a>(&'a self, session: &'a SessionToken) -> BoxFuture<'a, Result<(), AuthError>>;

    fn profile<'a>(
        &'a self,
        session: &'a SessionToken,
        target: &'a ProfileRef,
    ) -> BoxFuture<'a, Result<ProfileSnapshot, RemoteError>>;

    fn content<'a>(
        &'a self,
        session: &'a SessionToken,
        content_id: &'a str,
    ) -> BoxFuture<'a, Result<ContentSnapshot, RemoteError>>;

    fn top_content_for_tag<'a>(
        &'a self,
        session: &'a SessionToken,
        tag: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>>;

    fn followers<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<FollowerSnapshot>, RemoteError>>;

    fn recent_content<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>>;
}
