//! Authenticated account channels
//!
//! An `AccountSession` is one credentialed identity's connection to the
//! platform. Sessions are restored from the on-disk `SessionStore` when
//! possible and only fall back to a full credential login when the platform
//! rejects the stored material.
//!
//! Flow:
//! 1. `SessionStore::load()` reads persisted session tokens
//! 2. `AccountSession::authenticate()` verifies or re-creates the session
//! 3. New session tokens are saved via `SessionStore::save()`
//! 4. Typed calls go through the shared `PlatformApi` (usually `HttpPlatform`)

pub mod error;
pub mod http;
pub mod session;
pub mod store;

pub use error::{Error, Result};
pub use http::{HttpPlatform, classify_response};
pub use session::{AccountSession, Ready};
pub use store::{SessionStore, StoredSession};
