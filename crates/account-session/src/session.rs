//! One authenticated channel to the platform

use std::sync::Arc;

use common::Secret;
use platform::{
    AuthError, ContentSnapshot, FollowerSnapshot, PlatformApi, ProfileRef, ProfileSnapshot,
    RemoteError, SessionToken,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::store::SessionStore;

/// How an account became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    /// A previously stored session was accepted by the platform.
    Restored,
    /// A full credential login was performed.
    LoggedIn,
}

/// A single account's channel to the platform.
///
/// Exposes raw typed calls and nothing else. There are no retries here: every
/// failure is returned to the caller as a `RemoteError`, and the pool or the
/// orchestrators decide what to do with it.
pub struct AccountSession {
    handle: String,
    password: Secret<String>,
    api: Arc<dyn PlatformApi>,
    store: Arc<SessionStore>,
    token: RwLock<Option<SessionToken>>,
}

impl AccountSession {
    pub fn new(
        handle: impl Into<String>,
        password: Secret<String>,
        api: Arc<dyn PlatformApi>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            handle: handle.into(),
            password,
            api,
            store,
            token: RwLock::new(None),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Drop the in-memory session so the next call reports `AuthRequired`.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// Make the account ready for use.
    ///
    /// Tries the stored session first and verifies it with the platform. If
    /// there is none, or the platform rejects it, falls back to a full
    /// credential login and persists the new session. A failure to persist is
    /// logged but does not fail authentication.
    pub async fn authenticate(&self) -> Result<Ready, AuthError> {
        if let Some(stored) = self.store.get(&self.handle).await {
            let token = stored.token();
            match self.api.verify_session(&token).await {
                Ok(()) => {
                    info!(account_id = %self.handle, "restored stored session");
                    *self.token.write().await = Some(token);
                    return Ok(Ready::Restored);
                }
                Err(AuthError::SessionExpired(reason)) => {
                    debug!(account_id = %self.handle, reason = %reason, "stored session rejected, logging in");
                    if let Err(e) = self.store.remove(&self.handle).await {
                        warn!(account_id = %self.handle, error = %e, "failed to drop rejected session");
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let token = self
            .api
            .login(&self.handle, self.password.expose())
            .await?;
        info!(account_id = %self.handle, platform = self.api.id(), "logged in");

        if let Err(e) = self.store.save(&self.handle, &token).await {
            warn!(account_id = %self.handle, error = %e, "failed to persist session");
        }
        *self.token.write().await = Some(token);
        Ok(Ready::LoggedIn)
    }

    async fn session(&self) -> Result<SessionToken, RemoteError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| RemoteError::AuthRequired(format!("{} is not authenticated", self.handle)))
    }

    pub async fn lookup_profile(&self, target: &ProfileRef) -> Result<ProfileSnapshot, RemoteError> {
        let session = self.session().await?;
        self.api.profile(&session, target).await
    }

    pub async fn lookup_content(&self, content_id: &str) -> Result<ContentSnapshot, RemoteError> {
        let session = self.session().await?;
        self.api.content(&session, content_id).await
    }

    pub async fn list_top_content_for_tag(
        &self,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<ContentSnapshot>, RemoteError> {
        let session = self.session().await?;
        self.api.top_content_for_tag(&session, tag, limit).await
    }

    pub async fn sample_followers(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FollowerSnapshot>, RemoteError> {
        let session = self.session().await?;
        self.api.followers(&session, user_id, limit).await
    }

    /// Most recent content published by `user_id`, newest first.
    pub async fn recent_content(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentSnapshot>, RemoteError> {
        let session = self.session().await?;
        self.api.recent_content(&session, user_id, limit).await
    }
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("handle", &self.handle)
            .field("platform", &self.api.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::ScriptedPlatform;

    async fn setup(dir: &tempfile::TempDir) -> (Arc<ScriptedPlatform>, Arc<SessionStore>) {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.add_account("crawler_01", "hunter2");
        let store = Arc::new(
            SessionStore::load(dir.path().join("sessions.json"))
                .await
                .unwrap(),
        );
        (platform, store)
    }

    fn session(platform: &Arc<ScriptedPlatform>, store: &Arc<SessionStore>, pw: &str) -> AccountSession {
        AccountSession::new(
            "crawler_01",
            Secret::new(pw.to_string()),
            platform.clone(),
            store.clone(),
        )
    }

    #[tokio::test]
    async fn cold_start_logs_in_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        let account = session(&platform, &store, "hunter2");

        assert_eq!(account.authenticate().await.unwrap(), Ready::LoggedIn);
        assert!(account.is_authenticated().await);
        assert_eq!(platform.calls("login"), 1);
        assert!(store.get("crawler_01").await.is_some());
    }

    #[tokio::test]
    async fn stored_session_is_restored_without_login() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        store
            .save("crawler_01", &SessionToken::new("kept-session"))
            .await
            .unwrap();
        platform.accept_session("kept-session");

        let account = session(&platform, &store, "hunter2");
        assert_eq!(account.authenticate().await.unwrap(), Ready::Restored);
        assert_eq!(platform.calls("verify_session"), 1);
        assert_eq!(platform.calls("login"), 0);
    }

    #[tokio::test]
    async fn rejected_session_falls_back_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        store
            .save("crawler_01", &SessionToken::new("expired-session"))
            .await
            .unwrap();

        let account = session(&platform, &store, "hunter2");
        assert_eq!(account.authenticate().await.unwrap(), Ready::LoggedIn);
        assert_eq!(platform.calls("login"), 1);
        let stored = store.get("crawler_01").await.unwrap();
        assert_ne!(stored.session, "expired-session");
    }

    #[tokio::test]
    async fn challenge_during_login_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        platform.fail_login("crawler_01", AuthError::ChallengeRequired("verify email".into()));

        let account = session(&platform, &store, "hunter2");
        let result = account.authenticate().await;
        assert!(matches!(result, Err(AuthError::ChallengeRequired(_))));
        assert!(!account.is_authenticated().await);
    }

    #[tokio::test]
    async fn calls_before_authentication_need_auth() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        let account = session(&platform, &store, "hunter2");

        let result = account.lookup_content("123").await;
        assert!(matches!(result, Err(RemoteError::AuthRequired(_))));
        assert_eq!(platform.calls("content"), 0);
    }

    #[tokio::test]
    async fn remote_errors_pass_through_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        platform.fail_content("123", RemoteError::PermissionDenied("private".into()));

        let account = session(&platform, &store, "hunter2");
        account.authenticate().await.unwrap();

        let result = account.lookup_content("123").await;
        assert_eq!(result, Err(RemoteError::PermissionDenied("private".into())));
        // No retry
        assert_eq!(platform.calls("content"), 1);
    }

    #[tokio::test]
    async fn invalidate_drops_session() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, store) = setup(&dir).await;
        let account = session(&platform, &store, "hunter2");
        account.authenticate().await.unwrap();

        account.invalidate().await;
        assert!(!account.is_authenticated().await);
        assert!(matches!(
            account.list_top_content_for_tag("travel", 10).await,
            Err(RemoteError::AuthRequired(_))
        ));
    }
}
