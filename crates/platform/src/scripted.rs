//! In-memory platform for tests
//!
//! `ScriptedPlatform` answers every call from tables populated up front and
//! records each call it receives, so callers can assert how many remote
//! round-trips a workflow made. Forced failures can be scripted per target.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{AuthError, RemoteError};
use crate::snapshot::{ContentSnapshot, FollowerSnapshot, ProfileRef, ProfileSnapshot};
use crate::{BoxFuture, PlatformApi, SessionToken};

#[derive(Default)]
struct Tables {
    passwords: HashMap<String, String>,
    login_failures: HashMap<String, AuthError>,
    issued: HashSet<String>,
    next_session: u64,
    profiles: HashMap<String, ProfileSnapshot>,
    handles: HashMap<String, String>,
    profile_failures: HashMap<ProfileRef, RemoteError>,
    contents: HashMap<String, ContentSnapshot>,
    content_failures: HashMap<String, RemoteError>,
    feeds: HashMap<String, Vec<ContentSnapshot>>,
    feed_failures: HashMap<String, RemoteError>,
    recent: HashMap<String, Vec<ContentSnapshot>>,
    followers: HashMap<String, Vec<FollowerSnapshot>>,
    calls: Vec<(String, String)>,
}

/// Table-driven `PlatformApi` implementation.
#[derive(Default)]
pub struct ScriptedPlatform {
    tables: Mutex<Tables>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }

    /// Register an account that can log in with `password`.
    pub fn add_account(&self, handle: &str, password: &str) {
        self.with_tables(|t| {
            t.passwords.insert(handle.to_string(), password.to_string());
        });
    }

    /// Make every login attempt for `handle` fail with `err`.
    pub fn fail_login(&self, handle: &str, err: AuthError) {
        self.with_tables(|t| {
            t.login_failures.insert(handle.to_string(), err);
        });
    }

    /// Forget all issued sessions, as if the platform expired them.
    pub fn expire_sessions(&self) {
        self.with_tables(|t| t.issued.clear());
    }

    /// Accept `token` as a valid session without a login.
    pub fn accept_session(&self, token: &str) {
        self.with_tables(|t| {
            t.issued.insert(token.to_string());
        });
    }

    pub fn add_profile(&self, profile: ProfileSnapshot) {
        self.with_tables(|t| {
            t.handles
                .insert(profile.handle.to_lowercase(), profile.external_id.clone());
            t.profiles.insert(profile.external_id.clone(), profile);
        });
    }

    pub fn fail_profile(&self, target: ProfileRef, err: RemoteError) {
        self.with_tables(|t| {
            t.profile_failures.insert(target, err);
        });
    }

    pub fn add_content(&self, content: ContentSnapshot) {
        self.with_tables(|t| {
            t.content_failures.remove(&content.id);
            t.contents.insert(content.id.clone(), content);
        });
    }

    pub fn fail_content(&self, content_id: &str, err: RemoteError) {
        self.with_tables(|t| {
            t.content_failures.insert(content_id.to_string(), err);
        });
    }

    pub fn set_feed(&self, tag: &str, items: Vec<ContentSnapshot>) {
        self.with_tables(|t| {
            t.feeds.insert(tag.to_string(), items);
        });
    }

    pub fn fail_feed(&self, tag: &str, err: RemoteError) {
        self.with_tables(|t| {
            t.feed_failures.insert(tag.to_string(), err);
        });
    }

    pub fn set_recent(&self, user_id: &str, items: Vec<ContentSnapshot>) {
        self.with_tables(|t| {
            t.recent.insert(user_id.to_string(), items);
        });
    }

    pub fn set_followers(&self, user_id: &str, items: Vec<FollowerSnapshot>) {
        self.with_tables(|t| {
            t.followers.insert(user_id.to_string(), items);
        });
    }

    /// Number of calls made to operation `op` (e.g. "profile", "login").
    pub fn calls(&self, op: &str) -> usize {
        self.with_tables(|t| t.calls.iter().filter(|(o, _)| o == op).count())
    }

    /// Number of calls made to operation `op` with argument `arg`.
    pub fn calls_with(&self, op: &str, arg: &str) -> usize {
        self.with_tables(|t| {
            t.calls
                .iter()
                .filter(|(o, a)| o == op && a == arg)
                .count()
        })
    }

    /// Arguments of every call to `op`, in call order.
    pub fn call_args(&self, op: &str) -> Vec<String> {
        self.with_tables(|t| {
            t.calls
                .iter()
                .filter(|(o, _)| o == op)
                .map(|(_, a)| a.clone())
                .collect()
        })
    }

    fn record(&self, op: &str, arg: impl Into<String>) {
        let arg = arg.into();
        self.with_tables(|t| t.calls.push((op.to_string(), arg)));
    }

    fn check_session(&self, session: &SessionToken) -> Result<(), RemoteError> {
        self.with_tables(|t| {
            if t.issued.contains(session.as_str()) {
                Ok(())
            } else {
                Err(RemoteError::AuthRequired("session not recognized".into()))
            }
        })
    }
}

impl PlatformApi for ScriptedPlatform {
    fn id(&self) -> &str {
        "scripted"
    }

    fn login<'a>(
        &'a self,
        handle: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<SessionToken, AuthError>> {
        Box::pin(async move {
            self.record("login", handle);
            self.with_tables(|t| {
                if let Some(err) = t.login_failures.get(handle) {
                    return Err(err.clone());
                }
                match t.passwords.get(handle) {
                    Some(expected) if expected == password => {
                        t.next_session += 1;
                        let token = format!("session-{handle}-{}", t.next_session);
                        t.issued.insert(token.clone());
                        Ok(SessionToken::new(token))
                    }
                    _ => Err(AuthError::BadCredentials(format!("bad password for {handle}"))),
                }
            })
        })
    }

    fn verify_session<'a>(&'a self, session: &'a SessionToken) -> BoxFuture<'a, Result<(), AuthError>> {
        Box::pin(async move {
            self.record("verify_session", session.as_str());
            self.check_session(session)
                .map_err(|_| AuthError::SessionExpired("session not recognized".into()))
        })
    }

    fn profile<'a>(
        &'a self,
        session: &'a SessionToken,
        target: &'a ProfileRef,
    ) -> BoxFuture<'a, Result<ProfileSnapshot, RemoteError>> {
        Box::pin(async move {
            self.record("profile", target.to_string());
            self.check_session(session)?;
            self.with_tables(|t| {
                if let Some(err) = t.profile_failures.get(target) {
                    return Err(err.clone());
                }
                let id = match target {
                    ProfileRef::Id(id) => Some(id.clone()),
                    ProfileRef::Handle(handle) => t.handles.get(&handle.to_lowercase()).cloned(),
                };
                id.and_then(|id| t.profiles.get(&id).cloned())
                    .ok_or_else(|| RemoteError::NotFound(format!("profile {target}")))
            })
        })
    }

    fn content<'a>(
        &'a self,
        session: &'a SessionToken,
        content_id: &'a str,
    ) -> BoxFuture<'a, Result<ContentSnapshot, RemoteError>> {
        Box::pin(async move {
            self.record("content", content_id);
            self.check_session(session)?;
            self.with_tables(|t| {
                if let Some(err) = t.content_failures.get(content_id) {
                    return Err(err.clone());
                }
                t.contents
                    .get(content_id)
                    .cloned()
                    .ok_or_else(|| RemoteError::NotFound(format!("content {content_id}")))
            })
        })
    }

    fn top_content_for_tag<'a>(
        &'a self,
        session: &'a SessionToken,
        tag: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>> {
        Box::pin(async move {
            self.record("top_content_for_tag", tag);
            self.check_session(session)?;
            self.with_tables(|t| {
                if let Some(err) = t.feed_failures.get(tag) {
                    return Err(err.clone());
                }
                Ok(t.feeds
                    .get(tag)
                    .map(|items| items.iter().take(limit).cloned().collect())
                    .unwrap_or_default())
            })
        })
    }

    fn followers<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<FollowerSnapshot>, RemoteError>> {
        Box::pin(async move {
            self.record("followers", user_id);
            self.check_session(session)?;
            self.with_tables(|t| {
                Ok(t.followers
                    .get(user_id)
                    .map(|items| items.iter().take(limit).cloned().collect())
                    .unwrap_or_default())
            })
        })
    }

    fn recent_content<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>> {
        Box::pin(async move {
            self.record("recent_content", user_id);
            self.check_session(session)?;
            self.with_tables(|t| {
                Ok(t.recent
                    .get(user_id)
                    .map(|items| items.iter().take(limit).cloned().collect())
                    .unwrap_or_default())
            })
        })
    }
}
