//! Session token storage
//!
//! Manages a JSON file mapping account handles to the session material the
//! platform issued at login. Reusing a stored session avoids a full credential
//! login on every process start, which the platform treats as suspicious. All
//! writes go through `common::fs::write_json_atomic`; a tokio Mutex serializes
//! concurrent writers (startup authentication and the re-authentication task).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use platform::SessionToken;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A persisted session for one account.
///
/// `saved_at` is a unix timestamp in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: String,
    pub saved_at: u64,
}

impl StoredSession {
    pub fn token(&self) -> SessionToken {
        SessionToken::new(self.session.clone())
    }

    fn age(&self, now_millis: u64) -> Duration {
        Duration::from_millis(now_millis.saturating_sub(self.saved_at))
    }
}

/// Thread-safe session file manager.
pub struct SessionStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredSession>>,
}

impl SessionStore {
    /// Load sessions from the given file path.
    ///
    /// A missing file is a cold start: the store begins empty and every
    /// account performs a full login on first use.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = match common::fs::read_json::<HashMap<String, StoredSession>>(&path).await? {
            Some(sessions) => {
                info!(path = %path.display(), sessions = sessions.len(), "loaded sessions");
                sessions
            }
            None => {
                info!(path = %path.display(), "session file not found, starting with empty store");
                HashMap::new()
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub async fn get(&self, handle: &str) -> Option<StoredSession> {
        self.state.lock().await.get(handle).cloned()
    }

    /// Store session material for `handle` and persist to disk.
    pub async fn save(&self, handle: &str, token: &SessionToken) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(
            handle.to_string(),
            StoredSession {
                session: token.as_str().to_string(),
                saved_at: now_millis(),
            },
        );
        debug!(account_id = handle, "saved session");
        common::fs::write_json_atomic(&self.path, &*state).await?;
        Ok(())
    }

    /// Drop the stored session for `handle` (e.g. after the platform rejected it).
    pub async fn remove(&self, handle: &str) -> Result<Option<StoredSession>> {
        let mut state = self.state.lock().await;
        let removed = state.remove(handle);
        if removed.is_some() {
            debug!(account_id = handle, "removed session");
            common::fs::write_json_atomic(&self.path, &*state).await?;
        }
        Ok(removed)
    }

    /// Whether a stored session exists and is younger than `max_age`.
    pub async fn is_fresh(&self, handle: &str, max_age: Duration) -> bool {
        let now = now_millis();
        self.state
            .lock()
            .await
            .get(handle)
            .is_some_and(|s| s.age(now) < max_age)
    }

    /// Age of the stored session for `handle`.
    pub async fn age(&self, handle: &str) -> Result<Duration> {
        let now = now_millis();
        self.state
            .lock()
            .await
            .get(handle)
            .map(|s| s.age(now))
            .ok_or_else(|| Error::NotFound(handle.to_string()))
    }

    /// Remove every session older than `max_age`. Returns how many were dropped.
    pub async fn prune_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = now_millis();
        let mut state = self.state.lock().await;
        let before = state.len();
        state.retain(|_, s| s.age(now) < max_age);
        let pruned = before - state.len();
        if pruned > 0 {
            info!(pruned, "pruned stale sessions");
            common::fs::write_json_atomic(&self.path, &*state).await?;
        }
        Ok(pruned)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
