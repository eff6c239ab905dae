//! Fixtures shared by the service's unit tests

use std::sync::Arc;

use access_pool::{Pool, RatePolicy};
use account_session::{AccountSession, SessionStore};
use common::Secret;
use platform::ScriptedPlatform;

/// Authenticated pool over a scripted platform with one account per id.
pub(crate) async fn scripted_pool(
    dir: &tempfile::TempDir,
    ids: &[&str],
    policy: RatePolicy,
) -> (Arc<ScriptedPlatform>, Arc<Pool>) {
    let platform = Arc::new(ScriptedPlatform::new());
    let store = Arc::new(
        SessionStore::load(dir.path().join("sessions.json"))
            .await
            .unwrap(),
    );
    let sessions = ids
        .iter()
        .map(|id| {
            platform.add_account(id, "pw");
            Arc::new(AccountSession::new(
                *id,
                Secret::new("pw".to_string()),
                platform.clone(),
                store.clone(),
            ))
        })
        .collect();
    let pool = Arc::new(Pool::new(sessions, policy));
    assert_eq!(pool.authenticate_all().await, ids.len());
    (platform, pool)
}
