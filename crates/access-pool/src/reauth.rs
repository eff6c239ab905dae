//! Background re-authentication of suspended accounts
//!
//! Accounts that lost their session are suspended with `AuthRequired`. This
//! task periodically retries them and returns the ones that log back in to
//! rotation. Challenge-suspended accounts are left alone; they need a human.

use std::sync::Arc;
use std::time::Duration;

use platform::AuthError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pool::{Pool, SuspendReason};

/// Spawn the re-authentication loop. Stops when `cancel` fires.
pub fn spawn_reauth_task(
    pool: Arc<Pool>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; accounts were just authenticated
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("re-authentication task stopped");
                    return;
                }
                _ = ticker.tick() => {
                    reauth_cycle(&pool).await;
                }
            }
        }
    })
}

/// Run one pass over `AuthRequired` accounts. Returns how many were reinstated.
pub async fn reauth_cycle(pool: &Pool) -> usize {
    let mut reinstated = 0;

    for id in pool.suspended(SuspendReason::AuthRequired).await {
        let Some(session) = pool.session(&id) else {
            continue;
        };

        match session.authenticate().await {
            Ok(_) => {
                if let Err(e) = pool.reinstate(&id).await {
                    warn!(account_id = %id, error = %e, "failed to reinstate account");
                    continue;
                }
                info!(account_id = %id, "re-authentication succeeded");
                reinstated += 1;
            }
            Err(AuthError::ChallengeRequired(msg)) => {
                warn!(account_id = %id, error = %msg, "re-authentication hit a challenge");
                if let Err(e) = pool.report_suspended(&id, SuspendReason::Challenge).await {
                    warn!(account_id = %id, error = %e, "failed to record challenge");
                }
            }
            Err(e) => {
                warn!(account_id = %id, error = %e, "re-authentication failed, will retry next cycle");
            }
        }
    }

    reinstated
}
