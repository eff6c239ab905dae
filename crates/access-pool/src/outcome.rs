//! Mapping remote call results onto account health
//!
//! Only some failures say something about the account that made the call.
//! `NotFound` and `PermissionDenied` describe the target (deleted content, a
//! private profile) and count as a healthy round-trip. Rate-limit signals get
//! the dedicated cooldown; challenge and session loss suspend the account.

use platform::RemoteError;
use tracing::warn;

use crate::pool::{Pool, SuspendReason};

/// What a call result means for the account that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    Healthy,
    Failed,
    RateLimited,
    Suspend(SuspendReason),
}

/// Classify a remote error by its effect on the calling account.
pub fn classify(err: &RemoteError) -> AccountOutcome {
    match err {
        RemoteError::NotFound(_) | RemoteError::PermissionDenied(_) => AccountOutcome::Healthy,
        RemoteError::RateLimited(_) => AccountOutcome::RateLimited,
        RemoteError::ChallengeRequired(_) => AccountOutcome::Suspend(SuspendReason::Challenge),
        RemoteError::AuthRequired(_) => AccountOutcome::Suspend(SuspendReason::AuthRequired),
        RemoteError::Transient(_) => AccountOutcome::Failed,
    }
}

pub fn classify_result<T>(result: &Result<T, RemoteError>) -> AccountOutcome {
    match result {
        Ok(_) => AccountOutcome::Healthy,
        Err(e) => classify(e),
    }
}

/// Feed a call result back into the pool for `account_id`.
///
/// Returns the outcome so callers can log it alongside their own context.
pub async fn report_outcome<T>(
    pool: &Pool,
    account_id: &str,
    result: &Result<T, RemoteError>,
) -> AccountOutcome {
    let outcome = classify_result(result);
    let reported = match outcome {
        AccountOutcome::Healthy => pool.report_success(account_id).await,
        AccountOutcome::Failed => pool.report_error(account_id).await,
        AccountOutcome::RateLimited => pool.report_rate_limited(account_id).await,
        AccountOutcome::Suspend(reason) => pool.report_suspended(account_id, reason).await,
    };
    if let Err(e) = reported {
        warn!(account_id, error = %e, "failed to report call outcome");
    }
    outcome
}
