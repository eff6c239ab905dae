//! Crawl pacing, lease deferral and cancellation points
//!
//! Every delay in a crawl goes through `pause`, which doubles as the
//! cooperative cancellation point between units of work.

use std::time::Duration;

use access_pool::{LeasedSession, Pool};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// Delays inserted between units of crawl work.
///
/// These are independent of the pool's per-account interval: they keep a
/// single crawl from bursting even when several accounts are free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Between profile fetches within one tag.
    pub candidate: Duration,
    /// Between tags within one category.
    pub tag: Duration,
    /// Between categories within a full run.
    pub category: Duration,
    /// Between entities during a staleness refresh.
    pub entity: Duration,
    /// Between content checks in a monitoring batch.
    pub check: Duration,
    /// Wait before retrying `acquire()` when no account is available.
    pub acquire_retry: Duration,
    /// Total `acquire()` attempts before giving up on a step.
    pub acquire_attempts: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            candidate: Duration::from_secs(3),
            tag: Duration::from_secs(10),
            category: Duration::from_secs(30),
            entity: Duration::from_secs(3),
            check: Duration::from_secs(2),
            acquire_retry: Duration::from_secs(30),
            acquire_attempts: 3,
        }
    }
}

/// Sleep for `delay` unless cancelled first.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(DiscoveryError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DiscoveryError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Fail with `Cancelled` if cancellation was requested.
pub fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(DiscoveryError::Cancelled)
    } else {
        Ok(())
    }
}

/// Lease an account, deferring and retrying while the pool is exhausted.
///
/// The pool never blocks callers; this is where a crawl chooses to wait.
/// After `acquire_attempts` failures the pool error is returned.
pub async fn acquire_lease(
    pool: &Pool,
    pacing: &Pacing,
    cancel: &CancellationToken,
) -> Result<LeasedSession> {
    let attempts = pacing.acquire_attempts.max(1);
    let mut attempt = 1;
    loop {
        checkpoint(cancel)?;
        match pool.acquire().await {
            Ok(lease) => return Ok(lease),
            Err(e @ access_pool::Error::NoAvailableAccount(_)) if attempt < attempts => {
                debug!(
                    attempt,
                    retry_in_secs = pacing.acquire_retry.as_secs(),
                    error = %e,
                    "no account available, deferring"
                );
                pause(pacing.acquire_retry, cancel).await?;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
