//! Process-wide rate and cooldown policy

use std::time::Duration;

/// Length of the per-account quota window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// Limits the pool enforces for every account. Read-only after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    /// Minimum spacing between two leases of the same account.
    pub min_interval: Duration,
    /// Leases allowed per account per `QUOTA_WINDOW`.
    pub daily_quota: u64,
    /// Consecutive errors that put an account into cooldown.
    pub error_threshold: u32,
    pub error_cooldown: Duration,
    /// Cooldown forced by a rate-limit signal, independent of the error counter.
    pub rate_limit_cooldown: Duration,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(2),
            daily_quota: 1000,
            error_threshold: 3,
            error_cooldown: Duration::from_secs(300),
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}
