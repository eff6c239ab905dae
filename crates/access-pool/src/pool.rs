//! Account table and round-robin lease selection
//!
//! The pool owns one record per configured account and is the only place
//! those records are mutated. All bookkeeping lives behind a single tokio
//! Mutex: `acquire()` checks availability and records the lease inside the
//! same critical section, so two concurrent callers can never both pass the
//! availability check for an account that only has one lease left.
//!
//! An account is available when it is not suspended, not cooling down, under
//! its daily quota, and its minimum interval has elapsed since the last lease.
//! Availability is derived from the record on every read, never cached.
//!
//! Cooldowns heal themselves: once the cooldown instant has passed, the next
//! touch of the record clears the cooldown and the consecutive-error counter.
//! Suspensions do not heal; they are lifted by `reinstate()`.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use account_session::AccountSession;
use platform::AuthError;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::policy::{QUOTA_WINDOW, RatePolicy};

/// Why an account is cooling down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownReason {
    Errors,
    RateLimited,
}

impl CooldownReason {
    pub fn label(&self) -> &'static str {
        match self {
            CooldownReason::Errors => "errors",
            CooldownReason::RateLimited => "rate_limited",
        }
    }
}

/// Why an account is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    /// Needs manual verification by an operator.
    Challenge,
    /// Session lost; the re-authentication task may recover it.
    AuthRequired,
}

impl SuspendReason {
    pub fn label(&self) -> &'static str {
        match self {
            SuspendReason::Challenge => "challenge",
            SuspendReason::AuthRequired => "auth_required",
        }
    }
}

/// Derived state of an account at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Available,
    /// Leased too recently; available again once the minimum interval passes.
    Pacing,
    CoolingDown,
    QuotaExhausted,
    Suspended,
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    until: Instant,
    reason: CooldownReason,
}

#[derive(Debug)]
struct AccountRecord {
    id: String,
    last_request: Option<Instant>,
    total_requests: u64,
    daily_requests: u64,
    window_started: Instant,
    consecutive_errors: u32,
    cooldown: Option<Cooldown>,
    suspended: Option<SuspendReason>,
}

impl AccountRecord {
    fn new(id: String, now: Instant) -> Self {
        Self {
            id,
            last_request: None,
            total_requests: 0,
            daily_requests: 0,
            window_started: now,
            consecutive_errors: 0,
            cooldown: None,
            suspended: None,
        }
    }

    /// Apply time-based transitions: expired cooldowns and quota windows.
    fn heal(&mut self, now: Instant) {
        if let Some(cooldown) = self.cooldown
            && now >= cooldown.until
        {
            info!(
                account_id = %self.id,
                reason = cooldown.reason.label(),
                "cooldown expired, account available again"
            );
            self.cooldown = None;
            self.consecutive_errors = 0;
        }
        if now.duration_since(self.window_started) >= QUOTA_WINDOW {
            debug!(account_id = %self.id, used = self.daily_requests, "daily quota window reset");
            self.daily_requests = 0;
            self.window_started = now;
        }
    }

    fn active_cooldown(&self, now: Instant) -> Option<Cooldown> {
        self.cooldown.filter(|c| c.until > now)
    }

    fn daily_used(&self, now: Instant) -> u64 {
        if now.duration_since(self.window_started) >= QUOTA_WINDOW {
            0
        } else {
            self.daily_requests
        }
    }

    /// Derived state and, when not available, how long until it could be.
    fn state(&self, now: Instant, policy: &RatePolicy) -> (AccountState, Option<Duration>) {
        if self.suspended.is_some() {
            return (AccountState::Suspended, None);
        }
        if let Some(cooldown) = self.active_cooldown(now) {
            return (AccountState::CoolingDown, Some(cooldown.until - now));
        }
        if self.daily_used(now) >= policy.daily_quota {
            let reset = (self.window_started + QUOTA_WINDOW).saturating_duration_since(now);
            return (AccountState::QuotaExhausted, Some(reset));
        }
        if let Some(last) = self.last_request {
            let ready_at = last + policy.min_interval;
            if ready_at > now {
                return (AccountState::Pacing, Some(ready_at - now));
            }
        }
        (AccountState::Available, None)
    }

    fn record_lease(&mut self, now: Instant) {
        self.last_request = Some(now);
        self.total_requests += 1;
        self.daily_requests += 1;
    }

    fn status(&self, now: Instant, policy: &RatePolicy) -> AccountStatus {
        let (state, wait) = self.state(now, policy);
        let cooldown = self.active_cooldown(now);
        AccountStatus {
            id: self.id.clone(),
            state,
            available: state == AccountState::Available,
            total_requests: self.total_requests,
            daily_requests: self.daily_used(now),
            daily_quota: policy.daily_quota,
            consecutive_errors: self.consecutive_errors,
            cooldown_reason: cooldown.map(|c| c.reason),
            cooldown_remaining_secs: cooldown.map(|c| (c.until - now).as_secs()),
            suspended: self.suspended,
            next_available_in_ms: wait.map(|w| w.as_millis() as u64),
        }
    }
}

/// Observable snapshot of one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatus {
    pub id: String,
    pub state: AccountState,
    pub available: bool,
    pub total_requests: u64,
    pub daily_requests: u64,
    pub daily_quota: u64,
    pub consecutive_errors: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_reason: Option<CooldownReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<SuspendReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available_in_ms: Option<u64>,
}

/// Observable snapshot of the whole pool.
///
/// `health` is "healthy" when every account is usable (available or merely
/// pacing), "degraded" when some are, and "unhealthy" when none are.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub health: &'static str,
    pub accounts_total: usize,
    pub accounts_available: usize,
    pub accounts_pacing: usize,
    pub accounts_cooling_down: usize,
    pub accounts_quota_exhausted: usize,
    pub accounts_suspended: usize,
    pub accounts: Vec<AccountStatus>,
}

impl PoolStatus {
    fn from_accounts(accounts: Vec<AccountStatus>) -> Self {
        let count = |state: AccountState| accounts.iter().filter(|a| a.state == state).count();
        let total = accounts.len();
        let available = count(AccountState::Available);
        let pacing = count(AccountState::Pacing);
        let usable = available + pacing;
        let health = if usable == total && total > 0 {
            "healthy"
        } else if usable > 0 {
            "degraded"
        } else {
            "unhealthy"
        };
        Self {
            health,
            accounts_total: total,
            accounts_available: available,
            accounts_pacing: pacing,
            accounts_cooling_down: count(AccountState::CoolingDown),
            accounts_quota_exhausted: count(AccountState::QuotaExhausted),
            accounts_suspended: count(AccountState::Suspended),
            accounts,
        }
    }

    /// Whether at least one account is available or will be once pacing ends.
    pub fn is_usable(&self) -> bool {
        self.accounts_available + self.accounts_pacing > 0
    }

    /// Shortest wait until some account could be leased, if any ever can.
    pub fn next_available_in(&self) -> Option<Duration> {
        self.accounts
            .iter()
            .filter_map(|a| {
                if a.available {
                    Some(0)
                } else {
                    a.next_available_in_ms
                }
            })
            .min()
            .map(Duration::from_millis)
    }
}

/// A session leased from the pool for one remote call.
///
/// Derefs to the underlying `AccountSession`. Report the call's outcome with
/// the lease's `account_id`.
#[derive(Debug, Clone)]
pub struct LeasedSession {
    pub account_id: String,
    session: Arc<AccountSession>,
}

impl LeasedSession {
    pub fn session(&self) -> &Arc<AccountSession> {
        &self.session
    }
}

impl Deref for LeasedSession {
    type Target = AccountSession;

    fn deref(&self) -> &AccountSession {
        &self.session
    }
}

struct PoolState {
    accounts: Vec<AccountRecord>,
    cursor: usize,
}

/// Scheduler multiplexing remote calls across a fixed set of accounts.
pub struct Pool {
    sessions: Vec<Arc<AccountSession>>,
    state: Mutex<PoolState>,
    policy: RatePolicy,
}

impl Pool {
    /// Build a pool over `sessions`, one account each, in configuration order.
    pub fn new(sessions: Vec<Arc<AccountSession>>, policy: RatePolicy) -> Self {
        let now = Instant::now();
        let accounts = sessions
            .iter()
            .map(|s| AccountRecord::new(s.handle().to_string(), now))
            .collect();
        info!(
            accounts = sessions.len(),
            daily_quota = policy.daily_quota,
            min_interval_ms = policy.min_interval.as_millis() as u64,
            "pool initialized"
        );
        Self {
            sessions,
            state: Mutex::new(PoolState {
                accounts,
                cursor: 0,
            }),
            policy,
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.handle().to_string()).collect()
    }

    pub fn session(&self, account_id: &str) -> Option<Arc<AccountSession>> {
        self.sessions
            .iter()
            .find(|s| s.handle() == account_id)
            .cloned()
    }

    fn index_of(&self, account_id: &str) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.handle() == account_id)
            .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))
    }

    /// Authenticate every account once, suspending the ones that fail.
    ///
    /// Returns the number of accounts that are ready for use.
    pub async fn authenticate_all(&self) -> usize {
        let mut ready = 0;
        for session in &self.sessions {
            let id = session.handle();
            let result = match session.authenticate().await {
                Ok(how) => {
                    debug!(account_id = id, ready = ?how, "account ready");
                    ready += 1;
                    Ok(())
                }
                Err(AuthError::ChallengeRequired(msg)) => {
                    error!(account_id = id, error = %msg, "login challenge, operator action required");
                    self.report_suspended(id, SuspendReason::Challenge).await
                }
                Err(e @ (AuthError::BadCredentials(_) | AuthError::SessionExpired(_))) => {
                    warn!(account_id = id, error = %e, "authentication failed");
                    self.report_suspended(id, SuspendReason::AuthRequired).await
                }
                Err(AuthError::RateLimited(msg)) => {
                    warn!(account_id = id, error = %msg, "rate limited during login");
                    self.report_suspended(id, SuspendReason::AuthRequired).await
                }
                Err(AuthError::Transient(msg)) => {
                    warn!(account_id = id, error = %msg, "login failed, will retry later");
                    self.report_suspended(id, SuspendReason::AuthRequired).await
                }
            };
            if let Err(e) = result {
                warn!(account_id = id, error = %e, "failed to record authentication outcome");
            }
        }
        info!(ready, total = self.sessions.len(), "accounts authenticated");
        ready
    }

    /// Lease the next available account.
    ///
    /// Scans at most one full cycle starting at the cursor. The cursor moves
    /// past every examined slot, so consecutive calls rotate through the
    /// accounts instead of restarting at the same position. The lease is
    /// recorded before the lock is released.
    ///
    /// Never blocks waiting for an account: when none is available, returns
    /// `NoAvailableAccount` with a JSON pool summary.
    pub async fn acquire(&self) -> Result<LeasedSession> {
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        let PoolState { accounts, cursor } = &mut *guard;
        let n = accounts.len();

        for _ in 0..n {
            let idx = *cursor % n;
            *cursor = (idx + 1) % n;

            let account = &mut accounts[idx];
            account.heal(now);
            if account.state(now, &self.policy).0 == AccountState::Available {
                account.record_lease(now);
                metrics::counter!("pool_acquire_total", "outcome" => "leased").increment(1);
                debug!(
                    account_id = %account.id,
                    daily_requests = account.daily_requests,
                    "account leased"
                );
                return Ok(LeasedSession {
                    account_id: account.id.clone(),
                    session: self.sessions[idx].clone(),
                });
            }
        }

        metrics::counter!("pool_acquire_total", "outcome" => "exhausted").increment(1);
        let status = Self::snapshot(accounts, now, &self.policy);
        warn!(
            accounts_total = status.accounts_total,
            accounts_cooling_down = status.accounts_cooling_down,
            accounts_suspended = status.accounts_suspended,
            "no available account"
        );
        Err(Error::NoAvailableAccount(exhausted_message(&status)))
    }

    /// Reset the account's consecutive-error counter.
    pub async fn report_success(&self, account_id: &str) -> Result<()> {
        let idx = self.index_of(account_id)?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let account = &mut state.accounts[idx];
        account.heal(now);
        account.consecutive_errors = 0;
        Ok(())
    }

    /// Count a failure; at the threshold the account cools down immediately.
    pub async fn report_error(&self, account_id: &str) -> Result<()> {
        let idx = self.index_of(account_id)?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let account = &mut state.accounts[idx];
        account.heal(now);
        account.consecutive_errors += 1;

        if account.consecutive_errors >= self.policy.error_threshold {
            let until = now + self.policy.error_cooldown;
            if account.cooldown.is_none_or(|c| c.until < until) {
                account.cooldown = Some(Cooldown {
                    until,
                    reason: CooldownReason::Errors,
                });
            }
            metrics::counter!("pool_cooldowns_total", "reason" => "errors").increment(1);
            warn!(
                account_id,
                consecutive_errors = account.consecutive_errors,
                cooldown_secs = self.policy.error_cooldown.as_secs(),
                "error threshold reached, account entering cooldown"
            );
        } else {
            debug!(
                account_id,
                consecutive_errors = account.consecutive_errors,
                "account error recorded"
            );
        }
        Ok(())
    }

    /// Force the dedicated rate-limit cooldown, whatever the error counter says.
    ///
    /// A longer cooldown already in force is kept.
    pub async fn report_rate_limited(&self, account_id: &str) -> Result<()> {
        let idx = self.index_of(account_id)?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let account = &mut state.accounts[idx];
        account.heal(now);

        let until = now + self.policy.rate_limit_cooldown;
        if account.cooldown.is_none_or(|c| c.until < until) {
            account.cooldown = Some(Cooldown {
                until,
                reason: CooldownReason::RateLimited,
            });
        }
        metrics::counter!("pool_cooldowns_total", "reason" => "rate_limited").increment(1);
        info!(
            account_id,
            cooldown_secs = self.policy.rate_limit_cooldown.as_secs(),
            "rate limited, account entering cooldown"
        );
        Ok(())
    }

    /// Take the account out of rotation until `reinstate()`.
    ///
    /// For `AuthRequired` the in-memory session is dropped as well, so the
    /// re-authentication task starts from the stored session or a fresh login.
    pub async fn report_suspended(&self, account_id: &str, reason: SuspendReason) -> Result<()> {
        let idx = self.index_of(account_id)?;
        {
            let mut state = self.state.lock().await;
            state.accounts[idx].suspended = Some(reason);
        }
        metrics::counter!("pool_cooldowns_total", "reason" => reason.label()).increment(1);
        match reason {
            SuspendReason::Challenge => {
                error!(account_id, "account suspended, manual verification required")
            }
            SuspendReason::AuthRequired => {
                warn!(account_id, "account suspended until re-authenticated");
                self.sessions[idx].invalidate().await;
            }
        }
        Ok(())
    }

    /// Return a suspended account to rotation with a clean error counter.
    pub async fn reinstate(&self, account_id: &str) -> Result<()> {
        let idx = self.index_of(account_id)?;
        let mut state = self.state.lock().await;
        let account = &mut state.accounts[idx];
        if let Some(reason) = account.suspended.take() {
            info!(account_id, reason = reason.label(), "account reinstated");
        }
        account.consecutive_errors = 0;
        Ok(())
    }

    /// Accounts currently suspended for `reason`.
    pub async fn suspended(&self, reason: SuspendReason) -> Vec<String> {
        self.state
            .lock()
            .await
            .accounts
            .iter()
            .filter(|a| a.suspended == Some(reason))
            .map(|a| a.id.clone())
            .collect()
    }

    /// Read-only snapshot, derived fresh from the account table.
    pub async fn status(&self) -> PoolStatus {
        let now = Instant::now();
        let state = self.state.lock().await;
        Self::snapshot(&state.accounts, now, &self.policy)
    }

    fn snapshot(accounts: &[AccountRecord], now: Instant, policy: &RatePolicy) -> PoolStatus {
        PoolStatus::from_accounts(accounts.iter().map(|a| a.status(now, policy)).collect())
    }
}

/// Build the exhausted error message JSON.
fn exhausted_message(status: &PoolStatus) -> String {
    serde_json::json!({
        "error": {
            "type": "no_available_account",
            "message": "All accounts unavailable",
            "pool": {
                "accounts_total": status.accounts_total,
                "accounts_pacing": status.accounts_pacing,
                "accounts_cooling_down": status.accounts_cooling_down,
                "accounts_quota_exhausted": status.accounts_quota_exhausted,
                "accounts_suspended": status.accounts_suspended,
                "retry_after_ms": status.next_available_in().map(|d| d.as_millis() as u64),
            }
        }
    })
    .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use account_session::SessionStore;
    use common::Secret;
    use platform::ScriptedPlatform;

    /// Build unauthenticated sessions for `ids` over a scripted platform.
    pub(crate) async fn test_sessions(
        dir: &tempfile::TempDir,
        platform: &Arc<ScriptedPlatform>,
        ids: &[&str],
    ) -> Vec<Arc<AccountSession>> {
        let store = Arc::new(
            SessionStore::load(dir.path().join("sessions.json"))
                .await
                .unwrap(),
        );
        ids.iter()
            .map(|id| {
                platform.add_account(id, "pw");
                Arc::new(AccountSession::new(
                    *id,
                    Secret::new("pw".to_string()),
                    platform.clone(),
                    store.clone(),
                ))
            })
            .collect()
    }

    fn no_pacing() -> RatePolicy {
        RatePolicy {
            min_interval: Duration::ZERO,
            ..RatePolicy::default()
        }
    }

    async fn test_pool(dir: &tempfile::TempDir, ids: &[&str], policy: RatePolicy) -> Pool {
        let platform = Arc::new(ScriptedPlatform::new());
        Pool::new(test_sessions(dir, &platform, ids).await, policy)
    }

    #[tokio::test(start_paused = true)]
    async fn round_robin_offers_every_account_once_per_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a", "b", "c"], no_pacing()).await;

        let mut picked = Vec::new();
        for _ in 0..6 {
            picked.push(pool.acquire().await.unwrap().account_id);
        }
        assert_eq!(picked, ["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_continues_past_skipped_account() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a", "b", "c"], no_pacing()).await;
        pool.report_rate_limited("a").await.unwrap();

        let mut picked = Vec::new();
        for _ in 0..4 {
            picked.push(pool.acquire().await.unwrap().account_id);
        }
        assert_eq!(picked, ["b", "c", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn error_threshold_cooldown_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            error_threshold: 3,
            error_cooldown: Duration::from_secs(300),
            ..no_pacing()
        };
        let pool = test_pool(&dir, &["a", "b"], policy).await;

        pool.report_error("a").await.unwrap();
        pool.report_error("a").await.unwrap();
        // Below threshold: still in rotation
        assert_eq!(pool.acquire().await.unwrap().account_id, "a");

        pool.report_error("a").await.unwrap();
        for _ in 0..5 {
            assert_eq!(pool.acquire().await.unwrap().account_id, "b");
        }

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(pool.acquire().await.unwrap().account_id, "b");

        tokio::time::advance(Duration::from_secs(1)).await;
        let picked: Vec<_> = vec![
            pool.acquire().await.unwrap().account_id,
            pool.acquire().await.unwrap().account_id,
        ];
        assert!(picked.contains(&"a".to_string()), "got {picked:?}");

        // Cooldown expiry clears the error counter
        let status = pool.status().await;
        let a = status.accounts.iter().find(|s| s.id == "a").unwrap();
        assert_eq!(a.consecutive_errors, 0);
        assert_eq!(a.state, AccountState::Available);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_error_counter() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a"], no_pacing()).await;

        pool.report_error("a").await.unwrap();
        pool.report_error("a").await.unwrap();
        pool.report_success("a").await.unwrap();
        pool.report_error("a").await.unwrap();

        assert!(pool.acquire().await.is_ok());
        assert_eq!(pool.status().await.accounts[0].consecutive_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_uses_its_own_shorter_window() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            rate_limit_cooldown: Duration::from_secs(60),
            error_cooldown: Duration::from_secs(300),
            ..no_pacing()
        };
        let pool = test_pool(&dir, &["a"], policy).await;

        // Zero errors on the counter, yet unavailable immediately
        pool.report_rate_limited("a").await.unwrap();
        let status = pool.status().await;
        assert_eq!(status.accounts[0].state, AccountState::CoolingDown);
        assert_eq!(status.accounts[0].cooldown_reason, Some(CooldownReason::RateLimited));
        assert_eq!(status.accounts[0].cooldown_remaining_secs, Some(60));
        assert!(pool.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(pool.acquire().await.unwrap().account_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_keeps_longer_error_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            error_threshold: 1,
            ..no_pacing()
        };
        let pool = test_pool(&dir, &["a"], policy).await;

        pool.report_error("a").await.unwrap();
        pool.report_rate_limited("a").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(pool.acquire().await.is_err());
        let status = pool.status().await;
        assert_eq!(status.accounts[0].cooldown_reason, Some(CooldownReason::Errors));
    }

    #[tokio::test(start_paused = true)]
    async fn min_interval_spaces_leases_per_account() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            min_interval: Duration::from_secs(2),
            ..RatePolicy::default()
        };
        let pool = test_pool(&dir, &["a", "b"], policy).await;

        assert_eq!(pool.acquire().await.unwrap().account_id, "a");
        assert_eq!(pool.acquire().await.unwrap().account_id, "b");

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, Error::NoAvailableAccount(_)));
        let status = pool.status().await;
        assert_eq!(status.accounts_pacing, 2);
        assert_eq!(status.health, "healthy");
        assert_eq!(status.next_available_in(), Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(pool.acquire().await.unwrap().account_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn daily_quota_is_enforced_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            daily_quota: 2,
            ..no_pacing()
        };
        let pool = test_pool(&dir, &["a"], policy).await;

        pool.acquire().await.unwrap();
        pool.acquire().await.unwrap();
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.status().await.accounts[0].state, AccountState::QuotaExhausted);

        tokio::time::advance(QUOTA_WINDOW).await;
        assert!(pool.acquire().await.is_ok());
        let status = pool.status().await;
        assert_eq!(status.accounts[0].daily_requests, 1);
        assert_eq!(status.accounts[0].total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_never_exceed_quota() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RatePolicy {
            daily_quota: 5,
            ..no_pacing()
        };
        let pool = Arc::new(test_pool(&dir, &["a", "b"], policy).await);

        let mut handles = vec![];
        for _ in 0..30 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.acquire().await.is_ok() }));
        }
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_error_carries_pool_summary() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a", "b"], no_pacing()).await;

        pool.report_rate_limited("a").await.unwrap();
        pool.report_suspended("b", SuspendReason::Challenge).await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        let msg = err.to_string();
        let json: serde_json::Value =
            serde_json::from_str(msg.strip_prefix("no available account: ").unwrap_or(&msg)).unwrap();
        assert_eq!(json["error"]["type"], "no_available_account");
        assert_eq!(json["error"]["pool"]["accounts_total"], 2);
        assert_eq!(json["error"]["pool"]["accounts_cooling_down"], 1);
        assert_eq!(json["error"]["pool"]["accounts_suspended"], 1);
        assert_eq!(json["error"]["pool"]["retry_after_ms"], 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_holds_until_reinstated() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a"], no_pacing()).await;

        pool.report_suspended("a", SuspendReason::AuthRequired)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.suspended(SuspendReason::AuthRequired).await, ["a"]);
        assert!(pool.suspended(SuspendReason::Challenge).await.is_empty());

        pool.reinstate("a").await.unwrap();
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn health_labels() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a", "b"], no_pacing()).await;
        assert_eq!(pool.status().await.health, "healthy");

        pool.report_rate_limited("a").await.unwrap();
        let status = pool.status().await;
        assert_eq!(status.health, "degraded");
        assert!(status.is_usable());

        pool.report_rate_limited("b").await.unwrap();
        let status = pool.status().await;
        assert_eq!(status.health, "unhealthy");
        assert!(!status.is_usable());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_account_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir, &["a"], no_pacing()).await;
        assert!(matches!(
            pool.report_error("ghost").await,
            Err(Error::UnknownAccount(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_is_exhausted() {
        let pool = Pool::new(Vec::new(), RatePolicy::default());
        assert!(matches!(pool.acquire().await, Err(Error::NoAvailableAccount(_))));
        assert_eq!(pool.status().await.health, "unhealthy");
    }

    #[tokio::test]
    async fn authenticate_all_suspends_failures() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(ScriptedPlatform::new());
        let sessions = test_sessions(&dir, &platform, &["ok", "challenged", "badpw"]).await;
        platform.fail_login("challenged", AuthError::ChallengeRequired("sms".into()));
        platform.fail_login("badpw", AuthError::BadCredentials("nope".into()));
        let pool = Pool::new(sessions, no_pacing());

        assert_eq!(pool.authenticate_all().await, 1);
        assert_eq!(pool.suspended(SuspendReason::Challenge).await, ["challenged"]);
        assert_eq!(pool.suspended(SuspendReason::AuthRequired).await, ["badpw"]);
        assert_eq!(pool.acquire().await.unwrap().account_id, "ok");
    }
}
