//! Access pool for platform accounts
//!
//! Multiplexes remote calls across a small set of authenticated accounts with
//! round-robin selection, per-account request spacing, daily quotas, and
//! cooldowns after repeated failures or rate-limit signals. The pool is the
//! only owner of per-account usage state.
//!
//! Account lifecycle:
//! 1. Configured account → `AccountSession` → `Pool::new()`
//! 2. `Pool::authenticate_all()` restores or creates sessions; failures suspend
//! 3. Callers `acquire()` a lease, make one remote call, report the outcome
//! 4. Errors past the threshold or a rate-limit signal → cooldown
//! 5. Cooldown expires → account eligible again, error counter cleared
//! 6. Background task re-authenticates accounts suspended for lost sessions

pub mod error;
pub mod outcome;
pub mod policy;
pub mod pool;
pub mod reauth;

pub use error::{Error, Result};
pub use outcome::{AccountOutcome, classify, classify_result, report_outcome};
pub use policy::{QUOTA_WINDOW, RatePolicy};
pub use pool::{
    AccountState, AccountStatus, CooldownReason, LeasedSession, Pool, PoolStatus, SuspendReason,
};
pub use reauth::{reauth_cycle, spawn_reauth_task};
