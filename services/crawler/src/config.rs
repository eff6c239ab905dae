//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Account passwords are loaded from the env var named by `password_env` or
//! from `password_file`, never stored in the TOML directly.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use access_pool::RatePolicy;
use common::Secret;
use discovery::{Category, CategoryTable, MinimumRequirements, Pacing};
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub requirements: MinimumRequirements,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub status: StatusConfig,
    /// Replaces the built-in category table when non-empty.
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Remote platform bridge
#[derive(Debug, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub dir: PathBuf,
    /// Stored sessions older than this are discarded at startup.
    pub max_age_days: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            max_age_days: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_interval_ms: u64,
    pub daily_quota: u64,
    pub error_threshold: u32,
    pub error_cooldown_secs: u64,
    pub rate_limit_cooldown_secs: u64,
    pub reauth_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let policy = RatePolicy::default();
        Self {
            min_interval_ms: policy.min_interval.as_millis() as u64,
            daily_quota: policy.daily_quota,
            error_threshold: policy.error_threshold,
            error_cooldown_secs: policy.error_cooldown.as_secs(),
            rate_limit_cooldown_secs: policy.rate_limit_cooldown.as_secs(),
            reauth_interval_secs: 900,
        }
    }
}

/// One platform account
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    pub handle: String,
    /// Name of the env var holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    /// Path to a file containing the password (alternative to `password_env`)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub candidate_delay_ms: u64,
    pub tag_delay_ms: u64,
    pub category_delay_ms: u64,
    pub entity_delay_ms: u64,
    pub check_delay_ms: u64,
    pub acquire_retry_secs: u64,
    pub acquire_attempts: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        let pacing = Pacing::default();
        Self {
            candidate_delay_ms: pacing.candidate.as_millis() as u64,
            tag_delay_ms: pacing.tag.as_millis() as u64,
            category_delay_ms: pacing.category.as_millis() as u64,
            entity_delay_ms: pacing.entity.as_millis() as u64,
            check_delay_ms: pacing.check.as_millis() as u64,
            acquire_retry_secs: pacing.acquire_retry.as_secs(),
            acquire_attempts: pacing.acquire_attempts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("catalog.json"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub ledger_path: PathBuf,
    /// Metrics rows kept per tracked content id.
    pub history_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("tracked-content.json"),
            history_limit: 90,
        }
    }
}

/// Optional operator status endpoint
#[derive(Debug, Default, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then resolve account passwords.
    ///
    /// Password resolution order per account:
    /// 1. env var named by `password_env`
    /// 2. `password_file` path
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.platform.base_url.starts_with("http://")
            && !config.platform.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.platform.base_url
            )));
        }

        if config.platform.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.pool.daily_quota == 0 {
            return Err(common::Error::Config(
                "daily_quota must be greater than 0".into(),
            ));
        }

        if config.pool.error_threshold == 0 {
            return Err(common::Error::Config(
                "error_threshold must be greater than 0".into(),
            ));
        }

        if config.accounts.is_empty() {
            return Err(common::Error::Config(
                "at least one [[accounts]] entry is required".into(),
            ));
        }

        let mut handles = std::collections::HashSet::new();
        if let Some(dup) = config
            .accounts
            .iter()
            .find(|account| !handles.insert(account.handle.as_str()))
        {
            return Err(common::Error::Config(format!(
                "account {} is configured more than once",
                dup.handle
            )));
        }

        for account in &mut config.accounts {
            account.password = resolve_password(account)?;
            if account.password.is_none() {
                return Err(common::Error::Config(format!(
                    "account {} has no password: set password_env or password_file",
                    account.handle
                )));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("profile-crawler.toml")
    }

    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy {
            min_interval: Duration::from_millis(self.pool.min_interval_ms),
            daily_quota: self.pool.daily_quota,
            error_threshold: self.pool.error_threshold,
            error_cooldown: Duration::from_secs(self.pool.error_cooldown_secs),
            rate_limit_cooldown: Duration::from_secs(self.pool.rate_limit_cooldown_secs),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            candidate: Duration::from_millis(self.pacing.candidate_delay_ms),
            tag: Duration::from_millis(self.pacing.tag_delay_ms),
            category: Duration::from_millis(self.pacing.category_delay_ms),
            entity: Duration::from_millis(self.pacing.entity_delay_ms),
            check: Duration::from_millis(self.pacing.check_delay_ms),
            acquire_retry: Duration::from_secs(self.pacing.acquire_retry_secs),
            acquire_attempts: self.pacing.acquire_attempts,
        }
    }

    pub fn category_table(&self) -> CategoryTable {
        if self.categories.is_empty() {
            CategoryTable::default()
        } else {
            CategoryTable::new(self.categories.clone())
        }
    }

    /// Age past which stored sessions are discarded.
    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.sessions.max_age_days.saturating_mul(24 * 60 * 60))
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.sessions.dir.join("sessions.json")
    }
}

fn resolve_password(account: &AccountConfig) -> common::Result<Option<Secret<String>>> {
    if let Some(var) = &account.password_env
        && let Ok(password) = std::env::var(var)
        && !password.is_empty()
    {
        return Ok(Some(Secret::new(password)));
    }

    if let Some(file) = &account.password_file {
        let password = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read password_file {}: {e}",
                file.display()
            ))
        })?;
        let password = password.trim().to_owned();
        if !password.is_empty() {
            return Ok(Some(Secret::new(password)));
        }
    }

    Ok(None)
}
