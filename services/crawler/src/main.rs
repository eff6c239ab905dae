//! Profile crawler
//!
//! Single binary that runs one crawl job per invocation:
//! 1. Loads config and authenticates the account pool
//! 2. Runs the requested job (discover, refresh, monitor, ...)
//! 3. Prints the job report as JSON on stdout
//!
//! Logs go to stderr as JSON. SIGINT/SIGTERM cancel the running job, which
//! stops at its next pause and still reports what it finished.

mod catalog_file;
mod cli;
mod config;
mod error;
mod ledger;
mod metrics;
mod status;
#[cfg(test)]
mod test_support;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use access_pool::{Pool, spawn_reauth_task};
use account_session::{AccountSession, HttpPlatform, SessionStore};
use anyhow::{Context, Result};
use clap::Parser;
use discovery::{
    ContentMonitor, DiscoveryOrchestrator, EntityCatalog, StalenessRefresher, resolve_content_id,
};
use platform::PlatformApi;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::catalog_file::FileCatalog;
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::ledger::Ledger;
use crate::status::StatusState;

/// Exit code for a job that stopped before finishing its work.
const EXIT_INCOMPLETE: u8 = 2;

/// JSON report of a finished job and whether it ran to completion.
#[derive(Debug)]
struct JobOutput {
    report: serde_json::Value,
    complete: bool,
}

impl JobOutput {
    fn new(report: &impl Serialize, complete: bool) -> Result<Self> {
        Ok(Self {
            report: serde_json::to_value(report).context("failed to serialize job report")?,
            complete,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs on stderr keep stdout free for the job report
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        base_url = %config.platform.base_url,
        accounts = config.accounts.len(),
        catalog = %config.catalog.path.display(),
        "configuration loaded"
    );

    let prometheus = metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let job = cli.command.name();
    let started = Instant::now();

    if let Command::Track { content_ids } = &cli.command {
        let output = track(&config, content_ids).await?;
        metrics::record_job(job, true, started.elapsed().as_secs_f64());
        print_report(&output.report)?;
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("shutdown signal received, cancelling job");
            cancel.cancel();
        }
    });

    let pool = build_pool(&config).await?;

    // Background tasks outlive a cancelled job until it has reported
    let background = CancellationToken::new();
    let reauth = (config.pool.reauth_interval_secs > 0).then(|| {
        spawn_reauth_task(
            pool.clone(),
            Duration::from_secs(config.pool.reauth_interval_secs),
            background.clone(),
        )
    });
    let status_server = match config.status.listen_addr {
        Some(addr) => {
            let state = StatusState {
                pool: pool.clone(),
                prometheus,
                started_at: started,
                job,
            };
            let handle = status::spawn(addr, state, background.clone())
                .await
                .with_context(|| format!("failed to bind status endpoint on {addr}"))?;
            Some(handle)
        }
        None => None,
    };

    info!(job, "job starting");
    let result = execute(cli.command, &config, pool, cancel).await;
    let elapsed = started.elapsed();
    let complete = matches!(&result, Ok(output) if output.complete);
    metrics::record_job(job, complete, elapsed.as_secs_f64());

    background.cancel();
    for handle in [reauth, status_server].into_iter().flatten() {
        if let Err(e) = handle.await {
            error!(error = %e, "background task panicked");
        }
    }

    let output = result.with_context(|| format!("{job} failed"))?;
    print_report(&output.report)?;

    if output.complete {
        info!(job, elapsed_secs = elapsed.as_secs(), "job complete");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(job, elapsed_secs = elapsed.as_secs(), "job stopped early");
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

/// Build sessions for every configured account and authenticate them.
///
/// Fails only if no account at all could be made ready.
async fn build_pool(config: &Config) -> Result<Arc<Pool>> {
    let api: Arc<dyn PlatformApi> = Arc::new(
        HttpPlatform::new(
            config.platform.base_url.as_str(),
            Duration::from_secs(config.platform.timeout_secs),
        )
        .context("failed to build HTTP client")?,
    );

    tokio::fs::create_dir_all(&config.sessions.dir)
        .await
        .with_context(|| format!("failed to create {}", config.sessions.dir.display()))?;
    let sessions_path = config.sessions_path();
    let store = Arc::new(
        SessionStore::load(sessions_path.clone())
            .await
            .with_context(|| format!("failed to load sessions from {}", sessions_path.display()))?,
    );

    match store.prune_older_than(config.session_max_age()).await {
        Ok(0) => {}
        Ok(pruned) => info!(pruned, "discarded expired sessions"),
        Err(e) => warn!(error = %e, "failed to prune stored sessions"),
    }

    let sessions = config
        .accounts
        .iter()
        .filter_map(|account| {
            let password = account.password.clone()?;
            Some(Arc::new(AccountSession::new(
                account.handle.as_str(),
                password,
                api.clone(),
                store.clone(),
            )))
        })
        .collect();

    let pool = Arc::new(Pool::new(sessions, config.rate_policy()));
    let configured = config.accounts.len();
    let ready = pool.authenticate_all().await;
    if ready == 0 {
        return Err(error::Error::NoAccountReady { configured }.into());
    }
    info!(ready, configured, "account pool ready");
    Ok(pool)
}

/// Run one job against an authenticated pool.
async fn execute(
    command: Command,
    config: &Config,
    pool: Arc<Pool>,
    cancel: CancellationToken,
) -> Result<JobOutput> {
    match command {
        Command::Discover {
            categories,
            tags,
            candidates,
        } => {
            let orchestrator = orchestrator(config, pool, cancel).await?;
            let report = orchestrator
                .run_full_discovery(categories, tags, candidates)
                .await;
            JobOutput::new(&report, report.aborted.is_none())
        }
        Command::DiscoverTag {
            tag,
            category,
            candidates,
        } => {
            let orchestrator = orchestrator(config, pool, cancel).await?;
            let report = orchestrator
                .discover_from_tag(&tag, &category, candidates)
                .await
                .with_context(|| format!("discovery from #{tag} stopped"))?;
            JobOutput::new(&report, true)
        }
        Command::Refresh {
            max_age_days,
            limit,
        } => {
            let catalog = open_catalog(config).await?;
            let refresher = StalenessRefresher::new(
                pool,
                catalog,
                config.requirements.clone(),
                config.pacing(),
                cancel,
            );
            let report = refresher.refresh_stale(max_age_days, limit).await;
            JobOutput::new(&report, report.aborted.is_none())
        }
        Command::Monitor => {
            let mut ledger = Ledger::load(&config.monitor.ledger_path, config.monitor.history_limit).await?;
            let ids = ledger.ids();
            if ids.is_empty() {
                info!(path = %ledger.path().display(), "no tracked content");
            }

            let monitor = ContentMonitor::new(pool, config.pacing(), cancel);
            let results = monitor.batch_check_status(&ids).await;
            let summary = ledger.apply(&results);
            ledger.save().await?;

            let complete = results.len() == ids.len();
            JobOutput::new(
                &serde_json::json!({ "summary": summary, "results": results }),
                complete,
            )
        }
        Command::Track { content_ids } => track(config, &content_ids).await,
        Command::ContentMetrics { content_id } => {
            let content_id = resolve_content_id(&content_id)
                .with_context(|| format!("invalid content reference {content_id:?}"))?;
            let monitor = ContentMonitor::new(pool, config.pacing(), cancel);
            let snapshot = monitor
                .collect_metrics(&content_id)
                .await
                .with_context(|| format!("failed to collect metrics for {content_id}"))?;
            JobOutput::new(&snapshot, true)
        }
        Command::Status => {
            let status = pool.status().await;
            let usable = status.is_usable();
            JobOutput::new(&status, usable)
        }
    }
}

/// Add content ids or post URLs to the ledger. Needs no platform access.
async fn track(config: &Config, references: &[String]) -> Result<JobOutput> {
    let content_ids = references
        .iter()
        .map(|r| resolve_content_id(r).with_context(|| format!("cannot track {r:?}")))
        .collect::<Result<Vec<_>>>()?;

    let mut ledger = Ledger::load(&config.monitor.ledger_path, config.monitor.history_limit).await?;
    let added: Vec<&str> = content_ids
        .iter()
        .map(String::as_str)
        .filter(|id| ledger.track(id))
        .collect();
    ledger.save().await?;
    info!(
        added = added.len(),
        tracked = ledger.entries().len(),
        path = %ledger.path().display(),
        "tracked content updated"
    );
    JobOutput::new(
        &serde_json::json!({ "added": added, "tracked": ledger.entries().len() }),
        true,
    )
}

async fn open_catalog(config: &Config) -> Result<Arc<dyn EntityCatalog>> {
    Ok(Arc::new(FileCatalog::open(&config.catalog.path).await?))
}

async fn orchestrator(
    config: &Config,
    pool: Arc<Pool>,
    cancel: CancellationToken,
) -> Result<DiscoveryOrchestrator> {
    Ok(DiscoveryOrchestrator::new(
        pool,
        open_catalog(config).await?,
        config.requirements.clone(),
        config.category_table(),
        config.pacing(),
        cancel,
    ))
}

fn print_report(report: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(report).context("failed to render job report")?;
    println!("{rendered}");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
///
/// A handler that cannot be installed is logged and never fires; the job then
/// runs to completion.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
