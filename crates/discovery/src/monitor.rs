//! Content lifecycle monitoring
//!
//! Polls tracked content through the pool and maps each reading onto a
//! `ContentStatus`. Deletion and loss of visibility are the externally
//! meaningful events; ambiguous failures never count as either.

use std::sync::Arc;

use access_pool::{Pool, report_outcome};
use chrono::{DateTime, Utc};
use platform::{ContentSnapshot, RemoteError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::content_ref::resolve_content_id;
use crate::error::{DiscoveryError, Result};
use crate::pacing::{Pacing, acquire_lease, pause};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Active,
    Deleted,
    Private,
    /// The check failed for a reason that says nothing about the content.
    Unknown,
}

impl ContentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ContentStatus::Active => "active",
            ContentStatus::Deleted => "deleted",
            ContentStatus::Private => "private",
            ContentStatus::Unknown => "unknown",
        }
    }

    /// Deleted and private are terminal for alerting.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentStatus::Deleted | ContentStatus::Private)
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Engagement counters of one piece of content at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub content_id: String,
    pub like_count: u64,
    pub comment_count: u64,
    pub play_count: Option<u64>,
    pub collected_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    fn from_content(content_id: &str, content: &ContentSnapshot) -> Self {
        Self {
            content_id: content_id.to_string(),
            like_count: content.like_count,
            comment_count: content.comment_count,
            play_count: content.play_count,
            collected_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringResult {
    pub content_id: String,
    pub status: ContentStatus,
    /// Present only for `Active` readings backed by a successful fetch.
    pub metrics: Option<MetricsSnapshot>,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl MonitoringResult {
    fn new(content_id: &str, status: ContentStatus) -> Self {
        Self {
            content_id: content_id.to_string(),
            status,
            metrics: None,
            checked_at: Utc::now(),
            error: None,
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// True when the reading says nothing about the content: an `Unknown`
    /// status, or an `Active` placeholder recorded because no check ran.
    pub fn is_inconclusive(&self) -> bool {
        match self.status {
            ContentStatus::Unknown => true,
            ContentStatus::Active => self.metrics.is_none() && self.error.is_some(),
            ContentStatus::Deleted | ContentStatus::Private => false,
        }
    }
}

/// How a new reading relates to the last known status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same status, or an inconclusive reading.
    Unchanged,
    /// Newly deleted or made private.
    Alert,
    /// Active again after being deleted or private.
    Rediscovered,
    /// Any other change, e.g. deleted to private.
    Changed,
}

/// Whether moving from `previous` to `current` warrants an alert.
///
/// True only on entering {deleted, private} from outside that set. A later
/// active reading after deletion does not alert; see `transition`.
pub fn should_alert(previous: ContentStatus, current: ContentStatus) -> bool {
    current.is_terminal() && !previous.is_terminal()
}

pub fn transition(previous: ContentStatus, current: ContentStatus) -> Transition {
    if previous == current || current == ContentStatus::Unknown {
        Transition::Unchanged
    } else if should_alert(previous, current) {
        Transition::Alert
    } else if previous.is_terminal() && current == ContentStatus::Active {
        Transition::Rediscovered
    } else {
        Transition::Changed
    }
}

fn status_for(err: &RemoteError) -> ContentStatus {
    match err {
        RemoteError::NotFound(_) => ContentStatus::Deleted,
        RemoteError::PermissionDenied(_) => ContentStatus::Private,
        _ => ContentStatus::Unknown,
    }
}

pub struct ContentMonitor {
    pool: Arc<Pool>,
    pacing: Pacing,
    cancel: CancellationToken,
}

impl ContentMonitor {
    pub fn new(pool: Arc<Pool>, pacing: Pacing, cancel: CancellationToken) -> Self {
        Self {
            pool,
            pacing,
            cancel,
        }
    }

    /// Check one content id.
    ///
    /// Remote failures become a status; only pool exhaustion and cancellation
    /// are returned as errors.
    pub async fn check_status(&self, content_id: &str) -> Result<MonitoringResult> {
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let fetched = lease.lookup_content(content_id).await;
        report_outcome(&self.pool, &lease.account_id, &fetched).await;

        let result = match fetched {
            Ok(content) => MonitoringResult {
                metrics: Some(MetricsSnapshot::from_content(content_id, &content)),
                ..MonitoringResult::new(content_id, ContentStatus::Active)
            },
            Err(e) => {
                let status = status_for(&e);
                match &e {
                    RemoteError::ChallengeRequired(_) => {
                        error!(account_id = %lease.account_id, content_id, error = %e, "account challenged during content check")
                    }
                    _ if status == ContentStatus::Unknown => {
                        warn!(account_id = %lease.account_id, content_id, kind = e.kind(), error = %e, "content check inconclusive")
                    }
                    _ => debug!(content_id, status = status.label(), "content unavailable"),
                }
                MonitoringResult::new(content_id, status).with_error(e.to_string())
            }
        };

        metrics::counter!("content_checks_total", "status" => result.status.label()).increment(1);
        Ok(result)
    }

    /// Check content named by a post URL or id.
    ///
    /// A reference that does not resolve fails before any account is leased.
    pub async fn check_url(&self, reference: &str) -> Result<MonitoringResult> {
        let content_id = resolve_content_id(reference)?;
        self.check_status(&content_id).await
    }

    /// Current engagement counters, without any status interpretation.
    pub async fn collect_metrics(&self, content_id: &str) -> Result<MetricsSnapshot> {
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let fetched = lease.lookup_content(content_id).await;
        report_outcome(&self.pool, &lease.account_id, &fetched).await;
        let content = fetched.map_err(|source| DiscoveryError::Remote {
            target: content_id.to_string(),
            source,
        })?;
        Ok(MetricsSnapshot::from_content(content_id, &content))
    }

    pub fn should_alert(&self, previous: ContentStatus, current: ContentStatus) -> bool {
        should_alert(previous, current)
    }

    pub fn transition(&self, previous: ContentStatus, current: ContentStatus) -> Transition {
        transition(previous, current)
    }

    /// Check ids one after another with a pause between checks.
    ///
    /// A check that cannot run is recorded as active with the error attached.
    /// Cancellation ends the batch and returns the results gathered so far.
    pub async fn batch_check_status(&self, content_ids: &[String]) -> Vec<MonitoringResult> {
        let mut results = Vec::with_capacity(content_ids.len());
        info!(count = content_ids.len(), "starting content status batch");

        for (i, content_id) in content_ids.iter().enumerate() {
            if i > 0 && pause(self.pacing.check, &self.cancel).await.is_err() {
                break;
            }
            match self.check_status(content_id).await {
                Ok(result) => results.push(result),
                Err(DiscoveryError::Cancelled) => break,
                Err(e) => {
                    warn!(content_id = %content_id, error = %e, "content check failed, assuming active");
                    metrics::counter!("content_checks_total", "status" => "error").increment(1);
                    results.push(
                        MonitoringResult::new(content_id, ContentStatus::Active).with_error(e.to_string()),
                    );
                }
            }
        }

        if results.len() < content_ids.len() {
            warn!(
                checked = results.len(),
                requested = content_ids.len(),
                "content status batch cancelled"
            );
        } else {
            info!(checked = results.len(), "content status batch complete");
        }
        results
    }
}
